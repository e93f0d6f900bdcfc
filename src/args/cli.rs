use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::dispatch::ConcurrencyMode;
use crate::probe::{ProbeExecutor, ProbeMode};

use super::defaults::DEFAULT_COUNT;
use super::parsers::{parse_duration_arg, parse_header, parse_listen_addr, parse_positive_usize};
use super::types::{OutputFormat, PositiveUsize};

#[derive(Debug, Parser, Clone)]
#[clap(
    version,
    about = "Fan a chat-completion request out to an HTTP endpoint and summarize the results, probe lock contention, or serve a mock endpoint."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable debug logging (overridden by LLM_FANOUT_LOG / RUST_LOG)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Fire N concurrent calls at an endpoint and summarize the outcomes
    Dispatch(DispatchArgs),
    /// Measure how a shared lock serializes concurrent work
    Probe(ProbeArgs),
    /// Serve a mock chat-completion endpoint with a fixed delay
    Mock(MockArgs),
}

#[derive(Debug, Args, Clone)]
pub struct DispatchArgs {
    /// Endpoint URL (http or https)
    #[arg(long, short = 'u', env = "LLM_FANOUT_URL")]
    pub url: Option<String>,

    /// Bearer token sent as `Authorization: Bearer <token>`
    #[arg(long, env = "LLM_FANOUT_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Extra header, repeatable ('Key: Value')
    #[arg(long = "header", short = 'H', value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// Request body sent with every call
    #[arg(long, short = 'd', conflicts_with = "data_file")]
    pub data: Option<String>,

    /// Read the request body from a file
    #[arg(long = "data-file", short = 'D')]
    pub data_file: Option<PathBuf>,

    /// Number of calls to fire
    #[arg(
        long,
        short = 'n',
        default_value_t = DEFAULT_COUNT,
        allow_negative_numbers = true
    )]
    pub count: i64,

    /// How calls are scheduled
    #[arg(long, value_enum, default_value_t = ConcurrencyMode::Unbounded)]
    pub mode: ConcurrencyMode,

    /// Worker count for pooled mode
    #[arg(long = "pool-size", default_value = "50", value_parser = parse_positive_usize)]
    pub pool_size: PositiveUsize,

    /// Queue depth in front of the pooled workers
    #[arg(long = "queue-capacity", default_value = "100000", value_parser = parse_positive_usize)]
    pub queue_capacity: PositiveUsize,

    /// Overall run deadline (supports ms/s/m/h); waits for every call when unset
    #[arg(long, value_parser = parse_duration_arg)]
    pub timeout: Option<Duration>,

    /// Per-call timeout (supports ms/s/m/h)
    #[arg(long = "request-timeout", default_value = "60s", value_parser = parse_duration_arg)]
    pub request_timeout: Duration,

    /// TCP connect timeout (supports ms/s/m/h)
    #[arg(long = "connect-timeout", default_value = "5s", value_parser = parse_duration_arg)]
    pub connect_timeout: Duration,

    /// Summary format on stdout
    #[arg(long = "output-format", value_enum, default_value_t = OutputFormat::Text)]
    pub output_format: OutputFormat,

    /// Write the full report as JSON to this path
    #[arg(long = "export-json")]
    pub export_json: Option<PathBuf>,

    /// Path to config file (TOML/JSON). Defaults to ./llm-fanout.toml or ./llm-fanout.json if present.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct ProbeArgs {
    /// Number of concurrent tasks
    #[arg(long, default_value = "2", value_parser = parse_positive_usize)]
    pub tasks: PositiveUsize,

    /// Simulated work per task (supports ms/s/m/h)
    #[arg(long, default_value = "2s", value_parser = parse_duration_arg)]
    pub work: Duration,

    /// Run freely or behind one shared lock
    #[arg(long, value_enum, default_value_t = ProbeMode::Free)]
    pub mode: ProbeMode,

    /// What runs each task
    #[arg(long, value_enum, default_value_t = ProbeExecutor::Tasks)]
    pub executor: ProbeExecutor,

    /// Runtime worker threads for the task executors (defaults to the CPU count)
    #[arg(long = "worker-threads", value_parser = parse_positive_usize)]
    pub worker_threads: Option<PositiveUsize>,

    /// Report format on stdout
    #[arg(long = "output-format", value_enum, default_value_t = OutputFormat::Text)]
    pub output_format: OutputFormat,
}

#[derive(Debug, Args, Clone)]
pub struct MockArgs {
    /// Address to listen on
    #[arg(
        long,
        env = "LLM_MOCK_LISTEN",
        default_value = "0.0.0.0:8080",
        value_parser = parse_listen_addr
    )]
    pub listen: SocketAddr,

    /// Delay before each completion is answered (supports ms/s/m/h)
    #[arg(
        long,
        env = "LLM_MOCK_DELAY",
        default_value = "10s",
        value_parser = parse_duration_arg
    )]
    pub delay: Duration,

    /// Requests served at once; the rest get 503
    #[arg(
        long = "max-concurrent",
        env = "LLM_MOCK_MAX_CONCURRENT",
        default_value = "10000",
        value_parser = parse_positive_usize
    )]
    pub max_concurrent: PositiveUsize,
}
