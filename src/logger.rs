use tracing_subscriber::{EnvFilter, FmtSubscriber};

const LOG_ENV: &str = "LLM_FANOUT_LOG";
const QUIET_DIRECTIVE: &str = "info";
/// Per-call debug lines from this crate without the HTTP stack's chatter.
const VERBOSE_DIRECTIVE: &str = "info,llm_fanout=debug";

/// Installs the global subscriber. Logs go to stderr so stdout stays
/// parseable with `--output-format json`.
pub fn init_logging(verbose: bool) {
    let configured = std::env::var(LOG_ENV)
        .or_else(|_| std::env::var("RUST_LOG"))
        .ok();
    let filter = build_filter(verbose, configured.as_deref());

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_thread_names(verbose)
        .finish();

    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set global default subscriber: {}", err);
    }
}

/// An explicit directive wins over `--verbose`; an unparsable one falls
/// back to the level `--verbose` selects.
fn build_filter(verbose: bool, configured: Option<&str>) -> EnvFilter {
    let fallback = if verbose {
        VERBOSE_DIRECTIVE
    } else {
        QUIET_DIRECTIVE
    };
    configured
        .and_then(|directive| EnvFilter::try_new(directive).ok())
        .unwrap_or_else(|| EnvFilter::new(fallback))
}
