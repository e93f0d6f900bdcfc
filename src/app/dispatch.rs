use std::sync::Arc;

use clap::ArgMatches;
use tracing::{error, warn};

use crate::args::{DispatchArgs, OutputFormat};
use crate::config::{apply_config, load_config};
use crate::dispatch::{DispatchConfig, DispatchRequest, Dispatcher, Endpoint, TargetCount};
use crate::error::{AppError, AppResult, HttpError, ValidationError};
use crate::http::{HttpClientConfig, HttpEndpoint, bearer_header, parse_endpoint_url};
use crate::shutdown::spawn_signal_handler;

use super::export::export_json;
use super::summary::{TextSummary, render_json};

/// Runs `llm-fanout dispatch` and prints the summary.
///
/// A run cut short by `--timeout` or a signal still prints its partial
/// summary and returns `Ok`.
pub(crate) async fn run_dispatch(mut args: DispatchArgs, matches: &ArgMatches) -> AppResult<()> {
    if let Some(config) = load_config(args.config.as_deref())? {
        apply_config(&mut args, matches, &config)?;
    }

    let request = build_request(&args).await.inspect_err(|err| {
        error!("Invalid dispatch setup: {}", err);
    })?;
    let endpoint: Arc<dyn Endpoint> = Arc::new(HttpEndpoint::new(&HttpClientConfig {
        request_timeout: args.request_timeout,
        connect_timeout: args.connect_timeout,
    })?);
    let dispatcher = Dispatcher::new(
        endpoint,
        DispatchConfig {
            pool_size: args.pool_size,
            queue_capacity: args.queue_capacity,
            overall_timeout: args.timeout,
        },
    );

    let shutdown = tokio_util::sync::CancellationToken::new();
    let signal_handler = spawn_signal_handler(&shutdown);
    let result = dispatcher.run_until(request, shutdown.clone()).await;
    shutdown.cancel();
    drop(signal_handler.await);
    let report = result?;

    if report.status.is_partial() {
        warn!(
            status = report.status.as_str(),
            "Printing a partial summary"
        );
    }

    match args.output_format {
        OutputFormat::Text => print!("{}", TextSummary(&report)),
        OutputFormat::Json => println!("{}", render_json(&report)?),
    }

    if let Some(path) = args.export_json.as_deref() {
        export_json(path, &report).await?;
    }

    Ok(())
}

/// Validates the arguments into a request template. Nothing is scheduled
/// when this fails.
pub(super) async fn build_request(args: &DispatchArgs) -> AppResult<DispatchRequest> {
    let count = TargetCount::try_from(args.count)?;
    let url = args
        .url
        .as_deref()
        .ok_or(ValidationError::MissingUrl)?;
    let url = parse_endpoint_url(url)?;

    let mut request = DispatchRequest::new(count, url.as_str()).with_mode(args.mode);
    if let Some(token) = args.token.as_deref() {
        let (name, value) = bearer_header(token)?;
        request = request.with_header(name, value);
    }
    for (name, value) in &args.headers {
        request = request.with_header(name.clone(), value.clone());
    }

    if let Some(data) = args.data.as_ref() {
        request = request.with_body(data.clone());
    } else if let Some(path) = args.data_file.as_deref() {
        let body = tokio::fs::read(path).await.map_err(|err| {
            AppError::http(HttpError::ReadBodyFile {
                path: path.to_path_buf(),
                source: err,
            })
        })?;
        request = request.with_body(body);
    }

    Ok(request)
}
