use clap::ArgMatches;
use clap::parser::ValueSource;
use std::time::Duration;

use crate::args::{DispatchArgs, PositiveUsize, parse_header};
use crate::error::{AppError, AppResult, ConfigError};

use super::types::{ConfigFile, DurationValue};

/// Fills `dispatch` arguments the user did not set explicitly from `config`.
///
/// # Errors
///
/// Returns an error when config values are invalid or conflict with each other.
pub fn apply_config(
    args: &mut DispatchArgs,
    matches: &ArgMatches,
    config: &ConfigFile,
) -> AppResult<()> {
    if config.data.is_some() && config.data_file.is_some() {
        return Err(AppError::config(ConfigError::Conflict {
            left: "data",
            right: "data_file",
        }));
    }

    if !is_explicit(matches, "url")
        && let Some(url) = config.url.clone()
    {
        args.url = Some(url);
    }

    if !is_explicit(matches, "token")
        && let Some(token) = config.token.clone()
    {
        args.token = Some(token);
    }

    if !is_explicit(matches, "headers")
        && let Some(headers) = config.headers.as_ref()
    {
        args.headers = parse_headers(headers)?;
    }

    // Either body flag on the command line replaces both body keys in the file.
    if !is_explicit(matches, "data") && !is_explicit(matches, "data_file") {
        if let Some(data) = config.data.clone() {
            args.data = Some(data);
        }
        if let Some(data_file) = config.data_file.clone() {
            args.data_file = Some(data_file);
        }
    }

    if !is_explicit(matches, "count")
        && let Some(count) = config.count
    {
        args.count = count;
    }

    if !is_explicit(matches, "mode")
        && let Some(mode) = config.mode
    {
        args.mode = mode;
    }

    if !is_explicit(matches, "pool_size")
        && let Some(pool_size) = config.pool_size
    {
        args.pool_size = ensure_positive_usize(pool_size, "pool_size")?;
    }

    if !is_explicit(matches, "queue_capacity")
        && let Some(queue_capacity) = config.queue_capacity
    {
        args.queue_capacity = ensure_positive_usize(queue_capacity, "queue_capacity")?;
    }

    if !is_explicit(matches, "timeout")
        && let Some(timeout) = config.timeout.as_ref()
    {
        args.timeout = Some(config_duration(timeout, "timeout")?);
    }

    if !is_explicit(matches, "request_timeout")
        && let Some(timeout) = config.request_timeout.as_ref()
    {
        args.request_timeout = config_duration(timeout, "request_timeout")?;
    }

    if !is_explicit(matches, "connect_timeout")
        && let Some(timeout) = config.connect_timeout.as_ref()
    {
        args.connect_timeout = config_duration(timeout, "connect_timeout")?;
    }

    if !is_explicit(matches, "output_format")
        && let Some(format) = config.output_format
    {
        args.output_format = format;
    }

    if !is_explicit(matches, "export_json")
        && let Some(path) = config.export_json.clone()
    {
        args.export_json = Some(path);
    }

    Ok(())
}

/// Command-line and environment values both outrank the config file.
fn is_explicit(matches: &ArgMatches, name: &str) -> bool {
    matches!(
        matches.value_source(name),
        Some(ValueSource::CommandLine | ValueSource::EnvVariable)
    )
}

fn ensure_positive_usize(value: usize, field: &'static str) -> AppResult<PositiveUsize> {
    PositiveUsize::try_from(value)
        .map_err(|err| AppError::config(ConfigError::FieldMustBePositive { field, source: err }))
}

fn config_duration(value: &DurationValue, field: &'static str) -> AppResult<Duration> {
    value
        .to_duration()
        .map_err(|err| AppError::config(ConfigError::InvalidDuration { field, source: err }))
}

fn parse_headers(headers: &[String]) -> AppResult<Vec<(String, String)>> {
    let mut parsed = Vec::with_capacity(headers.len());
    for header in headers {
        parsed.push(
            parse_header(header)
                .map_err(|err| AppError::config(ConfigError::InvalidHeader { source: err }))?,
        );
    }
    Ok(parsed)
}
