use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::args::{OutputFormat, parse_duration_arg};
use crate::dispatch::ConcurrencyMode;
use crate::error::ValidationError;

/// Settings for `dispatch` read from `llm-fanout.toml` / `llm-fanout.json`.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub url: Option<String>,
    pub token: Option<String>,
    pub headers: Option<Vec<String>>,
    pub data: Option<String>,
    pub data_file: Option<PathBuf>,
    pub count: Option<i64>,
    pub mode: Option<ConcurrencyMode>,
    pub pool_size: Option<usize>,
    pub queue_capacity: Option<usize>,
    pub timeout: Option<DurationValue>,
    pub request_timeout: Option<DurationValue>,
    pub connect_timeout: Option<DurationValue>,
    pub output_format: Option<OutputFormat>,
    pub export_json: Option<PathBuf>,
}

/// Integer seconds or a suffixed string such as `"250ms"`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum DurationValue {
    Seconds(u64),
    Text(String),
}

impl DurationValue {
    pub(crate) fn to_duration(&self) -> Result<Duration, ValidationError> {
        match self {
            DurationValue::Seconds(secs) => {
                if *secs == 0 {
                    Err(ValidationError::DurationZero)
                } else {
                    Ok(Duration::from_secs(*secs))
                }
            }
            DurationValue::Text(text) => parse_duration_arg(text),
        }
    }
}
