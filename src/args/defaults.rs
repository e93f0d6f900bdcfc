use std::time::Duration;

pub(crate) const DEFAULT_USER_AGENT: &str = concat!("llm-fanout/", env!("CARGO_PKG_VERSION"));

/// Number of calls fired when `--count` is not given.
pub(crate) const DEFAULT_COUNT: i64 = 500;

pub(crate) const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
pub(crate) const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
