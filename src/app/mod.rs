//! Command handlers behind the CLI.
mod dispatch;
mod export;
mod mock;
mod probe;
mod summary;


pub(crate) use dispatch::run_dispatch;
pub(crate) use mock::run_mock;
pub(crate) use probe::run_probe_command;

/// Scale factor for the `_x100` fixed-point figures.
const PERCENT_DIVISOR: u64 = 100;
