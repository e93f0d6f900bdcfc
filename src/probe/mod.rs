//! Measures how one shared lock serializes otherwise concurrent work.
mod runner;
mod types;


pub use runner::run_probe;
pub use types::{ProbeConfig, ProbeExecutor, ProbeMode, ProbeReport, ProbeTaskRecord};
