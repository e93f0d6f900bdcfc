//! Per-call outcomes, run summaries, and the concurrent aggregator.
mod aggregator;
mod histogram;
mod types;


pub use aggregator::{Aggregator, RecordStatus};
pub use histogram::LatencyHistogram;
pub use types::{CallOutcome, DispatchSummary, ErrorKind, LatencyStats};
