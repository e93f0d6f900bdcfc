//! Bounded concurrent fan-out of endpoint calls.
mod endpoint;
mod pool;
mod runner;
mod types;


pub use endpoint::Endpoint;
pub use runner::Dispatcher;
pub use types::{
    ConcurrencyMode, DEFAULT_POOL_SIZE, DEFAULT_QUEUE_CAPACITY, DispatchConfig, DispatchReport,
    DispatchRequest, MAX_TARGET_COUNT, RunStatus, TargetCount,
};
