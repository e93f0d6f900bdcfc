use std::collections::BTreeMap;
use std::time::Duration;

use bytes::Bytes;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::args::PositiveUsize;
use crate::error::ValidationError;
use crate::metrics::{CallOutcome, DispatchSummary};

/// Worker count used for pooled dispatch unless configured.
pub const DEFAULT_POOL_SIZE: usize = 50;
/// Queue depth in front of the pooled workers unless configured.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100_000;
/// Largest number of calls accepted for one run.
pub const MAX_TARGET_COUNT: usize = 10_000_000;

#[derive(Debug, Clone, Copy, ValueEnum, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConcurrencyMode {
    /// One task per call.
    #[default]
    Unbounded,
    /// A fixed worker pool draining a bounded queue.
    Pooled,
    /// One task per call, but calls run one at a time behind a shared lock.
    Serialized,
}

impl ConcurrencyMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ConcurrencyMode::Unbounded => "unbounded",
            ConcurrencyMode::Pooled => "pooled",
            ConcurrencyMode::Serialized => "serialized",
        }
    }
}

/// Number of calls in a run, validated from a signed input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetCount(usize);

impl TargetCount {
    #[must_use]
    pub const fn new(value: usize) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn get(self) -> usize {
        self.0
    }
}

impl TryFrom<i64> for TargetCount {
    type Error = ValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if value < 0 {
            return Err(ValidationError::NegativeTargetCount { value });
        }
        usize::try_from(value)
            .ok()
            .filter(|count| *count <= MAX_TARGET_COUNT)
            .map(TargetCount)
            .ok_or(ValidationError::TargetCountTooLarge {
                value,
                max: MAX_TARGET_COUNT,
            })
    }
}

/// Request template for one dispatch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchRequest {
    pub target_count: usize,
    pub endpoint_url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Bytes>,
    pub concurrency_mode: ConcurrencyMode,
}

impl DispatchRequest {
    #[must_use]
    pub fn new(target_count: TargetCount, endpoint_url: impl Into<String>) -> Self {
        Self {
            target_count: target_count.get(),
            endpoint_url: endpoint_url.into(),
            headers: BTreeMap::new(),
            body: None,
            concurrency_mode: ConcurrencyMode::default(),
        }
    }

    #[must_use]
    pub const fn with_mode(mut self, mode: ConcurrencyMode) -> Self {
        self.concurrency_mode = mode;
        self
    }

    /// Header names are stored lowercased, so a later header replaces an
    /// earlier one regardless of case.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let mut name = name.into();
        name.make_ascii_lowercase();
        self.headers.insert(name, value.into());
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DispatchConfig {
    pub pool_size: PositiveUsize,
    pub queue_capacity: PositiveUsize,
    /// Overall deadline for the run; `None` waits for every call.
    pub overall_timeout: Option<Duration>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            pool_size: PositiveUsize::new_or_one(DEFAULT_POOL_SIZE),
            queue_capacity: PositiveUsize::new_or_one(DEFAULT_QUEUE_CAPACITY),
            overall_timeout: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    /// The overall timeout elapsed before every call reported.
    TimeoutExceeded,
    /// The caller cancelled the run.
    Interrupted,
}

impl RunStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            RunStatus::Completed => "completed",
            RunStatus::TimeoutExceeded => "timeout_exceeded",
            RunStatus::Interrupted => "interrupted",
        }
    }

    #[must_use]
    pub const fn is_partial(self) -> bool {
        !matches!(self, RunStatus::Completed)
    }
}

/// Frozen result of one dispatch run.
#[derive(Debug, Clone)]
pub struct DispatchReport {
    pub summary: DispatchSummary,
    pub status: RunStatus,
    /// Every recorded outcome, including cancelled ones, ordered by index.
    pub outcomes: Vec<CallOutcome>,
    pub elapsed: Duration,
}
