use std::time::Duration;

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, ValueEnum, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProbeMode {
    /// Every task runs its work step freely.
    #[default]
    Free,
    /// Every task holds one shared lock for its whole work step.
    Serialized,
}

impl ProbeMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ProbeMode::Free => "free",
            ProbeMode::Serialized => "serialized",
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ProbeExecutor {
    /// Async tasks with an async lock and async sleep.
    #[default]
    Tasks,
    /// One OS thread per task with a blocking lock and blocking sleep.
    Threads,
    /// Async tasks that block their worker thread while holding a blocking lock.
    BlockingTasks,
}

impl ProbeExecutor {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ProbeExecutor::Tasks => "tasks",
            ProbeExecutor::Threads => "threads",
            ProbeExecutor::BlockingTasks => "blocking-tasks",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeConfig {
    pub tasks: usize,
    pub work: Duration,
    pub mode: ProbeMode,
    pub executor: ProbeExecutor,
    /// Runtime worker threads for the task executors; `None` uses the CPU count.
    pub worker_threads: Option<usize>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            tasks: 2,
            work: Duration::from_secs(2),
            mode: ProbeMode::Free,
            executor: ProbeExecutor::Tasks,
            worker_threads: None,
        }
    }
}

/// Wall-clock timeline of one probe task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeTaskRecord {
    pub index: usize,
    /// Thread that ran the work step.
    pub worker: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Offsets from the start of the probe.
    #[serde(rename = "start_offset_us", with = "duration_micros")]
    pub start_offset: Duration,
    #[serde(rename = "end_offset_us", with = "duration_micros")]
    pub end_offset: Duration,
}

impl ProbeTaskRecord {
    #[must_use]
    pub const fn duration(&self) -> Duration {
        self.end_offset.saturating_sub(self.start_offset)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeReport {
    pub mode: ProbeMode,
    pub executor: ProbeExecutor,
    #[serde(rename = "work_us", with = "duration_micros")]
    pub work: Duration,
    pub started_at: DateTime<Utc>,
    /// Ordered by task index.
    pub records: Vec<ProbeTaskRecord>,
}

impl ProbeReport {
    /// First start to last finish.
    #[must_use]
    pub fn span(&self) -> Duration {
        let first = self.records.iter().map(|record| record.start_offset).min();
        let last = self.records.iter().map(|record| record.end_offset).max();
        match (first, last) {
            (Some(first), Some(last)) => last.saturating_sub(first),
            _ => Duration::ZERO,
        }
    }

    #[must_use]
    pub fn total_work(&self) -> Duration {
        self.records
            .iter()
            .fold(Duration::ZERO, |sum, record| sum.saturating_add(record.duration()))
    }

    /// `total_work / span`, scaled by 100. Near 100 means the tasks ran one
    /// after another; near `100 * tasks` means they fully overlapped.
    #[must_use]
    pub fn overlap_x100(&self) -> u64 {
        let span = self.span().as_micros();
        if span == 0 {
            return 0;
        }
        let scaled = self
            .total_work()
            .as_micros()
            .saturating_mul(100)
            .checked_div(span)
            .unwrap_or(0);
        u64::try_from(scaled).unwrap_or(u64::MAX)
    }

    /// True when no two task timelines intersect.
    #[must_use]
    pub fn is_sequential(&self) -> bool {
        let mut windows: Vec<(Duration, Duration)> = self
            .records
            .iter()
            .map(|record| (record.start_offset, record.end_offset))
            .collect();
        windows.sort_unstable();
        windows
            .windows(2)
            .all(|pair| matches!(pair, [left, right] if left.1 <= right.0))
    }
}

mod duration_micros {
    use serde::Serializer;
    use std::time::Duration;

    pub(super) fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(u64::try_from(value.as_micros()).unwrap_or(u64::MAX))
    }
}
