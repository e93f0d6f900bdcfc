use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::{CallOutcome, DispatchSummary};

/// Upper bound on up-front allocation; larger runs grow as outcomes arrive.
const PRESIZE_LIMIT: usize = 4_096;

/// Result of handing one outcome to the aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordStatus {
    Recorded,
    /// An outcome with the same index was already applied.
    Duplicate,
    /// The index is outside `[0, target_count)`.
    OutOfRange,
    /// The run was sealed; late completions are discarded.
    Sealed,
}

struct AggregatorState {
    summary: DispatchSummary,
    seen: HashSet<usize>,
    outcomes: Vec<CallOutcome>,
    sealed: bool,
}

impl AggregatorState {
    fn pending(&self, target_count: usize) -> Vec<usize> {
        (0..target_count)
            .filter(|index| !self.seen.contains(index))
            .collect()
    }
}

/// Collects call outcomes for a single dispatch run.
///
/// Every mutation happens under one short-lived lock that is never held
/// across an await, so `record` may be called from any number of tasks and
/// `snapshot` always observes a state where `succeeded + failed == total`.
pub struct Aggregator {
    target_count: usize,
    state: Mutex<AggregatorState>,
}

impl Aggregator {
    #[must_use]
    pub fn new(target_count: usize) -> Self {
        let presize = target_count.min(PRESIZE_LIMIT);
        Self {
            target_count,
            state: Mutex::new(AggregatorState {
                summary: DispatchSummary {
                    latencies: Vec::with_capacity(presize),
                    ..DispatchSummary::default()
                },
                seen: HashSet::with_capacity(presize),
                outcomes: Vec::with_capacity(presize),
                sealed: false,
            }),
        }
    }

    #[must_use]
    pub const fn target_count(&self) -> usize {
        self.target_count
    }

    /// Applies one outcome exactly once.
    pub fn record(&self, outcome: CallOutcome) -> RecordStatus {
        let mut state = self.lock();
        if state.sealed {
            return RecordStatus::Sealed;
        }
        if outcome.index >= self.target_count {
            return RecordStatus::OutOfRange;
        }
        if !state.seen.insert(outcome.index) {
            return RecordStatus::Duplicate;
        }

        let summary = &mut state.summary;
        if outcome.is_cancelled() {
            summary.cancelled = summary.cancelled.saturating_add(1);
        } else {
            summary.total = summary.total.saturating_add(1);
            if outcome.success {
                summary.succeeded = summary.succeeded.saturating_add(1);
            } else {
                summary.failed = summary.failed.saturating_add(1);
            }
            summary.latencies.push(outcome.latency);
            if let Some(body) = outcome.response_body.as_ref() {
                summary.last_response = Some(body.clone());
            }
        }
        state.outcomes.push(outcome);
        RecordStatus::Recorded
    }

    /// Returns a consistent copy of the summary so far.
    #[must_use]
    pub fn snapshot(&self) -> DispatchSummary {
        self.lock().summary.clone()
    }

    /// Every outcome recorded so far, ordered by index.
    #[must_use]
    pub fn outcomes(&self) -> Vec<CallOutcome> {
        let mut outcomes = self.lock().outcomes.clone();
        outcomes.sort_by_key(|outcome| outcome.index);
        outcomes
    }

    /// Indices that have not reported yet.
    #[must_use]
    pub fn pending_indices(&self) -> Vec<usize> {
        self.lock().pending(self.target_count)
    }

    /// Stops accepting completions and marks every pending index as
    /// cancelled. Returns the number of cancelled outcomes written.
    pub fn seal_with_cancelled(&self, elapsed: Duration) -> usize {
        let mut state = self.lock();
        if state.sealed {
            return 0;
        }
        state.sealed = true;

        let pending = state.pending(self.target_count);
        for index in &pending {
            state.seen.insert(*index);
            state.outcomes.push(CallOutcome::cancelled(*index, elapsed));
        }
        let cancelled = u64::try_from(pending.len()).unwrap_or(u64::MAX);
        state.summary.cancelled = state.summary.cancelled.saturating_add(cancelled);
        pending.len()
    }

    /// Freezes the run, returning the summary and every outcome ordered by
    /// index.
    #[must_use]
    pub fn finish(self) -> (DispatchSummary, Vec<CallOutcome>) {
        let state = self
            .state
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        let mut outcomes = state.outcomes;
        outcomes.sort_by_key(|outcome| outcome.index);
        (state.summary, outcomes)
    }

    fn lock(&self) -> MutexGuard<'_, AggregatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
