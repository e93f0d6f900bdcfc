use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::future::OptionFuture;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{AppResult, ValidationError};
use crate::metrics::{Aggregator, CallOutcome, RecordStatus};

use super::pool::spawn_pool;
use super::{
    ConcurrencyMode, DispatchConfig, DispatchReport, DispatchRequest, Endpoint, MAX_TARGET_COUNT,
    RunStatus,
};

/// Fans a request template out to an [`Endpoint`] and joins the results.
pub struct Dispatcher {
    endpoint: Arc<dyn Endpoint>,
    config: DispatchConfig,
}

/// Shared state handed to every task of one run.
#[derive(Clone)]
pub(super) struct TaskContext {
    pub(super) endpoint: Arc<dyn Endpoint>,
    pub(super) request: Arc<DispatchRequest>,
    pub(super) aggregator: Arc<Aggregator>,
    pub(super) cancel: CancellationToken,
    completed: Arc<AtomicU64>,
}

impl Dispatcher {
    #[must_use]
    pub const fn new(endpoint: Arc<dyn Endpoint>, config: DispatchConfig) -> Self {
        Self { endpoint, config }
    }

    /// Runs one dispatch and waits for every call or the overall timeout.
    ///
    /// # Errors
    ///
    /// Returns an error when the target count exceeds [`MAX_TARGET_COUNT`]
    /// or the endpoint rejects the request template.
    pub async fn run(&self, request: DispatchRequest) -> AppResult<DispatchReport> {
        self.run_until(request, CancellationToken::new()).await
    }

    /// Like [`Dispatcher::run`], but also stops when `shutdown` is cancelled.
    ///
    /// # Errors
    ///
    /// Returns an error when the target count exceeds [`MAX_TARGET_COUNT`]
    /// or the endpoint rejects the request template.
    pub async fn run_until(
        &self,
        request: DispatchRequest,
        shutdown: CancellationToken,
    ) -> AppResult<DispatchReport> {
        if request.target_count > MAX_TARGET_COUNT {
            return Err(ValidationError::TargetCountTooLarge {
                value: i64::try_from(request.target_count).unwrap_or(i64::MAX),
                max: MAX_TARGET_COUNT,
            }
            .into());
        }
        self.endpoint.prepare(&request)?;

        let started = Instant::now();
        let target_count = request.target_count;
        let mode = request.concurrency_mode;
        info!(
            target_count,
            mode = mode.as_str(),
            url = %request.endpoint_url,
            "Starting dispatch run"
        );

        let aggregator = Arc::new(Aggregator::new(target_count));
        if target_count == 0 {
            return Ok(finish(aggregator, RunStatus::Completed, started.elapsed()));
        }

        let context = TaskContext {
            endpoint: Arc::clone(&self.endpoint),
            request: Arc::new(request),
            aggregator: Arc::clone(&aggregator),
            cancel: CancellationToken::new(),
            completed: Arc::new(AtomicU64::new(0)),
        };

        let mut tasks = JoinSet::new();
        match mode {
            ConcurrencyMode::Unbounded => {
                for index in 0..target_count {
                    let context = context.clone();
                    tasks.spawn(async move { run_call(&context, index, None).await });
                }
            }
            ConcurrencyMode::Serialized => {
                let gate = Arc::new(Mutex::new(()));
                for index in 0..target_count {
                    let context = context.clone();
                    let gate = Arc::clone(&gate);
                    tasks.spawn(async move { run_call(&context, index, Some(gate.as_ref())).await });
                }
            }
            ConcurrencyMode::Pooled => {
                spawn_pool(
                    &mut tasks,
                    &context,
                    self.config.pool_size.get(),
                    self.config.queue_capacity.get(),
                );
            }
        }

        let deadline = OptionFuture::from(self.config.overall_timeout.map(tokio::time::sleep));
        // Task cancellation is only triggered below, after a status is chosen.
        let status = tokio::select! {
            biased;
            () = shutdown.cancelled() => RunStatus::Interrupted,
            Some(()) = deadline => RunStatus::TimeoutExceeded,
            () = join_all(&mut tasks) => RunStatus::Completed,
        };

        if status.is_partial() {
            context.cancel.cancel();
            let cancelled = aggregator.seal_with_cancelled(started.elapsed());
            tasks.abort_all();
            join_all(&mut tasks).await;
            warn!(
                status = status.as_str(),
                cancelled, "Dispatch run stopped before every call reported"
            );
        } else {
            let missing = aggregator.seal_with_cancelled(started.elapsed());
            if missing > 0 {
                error!(missing, "Dispatch tasks exited without reporting an outcome");
            }
        }
        drop(context);

        let report = finish(aggregator, status, started.elapsed());
        info!(
            total = report.summary.total,
            succeeded = report.summary.succeeded,
            failed = report.summary.failed,
            cancelled = report.summary.cancelled,
            elapsed_ms = u64::try_from(report.elapsed.as_millis()).unwrap_or(u64::MAX),
            "Dispatch run finished"
        );
        Ok(report)
    }
}

/// Performs one call unless the run is cancelled first. `gate` serializes
/// the call behind a shared lock.
pub(super) async fn run_call(context: &TaskContext, index: usize, gate: Option<&Mutex<()>>) {
    let outcome = tokio::select! {
        () = context.cancel.cancelled() => return,
        outcome = async {
            let _guard = OptionFuture::from(gate.map(Mutex::lock)).await;
            context.endpoint.call(index, &context.request).await
        } => outcome,
    };
    context.complete(outcome);
}

impl TaskContext {
    fn complete(&self, outcome: CallOutcome) {
        let index = outcome.index;
        let success = outcome.success;
        let error = outcome.error;
        match self.aggregator.record(outcome) {
            RecordStatus::Recorded => {
                let counter = self
                    .completed
                    .fetch_add(1, Ordering::Relaxed)
                    .saturating_add(1);
                debug!(index, success, ?error, "counter: {}", counter);
            }
            RecordStatus::Sealed => {
                debug!(index, "Discarding completion that arrived after the run was sealed");
            }
            RecordStatus::Duplicate | RecordStatus::OutOfRange => {
                warn!(index, "Endpoint produced an outcome that does not belong to this run");
            }
        }
    }
}

async fn join_all(tasks: &mut JoinSet<()>) {
    while let Some(result) = tasks.join_next().await {
        if let Err(err) = result
            && err.is_panic()
        {
            error!("Dispatch task panicked: {}", err);
        }
    }
}

fn finish(aggregator: Arc<Aggregator>, status: RunStatus, elapsed: Duration) -> DispatchReport {
    let (summary, outcomes) = match Arc::try_unwrap(aggregator) {
        Ok(aggregator) => aggregator.finish(),
        Err(shared) => (shared.snapshot(), shared.outcomes()),
    };
    DispatchReport {
        summary,
        status,
        outcomes,
        elapsed,
    }
}
