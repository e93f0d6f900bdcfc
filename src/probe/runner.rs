use std::sync::{Arc, PoisonError};
use std::thread;
use std::time::Instant;

use chrono::Utc;
use futures_util::future::OptionFuture;
use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::error::{AppError, AppResult, ProbeError};

use super::{ProbeConfig, ProbeExecutor, ProbeMode, ProbeReport, ProbeTaskRecord};

type BlockingGate = Arc<std::sync::Mutex<()>>;
type AsyncGate = Arc<tokio::sync::Mutex<()>>;
/// Cap on up-front allocation for per-task bookkeeping.
const PRESIZE_LIMIT: usize = 1_024;

/// Runs the probe to completion on its own threads or runtime.
///
/// Must be called outside of any tokio runtime.
///
/// # Errors
///
/// Returns an error when a thread or runtime cannot be started, or a task
/// panics.
pub fn run_probe(config: &ProbeConfig) -> AppResult<ProbeReport> {
    info!(
        tasks = config.tasks,
        work_ms = u64::try_from(config.work.as_millis()).unwrap_or(u64::MAX),
        mode = config.mode.as_str(),
        executor = config.executor.as_str(),
        "Starting synchronization probe"
    );

    let started_at = Utc::now();
    let origin = Instant::now();
    let mut records = match config.executor {
        ProbeExecutor::Threads => run_threads(config, origin)?,
        ProbeExecutor::Tasks | ProbeExecutor::BlockingTasks => run_tasks(config, origin)?,
    };
    records.sort_by_key(|record| record.index);

    let report = ProbeReport {
        mode: config.mode,
        executor: config.executor,
        work: config.work,
        started_at,
        records,
    };
    info!(
        span_ms = u64::try_from(report.span().as_millis()).unwrap_or(u64::MAX),
        overlap_x100 = report.overlap_x100(),
        "Synchronization probe finished"
    );
    Ok(report)
}

fn run_threads(config: &ProbeConfig, origin: Instant) -> AppResult<Vec<ProbeTaskRecord>> {
    let gate = blocking_gate(config.mode);
    let mut handles = Vec::with_capacity(config.tasks.min(PRESIZE_LIMIT));
    for index in 0..config.tasks {
        let gate = gate.clone();
        let work = config.work;
        let handle = thread::Builder::new()
            .name(format!("probe-{}", index))
            .spawn(move || blocking_step(index, work, gate.as_deref(), origin))
            .map_err(|err| AppError::probe(ProbeError::ThreadSpawn { index, source: err }))?;
        handles.push((index, handle));
    }

    let mut records = Vec::with_capacity(handles.len());
    for (index, handle) in handles {
        let record = handle
            .join()
            .map_err(|_panic| AppError::probe(ProbeError::ThreadPanicked { index }))?;
        records.push(record);
    }
    Ok(records)
}

fn run_tasks(config: &ProbeConfig, origin: Instant) -> AppResult<Vec<ProbeTaskRecord>> {
    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all().thread_name("probe-worker");
    if let Some(worker_threads) = config.worker_threads {
        builder.worker_threads(worker_threads.max(1));
    }
    let runtime = builder.build()?;

    let executor = config.executor;
    let mode = config.mode;
    let tasks = config.tasks;
    let work = config.work;
    runtime.block_on(async move {
        let mut set = JoinSet::new();
        match executor {
            ProbeExecutor::BlockingTasks => {
                let gate = blocking_gate(mode);
                for index in 0..tasks {
                    let gate = gate.clone();
                    set.spawn(async move { blocking_step(index, work, gate.as_deref(), origin) });
                }
            }
            ProbeExecutor::Tasks | ProbeExecutor::Threads => {
                let gate: Option<AsyncGate> = match mode {
                    ProbeMode::Free => None,
                    ProbeMode::Serialized => Some(Arc::new(tokio::sync::Mutex::new(()))),
                };
                for index in 0..tasks {
                    let gate = gate.clone();
                    set.spawn(async move {
                        let _guard =
                            OptionFuture::from(gate.as_deref().map(tokio::sync::Mutex::lock)).await;
                        let start = mark(origin);
                        tokio::time::sleep(work).await;
                        finish(index, start, origin)
                    });
                }
            }
        }

        let mut records = Vec::with_capacity(tasks.min(PRESIZE_LIMIT));
        while let Some(result) = set.join_next().await {
            let record =
                result.map_err(|err| AppError::probe(ProbeError::TaskJoin { source: err }))?;
            records.push(record);
        }
        Ok(records)
    })
}

fn blocking_gate(mode: ProbeMode) -> Option<BlockingGate> {
    match mode {
        ProbeMode::Free => None,
        ProbeMode::Serialized => Some(Arc::new(std::sync::Mutex::new(()))),
    }
}

/// Holds the blocking lock, if any, and blocks the current thread for `work`.
fn blocking_step(
    index: usize,
    work: std::time::Duration,
    gate: Option<&std::sync::Mutex<()>>,
    origin: Instant,
) -> ProbeTaskRecord {
    let _guard = gate.map(|gate| gate.lock().unwrap_or_else(PoisonError::into_inner));
    let start = mark(origin);
    thread::sleep(work);
    finish(index, start, origin)
}

struct Mark {
    offset: std::time::Duration,
    at: chrono::DateTime<Utc>,
}

fn mark(origin: Instant) -> Mark {
    Mark {
        offset: origin.elapsed(),
        at: Utc::now(),
    }
}

fn finish(index: usize, start: Mark, origin: Instant) -> ProbeTaskRecord {
    let end = mark(origin);
    let current = thread::current();
    let worker = format!("{}/{:?}", current.name().unwrap_or("unnamed"), current.id());
    debug!(index, worker = %worker, "Probe task finished");
    ProbeTaskRecord {
        index,
        worker,
        started_at: start.at,
        finished_at: end.at,
        start_offset: start.offset,
        end_offset: end.offset,
    }
}
