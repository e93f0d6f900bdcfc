use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tracing::trace;

use super::runner::{TaskContext, run_call};

/// Spawns `pool_size` workers that drain a queue of call indices, plus the
/// producer that fills it. The producer waits while the queue is full.
pub(super) fn spawn_pool(
    tasks: &mut JoinSet<()>,
    context: &TaskContext,
    pool_size: usize,
    queue_capacity: usize,
) {
    let target_count = context.aggregator.target_count();
    let (queue_tx, queue_rx) = mpsc::channel::<usize>(queue_capacity.max(1));
    let queue_rx = Arc::new(Mutex::new(queue_rx));
    let workers = pool_size.min(target_count).max(1);

    for worker in 0..workers {
        let context = context.clone();
        let queue_rx = Arc::clone(&queue_rx);
        tasks.spawn(async move {
            loop {
                let next = tokio::select! {
                    () = context.cancel.cancelled() => None,
                    index = async { queue_rx.lock().await.recv().await } => index,
                };
                let Some(index) = next else {
                    break;
                };
                run_call(&context, index, None).await;
            }
            trace!(worker, "Pool worker exiting");
        });
    }

    let cancel = context.cancel.clone();
    tasks.spawn(async move {
        for index in 0..target_count {
            tokio::select! {
                () = cancel.cancelled() => break,
                sent = queue_tx.send(index) => {
                    if sent.is_err() {
                        break;
                    }
                }
            }
        }
    });
}
