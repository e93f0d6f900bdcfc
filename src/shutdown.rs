use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Cancels `shutdown` on Ctrl+C or SIGTERM. The task exits as soon as the
/// token is cancelled for any reason.
#[must_use]
pub fn spawn_signal_handler(shutdown: &CancellationToken) -> JoinHandle<()> {
    let shutdown = shutdown.clone();
    tokio::spawn(async move {
        #[cfg(unix)]
        let mut term_signal = match signal(SignalKind::terminate()) {
            Ok(signal) => Some(signal),
            Err(err) => {
                tracing::error!("Failed to register SIGTERM handler: {}", err);
                None
            }
        };

        #[cfg(unix)]
        {
            tokio::select! {
                () = shutdown.cancelled() => {}
                _ = tokio::signal::ctrl_c() => {
                    tracing::warn!("Received Ctrl+C, shutting down");
                    shutdown.cancel();
                }
                () = async {
                    if let Some(signal) = term_signal.as_mut() {
                        signal.recv().await;
                    } else {
                        std::future::pending::<()>().await;
                    }
                } => {
                    tracing::warn!("Received SIGTERM, shutting down");
                    shutdown.cancel();
                }
            }
        }

        #[cfg(not(unix))]
        {
            tokio::select! {
                () = shutdown.cancelled() => {}
                _ = tokio::signal::ctrl_c() => {
                    tracing::warn!("Received Ctrl+C, shutting down");
                    shutdown.cancel();
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::Future;
    use std::time::Duration;

    fn run_async_test<F>(future: F) -> Result<(), String>
    where
        F: Future<Output = Result<(), String>>,
    {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|err| format!("Failed to build runtime: {}", err))?;
        runtime.block_on(future)
    }

    #[test]
    fn signal_handler_exits_when_token_is_cancelled() -> Result<(), String> {
        run_async_test(async {
            let shutdown = CancellationToken::new();
            let handle = spawn_signal_handler(&shutdown);
            shutdown.cancel();
            tokio::time::timeout(Duration::from_secs(1), handle)
                .await
                .map_err(|_elapsed| "Signal handler did not exit".to_owned())?
                .map_err(|err| format!("Signal handler panicked: {}", err))?;
            Ok(())
        })
    }
}
