use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::time::Duration;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::{AppError, AppResult, MockError};

use super::handlers::{MockState, chat_completions, health, metrics};

pub(super) const CHAT_COMPLETIONS_PATH: &str = "/compatible-mode/v1/chat/completions";
const MAX_BODY_BYTES: usize = 16 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockConfig {
    pub listen: SocketAddr,
    pub response_delay: Duration,
    /// Requests served at once; extra requests are answered with 503.
    pub max_concurrent: usize,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 8080)),
            response_delay: Duration::from_secs(10),
            max_concurrent: 10_000,
        }
    }
}

/// Builds the mock routes. Requests still sleeping when `shutdown` fires are
/// answered with 503.
#[must_use]
pub fn router(config: &MockConfig, shutdown: CancellationToken) -> Router {
    let max_concurrent = config.max_concurrent.max(1);
    let state = Arc::new(MockState {
        permits: Semaphore::new(max_concurrent),
        max_concurrent,
        response_delay: config.response_delay,
        completed: AtomicU64::new(0),
        shutdown,
    });

    Router::new()
        .route(CHAT_COMPLETIONS_PATH, post(chat_completions))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

/// Binds the mock listener.
///
/// # Errors
///
/// Returns an error when the address cannot be bound.
pub async fn bind(addr: SocketAddr) -> AppResult<TcpListener> {
    TcpListener::bind(addr)
        .await
        .map_err(|err| AppError::mock(MockError::Bind { addr, source: err }))
}

/// Serves the mock endpoint until `shutdown` is cancelled.
///
/// # Errors
///
/// Returns an error when the server fails while accepting connections.
pub async fn serve(
    listener: TcpListener,
    config: &MockConfig,
    shutdown: CancellationToken,
) -> AppResult<()> {
    let local = listener.local_addr()?;
    info!(
        listen = %local,
        delay_ms = u64::try_from(config.response_delay.as_millis()).unwrap_or(u64::MAX),
        max_concurrent = config.max_concurrent,
        "Mock chat-completion endpoint listening"
    );

    let app = router(config, shutdown.clone());
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(|err| AppError::mock(MockError::Serve { source: err }))?;

    info!("Mock endpoint stopped");
    Ok(())
}
