use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub(super) const COMPLETION_BODY: &str = r#"{"choices":[{"message":{"role":"assistant","content":"I am a large language model. How can I help you today?"},"finish_reason":"stop","index":0,"logprobs":null}],"object":"chat.completion","usage":{"prompt_tokens":3019,"completion_tokens":104,"total_tokens":3123,"prompt_tokens_details":{"cached_tokens":2048}},"created":1735120033,"system_fingerprint":null,"model":"qwen-plus","id":"chatcmpl-6ada9ed2-7f33-9de2-8bb0-78bd4035025a"}"#;

const OVERLOADED_MESSAGE: &str = "Service temporarily unavailable - too many concurrent requests";
const SHUTTING_DOWN_MESSAGE: &str = "Service shutting down";

pub(super) struct MockState {
    pub(super) permits: Semaphore,
    pub(super) max_concurrent: usize,
    pub(super) response_delay: Duration,
    pub(super) completed: AtomicU64,
    pub(super) shutdown: CancellationToken,
}

impl MockState {
    fn active(&self) -> usize {
        self.max_concurrent
            .saturating_sub(self.permits.available_permits())
    }
}

pub(super) async fn chat_completions(State(state): State<Arc<MockState>>, _body: Bytes) -> Response {
    let Ok(_permit) = state.permits.try_acquire() else {
        debug!("Rejecting completion: no free slot");
        return (StatusCode::SERVICE_UNAVAILABLE, OVERLOADED_MESSAGE).into_response();
    };

    tokio::select! {
        () = tokio::time::sleep(state.response_delay) => {}
        () = state.shutdown.cancelled() => {
            return (StatusCode::SERVICE_UNAVAILABLE, SHUTTING_DOWN_MESSAGE).into_response();
        }
    }

    state.completed.fetch_add(1, Ordering::Relaxed);
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        COMPLETION_BODY,
    )
        .into_response()
}

#[derive(Debug, Serialize)]
struct HealthBody {
    status: &'static str,
    concurrent_usage: String,
    available_slots: usize,
    max_concurrent: usize,
}

pub(super) async fn health(State(state): State<Arc<MockState>>) -> Response {
    let active = state.active();
    // Tenths of a percent.
    let usage_permille = active
        .saturating_mul(1000)
        .checked_div(state.max_concurrent)
        .unwrap_or(0);
    let overloaded = usage_permille > 900;
    let body = HealthBody {
        status: if overloaded { "overloaded" } else { "healthy" },
        concurrent_usage: format!(
            "{}.{}%",
            usage_permille.checked_div(10).unwrap_or(0),
            usage_permille.checked_rem(10).unwrap_or(0)
        ),
        available_slots: state.permits.available_permits(),
        max_concurrent: state.max_concurrent,
    };
    let status = if overloaded {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    (status, Json(body)).into_response()
}

pub(super) async fn metrics(State(state): State<Arc<MockState>>) -> Response {
    let body = format!(
        "# HELP llm_mock_active_requests Currently active requests\n\
         # TYPE llm_mock_active_requests gauge\n\
         llm_mock_active_requests {}\n\
         # HELP llm_mock_max_concurrent_requests Maximum concurrent requests\n\
         # TYPE llm_mock_max_concurrent_requests gauge\n\
         llm_mock_max_concurrent_requests {}\n\
         # HELP llm_mock_completed_requests_total Completions answered with 200\n\
         # TYPE llm_mock_completed_requests_total counter\n\
         llm_mock_completed_requests_total {}\n",
        state.active(),
        state.max_concurrent,
        state.completed.load(Ordering::Relaxed)
    );
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response()
}
