use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use reqwest::RequestBuilder;
use tokio::time::Instant;
use tracing::warn;

use crate::metrics::{CallOutcome, ErrorKind};

/// Sends one request and turns every result into a [`CallOutcome`].
pub(super) async fn execute_call(index: usize, builder: RequestBuilder) -> CallOutcome {
    let started = Instant::now();
    let response = match builder.send().await {
        Ok(response) => response,
        Err(err) => {
            let kind = classify(&err);
            warn!(index, error = %kind, "Call failed: {}", err);
            return CallOutcome::failed(index, kind, None, started.elapsed(), None);
        }
    };

    let status = response.status();
    let body = read_body(response).await;
    let latency = started.elapsed();
    match body {
        Ok(body) if status.is_success() => {
            CallOutcome::succeeded(index, status.as_u16(), latency, body)
        }
        Ok(body) => {
            warn!(index, status = status.as_u16(), "Endpoint answered with a non-success status");
            CallOutcome::failed(
                index,
                ErrorKind::ProtocolError,
                Some(status.as_u16()),
                latency,
                Some(body),
            )
        }
        Err(err) => {
            let kind = classify(&err);
            warn!(index, error = %kind, "Failed to read response body: {}", err);
            CallOutcome::failed(index, kind, Some(status.as_u16()), latency, None)
        }
    }
}

fn classify(err: &reqwest::Error) -> ErrorKind {
    if err.is_timeout() {
        ErrorKind::Timeout
    } else {
        ErrorKind::NetworkFailure
    }
}

async fn read_body(response: reqwest::Response) -> Result<Bytes, reqwest::Error> {
    let mut stream = response.bytes_stream();
    let mut body = BytesMut::new();
    while let Some(chunk) = stream.next().await {
        body.extend_from_slice(&chunk?);
    }
    Ok(body.freeze())
}
