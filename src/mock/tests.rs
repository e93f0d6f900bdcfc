use super::server::CHAT_COMPLETIONS_PATH;
use super::*;
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn run_async_test<F>(future: F) -> Result<(), String>
where
    F: Future<Output = Result<(), String>>,
{
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .map_err(|err| format!("Failed to build runtime: {}", err))?;
    runtime.block_on(future)
}

struct RunningMock {
    base: String,
    shutdown: CancellationToken,
    server: tokio::task::JoinHandle<crate::error::AppResult<()>>,
}

async fn start_mock(response_delay: Duration, max_concurrent: usize) -> Result<RunningMock, String> {
    let config = MockConfig {
        listen: SocketAddr::from(([127, 0, 0, 1], 0)),
        response_delay,
        max_concurrent,
    };
    let listener = bind(config.listen).await.map_err(|err| err.to_string())?;
    let addr = listener
        .local_addr()
        .map_err(|err| format!("local addr failed: {}", err))?;
    let shutdown = CancellationToken::new();
    let server_shutdown = shutdown.clone();
    let server = tokio::spawn(async move { serve(listener, &config, server_shutdown).await });
    Ok(RunningMock {
        base: format!("http://{}", addr),
        shutdown,
        server,
    })
}

async fn post_completion(client: &reqwest::Client, base: &str) -> Result<reqwest::Response, String> {
    client
        .post(format!("{}{}", base, CHAT_COMPLETIONS_PATH))
        .header("Content-Type", "application/json")
        .body(r#"{"model":"qwen-plus","messages":[{"role":"user","content":"hi"}]}"#)
        .send()
        .await
        .map_err(|err| format!("request failed: {}", err))
}

#[test]
fn completion_answers_after_delay() -> Result<(), String> {
    run_async_test(async {
        let mock = start_mock(Duration::from_millis(50), 4).await?;
        let client = reqwest::Client::new();

        let started = std::time::Instant::now();
        let response = post_completion(&client, &mock.base).await?;
        let elapsed = started.elapsed();
        if response.status().as_u16() != 200 {
            return Err(format!("Unexpected status: {}", response.status()));
        }
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|err| format!("invalid json: {}", err))?;
        if body.get("object").and_then(serde_json::Value::as_str) != Some("chat.completion") {
            return Err(format!("Unexpected body: {}", body));
        }
        if elapsed < Duration::from_millis(50) {
            return Err(format!("Answered before the delay: {:?}", elapsed));
        }

        mock.shutdown.cancel();
        drop(mock.server.await);
        Ok(())
    })
}

#[test]
fn extra_concurrent_requests_get_503() -> Result<(), String> {
    run_async_test(async {
        let mock = start_mock(Duration::from_millis(300), 1).await?;
        let client = reqwest::Client::new();

        let first = {
            let client = client.clone();
            let base = mock.base.clone();
            tokio::spawn(async move { post_completion(&client, &base).await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;

        let health = client
            .get(format!("{}/health", mock.base))
            .send()
            .await
            .map_err(|err| format!("health failed: {}", err))?;
        if health.status().as_u16() != 503 {
            return Err(format!("Expected overloaded health, got {}", health.status()));
        }

        let second = post_completion(&client, &mock.base).await?;
        if second.status().as_u16() != 503 {
            return Err(format!("Expected 503, got {}", second.status()));
        }

        let first = first
            .await
            .map_err(|err| format!("join failed: {}", err))??;
        if first.status().as_u16() != 200 {
            return Err(format!("Expected 200, got {}", first.status()));
        }

        mock.shutdown.cancel();
        drop(mock.server.await);
        Ok(())
    })
}

#[test]
fn health_reports_free_slots() -> Result<(), String> {
    run_async_test(async {
        let mock = start_mock(Duration::from_millis(10), 8).await?;
        let response = reqwest::get(format!("{}/health", mock.base))
            .await
            .map_err(|err| format!("health failed: {}", err))?;
        if response.status().as_u16() != 200 {
            return Err(format!("Unexpected status: {}", response.status()));
        }
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|err| format!("invalid json: {}", err))?;
        let expected = serde_json::json!({
            "status": "healthy",
            "concurrent_usage": "0.0%",
            "available_slots": 8,
            "max_concurrent": 8,
        });
        if body != expected {
            return Err(format!("Unexpected health: {}", body));
        }

        mock.shutdown.cancel();
        drop(mock.server.await);
        Ok(())
    })
}

#[test]
fn metrics_count_completions() -> Result<(), String> {
    run_async_test(async {
        let mock = start_mock(Duration::from_millis(5), 3).await?;
        let client = reqwest::Client::new();
        for _ in 0..2 {
            post_completion(&client, &mock.base).await?;
        }

        let text = client
            .get(format!("{}/metrics", mock.base))
            .send()
            .await
            .map_err(|err| format!("metrics failed: {}", err))?
            .text()
            .await
            .map_err(|err| format!("metrics body failed: {}", err))?;
        let expected = [
            "llm_mock_active_requests 0\n",
            "llm_mock_max_concurrent_requests 3\n",
            "llm_mock_completed_requests_total 2\n",
        ];
        for line in expected {
            if !text.contains(line) {
                return Err(format!("Missing '{}' in metrics:\n{}", line.trim_end(), text));
            }
        }

        mock.shutdown.cancel();
        drop(mock.server.await);
        Ok(())
    })
}

#[test]
fn oversized_body_is_rejected() -> Result<(), String> {
    run_async_test(async {
        let mock = start_mock(Duration::from_millis(5), 2).await?;
        let response = reqwest::Client::new()
            .post(format!("{}{}", mock.base, CHAT_COMPLETIONS_PATH))
            .body(vec![b'a'; 32 * 1024])
            .send()
            .await
            .map_err(|err| format!("request failed: {}", err))?;
        if response.status().as_u16() != 413 {
            return Err(format!("Expected 413, got {}", response.status()));
        }

        mock.shutdown.cancel();
        drop(mock.server.await);
        Ok(())
    })
}

async fn wait_for_active(client: &reqwest::Client, base: &str, active: usize) -> Result<(), String> {
    let expected = format!("llm_mock_active_requests {}", active);
    let poll = async {
        loop {
            let metrics = client
                .get(format!("{}/metrics", base))
                .send()
                .await
                .map_err(|err| format!("metrics request failed: {}", err))?
                .text()
                .await
                .map_err(|err| format!("metrics body failed: {}", err))?;
            if metrics.lines().any(|line| line == expected) {
                return Ok::<(), String>(());
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(5), poll)
        .await
        .map_err(|_elapsed| format!("Never saw '{}'", expected))?
}

#[test]
fn shutdown_stops_server() -> Result<(), String> {
    run_async_test(async {
        let mock = start_mock(Duration::from_secs(30), 2).await?;
        let client = reqwest::Client::new();
        let pending = {
            let client = client.clone();
            let base = mock.base.clone();
            tokio::spawn(async move { post_completion(&client, &base).await })
        };
        wait_for_active(&client, &mock.base, 1).await?;
        mock.shutdown.cancel();

        let stopped = tokio::time::timeout(Duration::from_secs(5), mock.server)
            .await
            .map_err(|_elapsed| "Server did not stop".to_owned())?
            .map_err(|err| format!("join failed: {}", err))?;
        stopped.map_err(|err| err.to_string())?;

        let response = tokio::time::timeout(Duration::from_secs(5), pending)
            .await
            .map_err(|_elapsed| "In-flight call was not released".to_owned())?
            .map_err(|err| format!("join failed: {}", err))??;
        if response.status().as_u16() != 503 {
            return Err(format!("Expected in-flight call to be released, got {}", response.status()));
        }
        Ok(())
    })
}
