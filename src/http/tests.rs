use super::*;
use crate::dispatch::{DispatchRequest, Endpoint, TargetCount};
use crate::error::ValidationError;
use crate::metrics::ErrorKind;
use std::collections::BTreeMap;
use std::future::Future;
use std::io::{Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::sync::mpsc;
use std::thread;
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

/// Serves one connection with a canned response and reports the raw request.
fn spawn_one_shot_server(
    response: &'static [u8],
    delay: Duration,
) -> Result<(String, mpsc::Receiver<String>, thread::JoinHandle<()>), String> {
    let listener = TcpListener::bind("127.0.0.1:0")
        .map_err(|err| format!("bind test server failed: {}", err))?;
    let addr = listener
        .local_addr()
        .map_err(|err| format!("server addr failed: {}", err))?;
    let (request_tx, request_rx) = mpsc::channel();

    let handle = thread::spawn(move || {
        let Ok((mut stream, _)) = listener.accept() else {
            return;
        };
        let request = read_request(&mut stream);
        drop(request_tx.send(request));
        thread::sleep(delay);
        if stream.write_all(response).is_err() {
            return;
        }
        drop(stream.flush());
        drop(stream.shutdown(Shutdown::Both));
    });

    Ok((format!("http://{}/v1/chat/completions", addr), request_rx, handle))
}

fn read_request(stream: &mut TcpStream) -> String {
    let mut raw = Vec::new();
    let mut buffer = [0u8; 1024];
    loop {
        let Ok(read) = stream.read(&mut buffer) else {
            break;
        };
        if read == 0 {
            break;
        }
        raw.extend_from_slice(buffer.get(..read).unwrap_or_default());
        let text = String::from_utf8_lossy(&raw);
        if let Some((head, body)) = text.split_once("\r\n\r\n") {
            let expected = head
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if body.len() >= expected {
                break;
            }
        }
    }
    String::from_utf8_lossy(&raw).into_owned()
}

fn endpoint(request_timeout: Duration) -> Result<HttpEndpoint, String> {
    HttpEndpoint::new(&HttpClientConfig {
        request_timeout,
        connect_timeout: Duration::from_secs(2),
    })
    .map_err(|err| err.to_string())
}

fn request(url: &str) -> DispatchRequest {
    DispatchRequest::new(TargetCount::new(1), url)
        .with_header("Authorization", "Bearer sk-test")
        .with_body(r#"{"model":"qwen-plus","messages":[]}"#)
}

#[test]
fn success_returns_status_and_body() -> Result<(), String> {
    run_async_test(async {
        let (url, requests, server) = spawn_one_shot_server(
            b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 11\r\nConnection: close\r\n\r\n{\"ok\":true}",
            Duration::ZERO,
        )?;
        let client = endpoint(Duration::from_secs(5))?;
        let outcome = client.call(7, &request(&url)).await;
        drop(server.join());

        if !outcome.success || outcome.status_code != Some(200) || outcome.index != 7 {
            return Err(format!("Unexpected outcome: {:?}", outcome));
        }
        if outcome.response_body.as_deref() != Some(br#"{"ok":true}"#.as_slice()) {
            return Err(format!("Unexpected body: {:?}", outcome.response_body));
        }

        let raw = requests
            .recv_timeout(Duration::from_secs(1))
            .map_err(|err| format!("missing request: {}", err))?;
        let lower = raw.to_ascii_lowercase();
        if !raw.starts_with("POST /v1/chat/completions HTTP/1.1\r\n") {
            return Err(format!("Unexpected request line: {}", raw));
        }
        let expected_headers = [
            "authorization: bearer sk-test",
            "content-type: application/json",
            "user-agent: llm-fanout/",
        ];
        for header in expected_headers {
            if !lower.contains(header) {
                return Err(format!("Missing '{}' in request: {}", header, raw));
            }
        }
        if !raw.ends_with(r#"{"model":"qwen-plus","messages":[]}"#) {
            return Err(format!("Unexpected request body: {}", raw));
        }
        Ok(())
    })
}

#[test]
fn header_names_differing_in_case_are_sent_once() -> Result<(), String> {
    run_async_test(async {
        let (url, requests, server) = spawn_one_shot_server(
            b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\n{}",
            Duration::ZERO,
        )?;
        let client = endpoint(Duration::from_secs(5))?;
        let template = request(&url).with_header("authorization", "Bearer sk-second");
        let outcome = client.call(0, &template).await;
        drop(server.join());
        if !outcome.success {
            return Err(format!("Unexpected outcome: {:?}", outcome));
        }

        let raw = requests
            .recv_timeout(Duration::from_secs(1))
            .map_err(|err| format!("missing request: {}", err))?;
        let authorization: Vec<&str> = raw
            .lines()
            .filter(|line| line.to_ascii_lowercase().starts_with("authorization:"))
            .collect();
        if authorization.len() != 1 || !authorization.iter().all(|line| line.ends_with("sk-second")) {
            return Err(format!("Unexpected authorization lines: {:?}", authorization));
        }
        Ok(())
    })
}

#[test]
fn non_success_status_is_protocol_error() -> Result<(), String> {
    run_async_test(async {
        let (url, _requests, server) = spawn_one_shot_server(
            b"HTTP/1.1 503 Service Unavailable\r\nContent-Length: 4\r\nConnection: close\r\n\r\nbusy",
            Duration::ZERO,
        )?;
        let client = endpoint(Duration::from_secs(5))?;
        let outcome = client.call(0, &request(&url)).await;
        drop(server.join());

        if outcome.success
            || outcome.error != Some(ErrorKind::ProtocolError)
            || outcome.status_code != Some(503)
        {
            return Err(format!("Unexpected outcome: {:?}", outcome));
        }
        Ok(())
    })
}

#[test]
fn slow_endpoint_is_timeout() -> Result<(), String> {
    run_async_test(async {
        let (url, _requests, server) = spawn_one_shot_server(
            b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\nOK",
            Duration::from_millis(500),
        )?;
        let client = endpoint(Duration::from_millis(100))?;
        let outcome = client.call(1, &request(&url)).await;
        drop(server.join());

        if outcome.success || outcome.error != Some(ErrorKind::Timeout) {
            return Err(format!("Unexpected outcome: {:?}", outcome));
        }
        Ok(())
    })
}

#[test]
fn refused_connection_is_network_failure() -> Result<(), String> {
    run_async_test(async {
        let listener = TcpListener::bind("127.0.0.1:0")
            .map_err(|err| format!("bind failed: {}", err))?;
        let addr = listener
            .local_addr()
            .map_err(|err| format!("addr failed: {}", err))?;
        drop(listener);

        let client = endpoint(Duration::from_secs(2))?;
        let outcome = client
            .call(2, &request(&format!("http://{}/v1", addr)))
            .await;
        if outcome.success
            || outcome.error != Some(ErrorKind::NetworkFailure)
            || outcome.status_code.is_some()
        {
            return Err(format!("Unexpected outcome: {:?}", outcome));
        }
        Ok(())
    })
}

#[test]
fn parse_endpoint_url_rules() -> Result<(), String> {
    parse_endpoint_url("https://dashscope.example.com/compatible-mode/v1/chat/completions")
        .map_err(|err| err.to_string())?;
    match parse_endpoint_url("ftp://example.com") {
        Err(ValidationError::UnsupportedScheme { .. }) => {}
        other => return Err(format!("Expected UnsupportedScheme, got {:?}", other)),
    }
    match parse_endpoint_url("not a url") {
        Err(ValidationError::InvalidUrl { .. }) => {}
        other => return Err(format!("Expected InvalidUrl, got {:?}", other)),
    }
    Ok(())
}

#[test]
fn header_map_defaults_content_type() -> Result<(), String> {
    let mut headers = BTreeMap::new();
    headers.insert("X-Trace".to_owned(), "abc".to_owned());
    let map = build_header_map(&headers).map_err(|err| err.to_string())?;
    if map.get("content-type").map(|value| value.as_bytes()) != Some(b"application/json".as_slice())
    {
        return Err(format!("Missing default content type: {:?}", map));
    }

    headers.insert("content-type".to_owned(), "text/plain".to_owned());
    let overridden = build_header_map(&headers).map_err(|err| err.to_string())?;
    if overridden.get("content-type").map(|value| value.as_bytes())
        != Some(b"text/plain".as_slice())
    {
        return Err(format!("User content type must win: {:?}", overridden));
    }
    Ok(())
}

#[test]
fn header_map_rejects_invalid_name() -> Result<(), String> {
    let mut headers = BTreeMap::new();
    headers.insert("Bad Header".to_owned(), "x".to_owned());
    match build_header_map(&headers) {
        Err(ValidationError::InvalidHeaderName { .. }) => Ok(()),
        other => Err(format!("Expected InvalidHeaderName, got {:?}", other)),
    }
}

#[test]
fn bearer_header_rules() -> Result<(), String> {
    let (name, value) = bearer_header("sk-123").map_err(|err| err.to_string())?;
    if name != "authorization" || value != "Bearer sk-123" {
        return Err(format!("Unexpected header: {}: {}", name, value));
    }
    if bearer_header("   ").is_ok() || bearer_header("sk\n123").is_ok() {
        return Err("Expected invalid tokens to be rejected".to_owned());
    }
    Ok(())
}

#[test]
fn prepare_rejects_bad_template() -> Result<(), String> {
    let client = endpoint(Duration::from_secs(1))?;
    let request = DispatchRequest::new(TargetCount::new(1), "mailto:someone@example.com");
    if client.prepare(&request).is_ok() {
        return Err("Expected mailto URL to be rejected".to_owned());
    }
    Ok(())
}
