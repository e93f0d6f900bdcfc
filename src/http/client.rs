use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Url, Version};

use crate::args::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT, DEFAULT_USER_AGENT};
use crate::dispatch::{DispatchRequest, Endpoint};
use crate::error::{AppError, AppResult, HttpError, ValidationError};
use crate::metrics::CallOutcome;

use super::execution::execute_call;

const JSON_CONTENT_TYPE: &str = "application/json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpClientConfig {
    /// Per-call deadline covering connect, send and the full body read.
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

/// Sends each call as one HTTP/1.1 POST. Never retries.
#[derive(Debug, Clone)]
pub struct HttpEndpoint {
    client: Client,
}

impl HttpEndpoint {
    /// Builds the shared connection pool for a run.
    ///
    /// # Errors
    ///
    /// Returns an error when the TLS backend or client cannot be initialized.
    pub fn new(config: &HttpClientConfig) -> AppResult<Self> {
        let client = Client::builder()
            .http1_only()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(DEFAULT_USER_AGENT)
            .build()
            .map_err(|err| AppError::http(HttpError::BuildClientFailed { source: err }))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Endpoint for HttpEndpoint {
    fn prepare(&self, request: &DispatchRequest) -> AppResult<()> {
        parse_endpoint_url(&request.endpoint_url)?;
        build_header_map(&request.headers)?;
        Ok(())
    }

    async fn call(&self, index: usize, request: &DispatchRequest) -> CallOutcome {
        // Invalid templates are rejected in `prepare`; reqwest defers any
        // remaining builder error to `send`.
        let mut builder = self
            .client
            .post(request.endpoint_url.as_str())
            .version(Version::HTTP_11);
        if !has_header(&request.headers, CONTENT_TYPE.as_str()) {
            builder = builder.header(CONTENT_TYPE, JSON_CONTENT_TYPE);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body.as_ref() {
            builder = builder.body(body.clone());
        }
        execute_call(index, builder).await
    }
}

/// Accepts absolute `http`/`https` URLs that name a host.
///
/// # Errors
///
/// Returns an error for unparsable URLs, other schemes, or a missing host.
pub fn parse_endpoint_url(raw: &str) -> Result<Url, ValidationError> {
    let url = Url::parse(raw.trim()).map_err(|err| ValidationError::InvalidUrl {
        url: raw.to_owned(),
        source: err,
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ValidationError::UnsupportedScheme {
            url: raw.to_owned(),
        });
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(ValidationError::UrlMissingHost);
    }
    Ok(url)
}

/// Validates the request headers and adds `Content-Type: application/json`
/// unless one is already present.
///
/// # Errors
///
/// Returns an error when a header name or value cannot be sent.
pub fn build_header_map(headers: &BTreeMap<String, String>) -> Result<HeaderMap, ValidationError> {
    let mut map = HeaderMap::with_capacity(headers.len().saturating_add(1));
    for (key, value) in headers {
        let name =
            HeaderName::from_bytes(key.as_bytes()).map_err(|err| {
                ValidationError::InvalidHeaderName {
                    header: key.clone(),
                    source: err,
                }
            })?;
        let val = HeaderValue::from_str(value).map_err(|err| ValidationError::InvalidHeaderValue {
            header: key.clone(),
            source: err,
        })?;
        map.insert(name, val);
    }
    if !map.contains_key(CONTENT_TYPE) {
        map.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
    }
    Ok(map)
}

/// Builds the `Authorization` header pair for a bearer token.
///
/// # Errors
///
/// Returns an error when the token is empty or not a valid header value.
pub fn bearer_header(token: &str) -> Result<(String, String), ValidationError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(ValidationError::InvalidBearerToken);
    }
    let value = format!("Bearer {}", token);
    HeaderValue::from_str(&value).map_err(|_err| ValidationError::InvalidBearerToken)?;
    Ok((reqwest::header::AUTHORIZATION.as_str().to_owned(), value))
}

fn has_header(headers: &BTreeMap<String, String>, name: &str) -> bool {
    headers.keys().any(|key| key.eq_ignore_ascii_case(name))
}
