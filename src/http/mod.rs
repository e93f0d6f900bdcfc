//! HTTP/1.1 implementation of the dispatch [`Endpoint`](crate::dispatch::Endpoint).
mod client;
mod execution;

#[cfg(test)]
mod tests;

pub use client::{HttpClientConfig, HttpEndpoint, bearer_header, build_header_map, parse_endpoint_url};
