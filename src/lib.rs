//! Core library for the `llm-fanout` CLI.
//!
//! The crate fans one chat-completion request template out to an HTTP
//! endpoint as N concurrent calls and aggregates every outcome into a
//! summary. It also carries a lock-contention probe and a mock
//! chat-completion endpoint used to exercise the dispatcher end to end.
mod app;
pub mod args;
pub mod config;
pub mod dispatch;
pub mod entry;
pub mod error;
pub mod http;
pub mod logger;
pub mod metrics;
pub mod mock;
pub mod probe;
pub mod shutdown;
