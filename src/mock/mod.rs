//! Mock chat-completion endpoint that answers after a fixed delay.
mod handlers;
mod server;

#[cfg(test)]
mod tests;

pub use server::{MockConfig, bind, router, serve};
