use std::net::SocketAddr;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MockError {
    #[error("Failed to bind mock server on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("Mock server failed: {source}")]
    Serve {
        #[source]
        source: std::io::Error,
    },
}
