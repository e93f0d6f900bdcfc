use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("Failed to spawn probe thread {index}: {source}")]
    ThreadSpawn {
        index: usize,
        #[source]
        source: std::io::Error,
    },
    #[error("Probe thread {index} panicked.")]
    ThreadPanicked { index: usize },
    #[error("Probe task failed: {source}")]
    TaskJoin {
        #[source]
        source: tokio::task::JoinError,
    },
}
