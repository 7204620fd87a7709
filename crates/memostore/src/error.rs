//! Error types for memostore

/// Result type alias for store operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for store operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The value producer handed to `fetch` failed; nothing was stored
    #[error("value producer failed: {0}")]
    Producer(#[source] anyhow::Error),

    /// Backend lost consistency (never raised by `MemoryStore`)
    #[error("store state poisoned")]
    Poisoned,

    /// Failure reported by a third-party backend
    #[error("backend error: {0}")]
    Backend(String),
}

impl Error {
    /// Unwrap a producer failure, returning any other error untouched
    pub fn into_producer(self) -> std::result::Result<anyhow::Error, Error> {
        match self {
            Error::Producer(source) => Ok(source),
            other => Err(other),
        }
    }
}
