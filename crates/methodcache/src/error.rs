//! Error types for methodcache

use std::io;

/// Result type alias for memoization operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for memoization operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Target has neither a `<method>_key` function nor a generic key builder
    #[error("no key capability for method `{method}`: define `{method}_key` or a key namespace")]
    MissingKeyCapability {
        /// Method whose key could not be built
        method: String,
    },

    /// A key function returned something unusable as a key
    #[error("invalid key for method `{method}`: {reason}")]
    InvalidKey {
        /// Method whose key was rejected
        method: String,
        /// What was wrong with it
        reason: String,
    },

    /// Failure raised by the store, passed through unmodified
    #[error(transparent)]
    Store(memostore::Error),

    /// Failure raised by the target's own method
    #[error(transparent)]
    Target(anyhow::Error),

    /// `call` or `key` was used before any method was bound
    #[error("no pending method; bind one with `for_call` or `invoke`")]
    NoPendingMethod,

    /// No process-wide default store has been installed
    #[error("no default store configured; call `Config::install` at startup")]
    StoreNotConfigured,

    /// Process-wide defaults were already installed
    #[error("default store already configured")]
    AlreadyConfigured,

    /// Invalid configuration value
    #[error("config error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Value or config could not be decoded
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

impl From<memostore::Error> for Error {
    fn from(err: memostore::Error) -> Self {
        // Producers run target methods; give their failures back to the caller as-is.
        match err.into_producer() {
            Ok(source) => Error::Target(source),
            Err(other) => Error::Store(other),
        }
    }
}

/// Failure a target returns when asked for a method it does not have.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("undefined method `{method}` for {receiver}")]
pub struct NoMethodError {
    /// Type or object that received the call
    pub receiver: String,
    /// Method that was asked for
    pub method: String,
}

impl NoMethodError {
    /// Create the error for `receiver.method`
    pub fn new(receiver: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            receiver: receiver.into(),
            method: method.into(),
        }
    }
}
