//! Cache operations and the request that configures a proxy

use std::fmt;

use memostore::CacheOptions;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// What a proxy does with the store when a method is invoked
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheOperation {
    /// Return the stored value, computing and storing it on a miss
    #[default]
    Fetch,
    /// Return the stored value or nothing; never computes
    Read,
    /// Always compute and store
    Write,
}

impl CacheOperation {
    /// Parse `fetch`, `read` or `write`, ignoring case
    pub fn parse(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "fetch" => Some(Self::Fetch),
            "read" => Some(Self::Read),
            "write" => Some(Self::Write),
            _ => None,
        }
    }

    /// Like [`parse`](Self::parse), but unsupported tokens fall back to `Fetch`
    pub fn from_token(token: &str) -> Self {
        Self::parse(token).unwrap_or_else(|| {
            debug!(token, "unsupported cache operation, using fetch");
            Self::Fetch
        })
    }

    /// Lowercase name of the operation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fetch => "fetch",
            Self::Read => "read",
            Self::Write => "write",
        }
    }
}

impl fmt::Display for CacheOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How to build a proxy: which operation, which options.
///
/// Both halves are optional; the operation defaults to `Fetch` and the
/// options to an empty bag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheRequest {
    /// Operation to perform
    pub operation: Option<CacheOperation>,
    /// Options handed to the store
    pub options: Option<CacheOptions>,
}

impl CacheRequest {
    /// Request with every default
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the operation
    pub fn operation(mut self, operation: CacheOperation) -> Self {
        self.operation = Some(operation);
        self
    }

    /// Set the options
    pub fn options(mut self, options: CacheOptions) -> Self {
        self.options = Some(options);
        self
    }

    /// Build a request from loosely typed arguments.
    ///
    /// The first string is taken as the operation token (unsupported tokens
    /// mean `fetch`) and the first object as the options. Everything else is
    /// ignored.
    pub fn from_tokens<I>(tokens: I) -> Self
    where
        I: IntoIterator<Item = Value>,
    {
        let mut request = Self::default();
        for token in tokens {
            match token {
                Value::String(name) if request.operation.is_none() => {
                    request.operation = Some(CacheOperation::from_token(&name));
                }
                Value::Object(map) if request.options.is_none() => {
                    request.options = Some(map.into_iter().collect());
                }
                _ => {}
            }
        }
        request
    }

    pub(crate) fn resolve(self) -> (CacheOperation, CacheOptions) {
        (self.operation.unwrap_or_default(), self.options.unwrap_or_default())
    }
}

impl From<()> for CacheRequest {
    fn from(_: ()) -> Self {
        Self::default()
    }
}

impl From<CacheOperation> for CacheRequest {
    fn from(operation: CacheOperation) -> Self {
        Self::default().operation(operation)
    }
}

impl From<CacheOptions> for CacheRequest {
    fn from(options: CacheOptions) -> Self {
        Self::default().options(options)
    }
}

impl From<(CacheOperation, CacheOptions)> for CacheRequest {
    fn from((operation, options): (CacheOperation, CacheOptions)) -> Self {
        Self::default().operation(operation).options(options)
    }
}
