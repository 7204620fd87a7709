//! The store capability

use serde_json::Value;

use crate::error::Result;
use crate::options::CacheOptions;

/// Deferred value producer handed to [`Store::fetch`].
pub type Producer<'a> = Box<dyn FnOnce() -> anyhow::Result<Value> + 'a>;

/// Key/value backend used by the memoization layer.
///
/// Implementations may sit on memory, a database or a network cache; callers
/// issue these calls sequentially and wait for each to complete.
pub trait Store: Send + Sync {
    /// Return the value at `key`, or run `producer`, store its result with
    /// `options` and return it.
    ///
    /// Whether concurrent fetches of an unset key run the producer at most once
    /// is up to the implementation. A store without atomic check-then-populate
    /// may run it once per racing caller.
    ///
    /// A failing producer surfaces as [`Error::Producer`](crate::Error::Producer)
    /// and leaves the key unset.
    fn fetch(&self, key: &str, options: &CacheOptions, producer: Producer<'_>) -> Result<Value>;

    /// Return the value at `key`, or `None` when absent
    fn read(&self, key: &str, options: &CacheOptions) -> Result<Option<Value>>;

    /// Store `value` at `key` unconditionally; returns the store's acknowledgement
    fn write(&self, key: &str, value: Value, options: &CacheOptions) -> Result<Value>;

    /// Remove any entry at `key`. Absent keys are not an error.
    fn delete(&self, key: &str, options: &CacheOptions) -> Result<()>;

    /// Check if an entry is present at `key`
    fn exists(&self, key: &str) -> Result<bool>;
}

impl<S: Store + ?Sized> Store for std::sync::Arc<S> {
    fn fetch(&self, key: &str, options: &CacheOptions, producer: Producer<'_>) -> Result<Value> {
        (**self).fetch(key, options, producer)
    }

    fn read(&self, key: &str, options: &CacheOptions) -> Result<Option<Value>> {
        (**self).read(key, options)
    }

    fn write(&self, key: &str, value: Value, options: &CacheOptions) -> Result<Value> {
        (**self).write(key, value, options)
    }

    fn delete(&self, key: &str, options: &CacheOptions) -> Result<()> {
        (**self).delete(key, options)
    }

    fn exists(&self, key: &str) -> Result<bool> {
        (**self).exists(key)
    }
}
