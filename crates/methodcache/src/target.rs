//! Objects whose method results can be cached

use std::borrow::Cow;

use serde_json::Value;

use crate::config;
use crate::error::Result;
use crate::key::{KeyFormat, KeyRequest};
use crate::operation::CacheRequest;
use crate::proxy::MethodCache;

/// An object that receives method calls by name.
///
/// `responds_to` and `invoke` are the object's own dispatch. A per-method key
/// function is simply a method named `<method>_key` that returns a string.
///
/// The generic key builder is on by default for targets that declare a
/// [`key_namespace`](Target::key_namespace): keys then look like
/// `users:foo:7` for an instance with id `7`, or `user:foo` for a type-level
/// target that has no id.
pub trait Target {
    /// Check if the object has `method`
    fn responds_to(&self, method: &str) -> bool;

    /// Call `method` with positional `args`.
    ///
    /// Unknown names should fail the way the object normally does, e.g. with
    /// [`NoMethodError`](crate::NoMethodError).
    fn invoke(&self, method: &str, args: &[Value]) -> anyhow::Result<Value>;

    /// Namespace segment for generated keys
    fn key_namespace(&self) -> Option<Cow<'_, str>> {
        None
    }

    /// Identity segment for generated keys
    fn key_id(&self) -> Option<String> {
        None
    }

    /// Layout for generated keys; the process-wide default unless overridden.
    ///
    /// The default is read on every call: keys built before
    /// [`Config::install`](crate::Config::install) use the built-in layout and
    /// will not match keys built afterwards. Install first, or override this.
    fn key_format(&self) -> KeyFormat {
        config::default_key_format().clone()
    }

    /// Generic key builder. `None` means the target has none.
    fn build_key(&self, request: &KeyRequest<'_>) -> Option<anyhow::Result<String>> {
        let namespace = self.key_namespace()?;
        let id = self.key_id();
        Some(Ok(self.key_format().build(
            &namespace,
            request.name,
            id.as_deref(),
            request.args,
        )))
    }
}

/// `target.cache()` against the process-wide default store.
///
/// Use [`MethodCacher`](crate::MethodCacher) to work with an explicit store.
///
/// Both the store and the key layout come from the installed defaults, so a
/// target used before install fails with `StoreNotConfigured` but its
/// [`key_format`](Target::key_format) still falls back to the built-in layout.
pub trait Cacheable: Target {
    /// Fetch proxy with empty options
    fn cache(&self) -> Result<MethodCache<'_, Self>> {
        self.cache_with(CacheRequest::default())
    }

    /// Proxy for the requested operation and options
    fn cache_with(&self, request: impl Into<CacheRequest>) -> Result<MethodCache<'_, Self>> {
        let store = config::default_store()?;
        Ok(MethodCache::new(self, store, request))
    }
}

impl<T: Target + ?Sized> Cacheable for T {}
