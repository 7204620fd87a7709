//! MethodCacher: hands out proxies bound to an injected store

use std::sync::Arc;

use memostore::Store;

use crate::operation::CacheRequest;
use crate::proxy::MethodCache;
use crate::target::Target;

/// Shared store handle that creates [`MethodCache`] proxies.
///
/// Cloning is cheap; every clone talks to the same store.
#[derive(Clone)]
pub struct MethodCacher {
    store: Arc<dyn Store>,
}

impl MethodCacher {
    /// Wrap a store. Pass an `Arc` to keep your own handle on it.
    pub fn new<S: Store + 'static>(store: S) -> Self {
        Self {
            store: Arc::new(store),
        }
    }

    /// Wrap an already shared store
    pub fn from_shared(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// The injected store
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Fetch proxy with empty options
    pub fn cache<'a, T: Target + ?Sized>(&self, target: &'a T) -> MethodCache<'a, T> {
        self.cache_with(target, CacheRequest::default())
    }

    /// Proxy for the requested operation and options
    pub fn cache_with<'a, T: Target + ?Sized>(
        &self,
        target: &'a T,
        request: impl Into<CacheRequest>,
    ) -> MethodCache<'a, T> {
        MethodCache::new(target, Arc::clone(&self.store), request)
    }
}
