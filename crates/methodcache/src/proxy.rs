//! MethodCache: the proxy that turns method calls into store operations

use std::sync::Arc;

use memostore::{CacheOptions, Store};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};
use crate::key::resolve_key;
use crate::operation::{CacheOperation, CacheRequest};
use crate::target::Target;

/// Binds a target, a store, an operation and options.
///
/// Calling [`invoke`](Self::invoke) with a method name records the call and
/// runs the configured operation:
///
/// | Operation | Store call | Target method runs |
/// |---|---|---|
/// | `Fetch` | `fetch(key, options, producer)` | only on a miss |
/// | `Read` | `read(key, options)` | never |
/// | `Write` | `write(key, value, options)` | always |
///
/// Methods the target does not respond to skip the store and go straight to
/// `target.invoke`, so the caller sees the target's own failure.
///
/// `Fetch` is a single store request. Whether racing fetches of one unset key
/// run the method more than once is up to the store; `MemoryStore` runs it once.
pub struct MethodCache<'a, T: Target + ?Sized> {
    target: &'a T,
    store: Arc<dyn Store>,
    operation: CacheOperation,
    options: CacheOptions,
    method: Option<String>,
    args: Vec<Value>,
}

impl<'a, T: Target + ?Sized> MethodCache<'a, T> {
    /// Create a proxy for `target` backed by `store`
    pub fn new(target: &'a T, store: Arc<dyn Store>, request: impl Into<CacheRequest>) -> Self {
        let (operation, options) = request.into().resolve();
        Self {
            target,
            store,
            operation,
            options,
            method: None,
            args: Vec::new(),
        }
    }

    /// Object whose methods are cached
    pub fn target(&self) -> &'a T {
        self.target
    }

    /// Store the proxy talks to
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Configured operation
    pub fn operation(&self) -> CacheOperation {
        self.operation
    }

    /// Options handed to the store
    pub fn options(&self) -> &CacheOptions {
        &self.options
    }

    /// Pending method name, if any
    pub fn method(&self) -> Option<&str> {
        self.method.as_deref()
    }

    /// Pending arguments
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Record `method(args)` and run the configured operation on it.
    ///
    /// Returns `None` only for a `Read` that finds nothing.
    pub fn invoke(&mut self, method: &str, args: Vec<Value>) -> Result<Option<Value>> {
        self.for_call(method, args).call()
    }

    /// [`invoke`](Self::invoke), deserializing the result
    pub fn invoke_as<D: DeserializeOwned>(
        &mut self,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Option<D>> {
        match self.invoke(method, args)? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Bind the pending method and arguments without running anything
    pub fn for_call(&mut self, method: &str, args: Vec<Value>) -> &mut Self {
        self.method = Some(method.to_string());
        self.args = args;
        self
    }

    /// Run the configured operation on the pending method
    pub fn call(&self) -> Result<Option<Value>> {
        let method = self.method.as_deref().ok_or(Error::NoPendingMethod)?;
        let args = self.args.as_slice();
        let target = self.target;

        if !target.responds_to(method) {
            debug!(method, "target lacks method, passing call through");
            return target.invoke(method, args).map(Some).map_err(Error::Target);
        }

        let key = resolve_key(target, method, args)?;
        match self.operation {
            CacheOperation::Fetch => {
                debug!(method, key = %key, "fetch");
                let value = self.store.fetch(
                    &key,
                    &self.options,
                    Box::new(move || target.invoke(method, args)),
                )?;
                Ok(Some(value))
            }
            CacheOperation::Read => {
                let value = self.store.read(&key, &self.options)?;
                debug!(method, key = %key, hit = value.is_some(), "read");
                Ok(value)
            }
            CacheOperation::Write => {
                let value = target.invoke(method, args).map_err(Error::Target)?;
                debug!(method, key = %key, "write");
                Ok(Some(self.store.write(&key, value, &self.options)?))
            }
        }
    }

    /// Key for the pending method and arguments
    pub fn key(&self) -> Result<String> {
        let method = self.method.as_deref().ok_or(Error::NoPendingMethod)?;
        resolve_key(self.target, method, &self.args)
    }

    /// Key for `method(args)`; the store is not touched
    pub fn key_for(&self, method: &str, args: &[Value]) -> Result<String> {
        resolve_key(self.target, method, args)
    }

    /// Check if a result for `method(args)` is stored
    pub fn exists(&self, method: &str, args: &[Value]) -> Result<bool> {
        let key = self.key_for(method, args)?;
        Ok(self.store.exists(&key)?)
    }

    /// Drop any stored result for `method(args)`
    pub fn delete(&self, method: &str, args: &[Value]) -> Result<()> {
        let key = self.key_for(method, args)?;
        debug!(method, key = %key, "delete");
        Ok(self.store.delete(&key, &self.options)?)
    }

    /// Store the value of `producer` under an arbitrary key
    pub fn write_key<F>(&self, key: &str, producer: F) -> Result<Value>
    where
        F: FnOnce() -> anyhow::Result<Value>,
    {
        let value = producer().map_err(Error::Target)?;
        Ok(self.store.write(key, value, &self.options)?)
    }

    /// Read an arbitrary key
    pub fn read_key(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.store.read(key, &self.options)?)
    }

    /// Fetch an arbitrary key, storing `producer`'s value on a miss
    pub fn fetch_key<F>(&self, key: &str, producer: F) -> Result<Value>
    where
        F: FnOnce() -> anyhow::Result<Value>,
    {
        Ok(self.store.fetch(key, &self.options, Box::new(producer))?)
    }
}
