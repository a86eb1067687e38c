//! Key-value store abstraction
//!
//! The subset of Redis the token manager needs: string keys with TTL,
//! hash fields, existence checks and prefix enumeration. `RedisStore` backs
//! production; `MemoryStore` backs tests and honours TTLs against tokio's
//! clock so paused-time tests can fast-forward expiry.
//!
//! Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility
//! (`Arc<dyn KvStore>`).

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::error::Result;

/// Boxed future returned by every store operation.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

pub trait KvStore: Send + Sync {
    /// Round-trip to the store. Used for the startup check and `/health`.
    fn ping(&self) -> StoreFuture<'_, ()>;

    /// Set a string value that the store deletes after `ttl`.
    fn set_ex<'a>(&'a self, key: &'a str, value: &'a str, ttl: Duration) -> StoreFuture<'a, ()>;

    fn exists<'a>(&'a self, key: &'a str) -> StoreFuture<'a, bool>;

    /// Delete a key. Returns whether anything was removed.
    fn del<'a>(&'a self, key: &'a str) -> StoreFuture<'a, bool>;

    /// Set a hash field only if that field is absent. Returns whether it was written.
    fn hset_nx<'a>(&'a self, key: &'a str, field: &'a str, value: &'a str)
    -> StoreFuture<'a, bool>;

    /// Set a hash field only if the key already exists, as one atomic step.
    /// Returns whether the key existed (and so was written).
    fn hset_if_exists<'a>(
        &'a self,
        key: &'a str,
        field: &'a str,
        value: &'a str,
    ) -> StoreFuture<'a, bool>;

    /// All fields of a hash; empty when the key is absent.
    fn hgetall<'a>(&'a self, key: &'a str) -> StoreFuture<'a, HashMap<String, String>>;

    /// Keys matching a glob pattern. Callers only use `prefix*` patterns.
    fn keys<'a>(&'a self, pattern: &'a str) -> StoreFuture<'a, Vec<String>>;
}
