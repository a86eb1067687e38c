//! In-process `KvStore`
//!
//! Mirrors the Redis semantics the token manager relies on: string vs hash
//! types (WRONGTYPE on mismatch), TTL expiry measured on tokio's clock, and
//! prefix-glob key enumeration. `set_unavailable` makes every call fail so
//! callers' store-error paths can be exercised.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::{Error, Result};
use crate::kv::{KvStore, StoreFuture};

enum Value {
    Str(String),
    Hash(HashMap<String, String>),
}

struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| now < at)
    }
}

const WRONG_TYPE: &str = "WRONGTYPE Operation against a key holding the wrong kind of value";

#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent operation fail with a store error (or succeed
    /// again when `false`).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Error::Store("connection refused".into()));
        }
        Ok(())
    }

    /// Lock the map and drop anything past its TTL.
    async fn live_entries(&self) -> tokio::sync::MutexGuard<'_, HashMap<String, Entry>> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        entries.retain(|_, e| e.is_live(now));
        entries
    }
}

fn glob_matches(pattern: &str, key: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => key.starts_with(prefix),
        None => key == pattern,
    }
}

impl KvStore for MemoryStore {
    fn ping(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move { self.check_available() })
    }

    fn set_ex<'a>(&'a self, key: &'a str, value: &'a str, ttl: Duration) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.check_available()?;
            let mut entries = self.live_entries().await;
            entries.insert(
                key.to_owned(),
                Entry {
                    value: Value::Str(value.to_owned()),
                    expires_at: Some(Instant::now() + ttl),
                },
            );
            Ok(())
        })
    }

    fn exists<'a>(&'a self, key: &'a str) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            self.check_available()?;
            Ok(self.live_entries().await.contains_key(key))
        })
    }

    fn del<'a>(&'a self, key: &'a str) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            self.check_available()?;
            Ok(self.live_entries().await.remove(key).is_some())
        })
    }

    fn hset_nx<'a>(
        &'a self,
        key: &'a str,
        field: &'a str,
        value: &'a str,
    ) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            self.check_available()?;
            let mut entries = self.live_entries().await;
            let entry = entries.entry(key.to_owned()).or_insert_with(|| Entry {
                value: Value::Hash(HashMap::new()),
                expires_at: None,
            });
            match &mut entry.value {
                Value::Hash(fields) => {
                    if fields.contains_key(field) {
                        Ok(false)
                    } else {
                        fields.insert(field.to_owned(), value.to_owned());
                        Ok(true)
                    }
                }
                Value::Str(_) => Err(Error::Store(WRONG_TYPE.into())),
            }
        })
    }

    fn hset_if_exists<'a>(
        &'a self,
        key: &'a str,
        field: &'a str,
        value: &'a str,
    ) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            self.check_available()?;
            let mut entries = self.live_entries().await;
            match entries.get_mut(key).map(|e| &mut e.value) {
                None => Ok(false),
                Some(Value::Hash(fields)) => {
                    fields.insert(field.to_owned(), value.to_owned());
                    Ok(true)
                }
                Some(Value::Str(_)) => Err(Error::Store(WRONG_TYPE.into())),
            }
        })
    }

    fn hgetall<'a>(&'a self, key: &'a str) -> StoreFuture<'a, HashMap<String, String>> {
        Box::pin(async move {
            self.check_available()?;
            let entries = self.live_entries().await;
            match entries.get(key).map(|e| &e.value) {
                None => Ok(HashMap::new()),
                Some(Value::Hash(fields)) => Ok(fields.clone()),
                Some(Value::Str(_)) => Err(Error::Store(WRONG_TYPE.into())),
            }
        })
    }

    fn keys<'a>(&'a self, pattern: &'a str) -> StoreFuture<'a, Vec<String>> {
        Box::pin(async move {
            self.check_available()?;
            let entries = self.live_entries().await;
            Ok(entries
                .keys()
                .filter(|k| glob_matches(pattern, k))
                .cloned()
                .collect())
        })
    }
}
