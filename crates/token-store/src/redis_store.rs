//! Redis-backed `KvStore`

use std::collections::HashMap;
use std::time::Duration;

use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tracing::info;

use crate::error::{Error, Result};
use crate::kv::{KvStore, StoreFuture};

/// Writes `field` only while `key` exists, so a concurrent delete cannot
/// resurrect a half-populated hash.
const HSET_IF_EXISTS: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 1 then
    redis.call('HSET', KEYS[1], ARGV[1], ARGV[2])
    return 1
end
return 0
"#;

/// Store backed by a multiplexed, auto-reconnecting Redis connection.
///
/// Cloning is cheap: all clones share one connection manager.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Parse the connection string and open a managed connection.
    ///
    /// Does not verify the server responds; call `ping` for that.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| Error::Store(format!("invalid store connection string: {e}")))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| Error::Store(format!("connecting to store: {e}")))?;
        info!("store connection established");
        Ok(Self { conn })
    }
}

impl KvStore for RedisStore {
    fn ping(&self) -> StoreFuture<'_, ()> {
        let mut conn = self.conn.clone();
        Box::pin(async move {
            let _: String = redis::cmd("PING").query_async(&mut conn).await?;
            Ok(())
        })
    }

    fn set_ex<'a>(&'a self, key: &'a str, value: &'a str, ttl: Duration) -> StoreFuture<'a, ()> {
        let mut conn = self.conn.clone();
        Box::pin(async move {
            conn.set_ex::<_, _, ()>(key, value, ttl.as_secs()).await?;
            Ok(())
        })
    }

    fn exists<'a>(&'a self, key: &'a str) -> StoreFuture<'a, bool> {
        let mut conn = self.conn.clone();
        Box::pin(async move { Ok(conn.exists::<_, bool>(key).await?) })
    }

    fn del<'a>(&'a self, key: &'a str) -> StoreFuture<'a, bool> {
        let mut conn = self.conn.clone();
        Box::pin(async move {
            let removed: i64 = conn.del(key).await?;
            Ok(removed > 0)
        })
    }

    fn hset_nx<'a>(
        &'a self,
        key: &'a str,
        field: &'a str,
        value: &'a str,
    ) -> StoreFuture<'a, bool> {
        let mut conn = self.conn.clone();
        Box::pin(async move { Ok(conn.hset_nx::<_, _, _, bool>(key, field, value).await?) })
    }

    fn hset_if_exists<'a>(
        &'a self,
        key: &'a str,
        field: &'a str,
        value: &'a str,
    ) -> StoreFuture<'a, bool> {
        let mut conn = self.conn.clone();
        Box::pin(async move {
            let written: i64 = redis::Script::new(HSET_IF_EXISTS)
                .key(key)
                .arg(field)
                .arg(value)
                .invoke_async(&mut conn)
                .await?;
            Ok(written == 1)
        })
    }

    fn hgetall<'a>(&'a self, key: &'a str) -> StoreFuture<'a, HashMap<String, String>> {
        let mut conn = self.conn.clone();
        Box::pin(async move { Ok(conn.hgetall::<_, HashMap<String, String>>(key).await?) })
    }

    fn keys<'a>(&'a self, pattern: &'a str) -> StoreFuture<'a, Vec<String>> {
        let mut conn = self.conn.clone();
        Box::pin(async move { Ok(conn.keys::<_, Vec<String>>(pattern).await?) })
    }
}
