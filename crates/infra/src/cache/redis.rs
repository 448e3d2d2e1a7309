//! Redis coordination store and shared tier
//!
//! Both adapters share one auto-reconnecting `ConnectionManager`. Locks use
//! `SET NX PX`; release is a Lua compare-and-delete so an expired holder can
//! never remove its successor's lock. Cached values are stored as JSON text
//! under `<namespace><cacheName>:<args>`.

use std::time::Duration;

use async_trait::async_trait;
use huddle_core::{CacheTier, CoordinationStore};
use huddle_domain::{HuddleError, Result};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, Script};
use serde_json::Value;
use tracing::{debug, info};

use crate::errors::{redis_store_error, redis_tier_error, InfraError};

const RELEASE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

/// Keys removed per SCAN page when clearing a cache name.
const CLEAR_SCAN_COUNT: usize = 500;

/// Open a connection manager for `url` (e.g. `redis://127.0.0.1:6379/0`).
///
/// # Errors
/// Returns `HuddleError::CoordinationStore` or `HuddleError::Config` when the
/// URL is invalid or the server cannot be reached.
pub async fn connect(url: &str) -> Result<ConnectionManager> {
    let client = Client::open(url).map_err(InfraError::from)?;
    let manager = ConnectionManager::new(client).await.map_err(InfraError::from)?;
    info!("redis.connected");
    Ok(manager)
}

fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

/// Lock backend on Redis.
#[derive(Clone)]
pub struct RedisCoordinationStore {
    conn: ConnectionManager,
    release: Script,
}

impl RedisCoordinationStore {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn, release: Script::new(RELEASE_SCRIPT) }
    }
}

#[async_trait]
impl CoordinationStore for RedisCoordinationStore {
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(ttl_millis(ttl))
            .query_async(&mut conn)
            .await
            .map_err(redis_store_error)?;
        Ok(reply.is_some())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        conn.get(key).await.map_err(redis_store_error)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let removed: u64 = conn.del(key).await.map_err(redis_store_error)?;
        Ok(removed > 0)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        conn.exists(key).await.map_err(redis_store_error)
    }

    async fn delete_if_equals(&self, key: &str, expected: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let removed: i64 = self
            .release
            .key(key)
            .arg(expected)
            .invoke_async(&mut conn)
            .await
            .map_err(redis_store_error)?;
        Ok(removed == 1)
    }
}

/// Shared cache tier on Redis.
#[derive(Clone)]
pub struct RedisCacheTier {
    conn: ConnectionManager,
    namespace: String,
}

impl RedisCacheTier {
    /// `namespace` is prepended to every key, e.g. `"huddle:"`.
    pub fn new(conn: ConnectionManager, namespace: impl Into<String>) -> Self {
        Self { conn, namespace: namespace.into() }
    }

    fn redis_key(&self, key: &str) -> String {
        format!("{}{}", self.namespace, key)
    }
}

#[async_trait]
impl CacheTier for RedisCacheTier {
    fn tier_name(&self) -> &'static str {
        "shared"
    }

    async fn get(&self, _cache_name: &str, key: &str) -> Result<Option<Value>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> =
            conn.get(self.redis_key(key)).await.map_err(redis_tier_error)?;

        raw.map(|text| serde_json::from_str(&text).map_err(HuddleError::from)).transpose()
    }

    async fn put(&self, _cache_name: &str, key: &str, value: Value, ttl: Duration) -> Result<()> {
        if ttl.is_zero() {
            return Ok(());
        }
        let payload = serde_json::to_string(&value)?;
        let mut conn = self.conn.clone();
        let (): () = redis::cmd("SET")
            .arg(self.redis_key(key))
            .arg(payload)
            .arg("PX")
            .arg(ttl_millis(ttl))
            .query_async(&mut conn)
            .await
            .map_err(redis_tier_error)?;
        Ok(())
    }

    async fn evict(&self, _cache_name: &str, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: u64 = conn.del(self.redis_key(key)).await.map_err(redis_tier_error)?;
        Ok(())
    }

    async fn clear(&self, cache_name: &str) -> Result<()> {
        let pattern = format!("{}{}:*", self.namespace, cache_name);
        let mut conn = self.conn.clone();
        let mut cursor: u64 = 0;
        let mut removed: u64 = 0;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(CLEAR_SCAN_COUNT)
                .query_async(&mut conn)
                .await
                .map_err(redis_tier_error)?;

            if !keys.is_empty() {
                let deleted: u64 = conn.del(&keys).await.map_err(redis_tier_error)?;
                removed += deleted;
            }

            if next == 0 {
                break;
            }
            cursor = next;
        }

        debug!(cache = cache_name, removed, "redis.cache_cleared");
        Ok(())
    }
}
