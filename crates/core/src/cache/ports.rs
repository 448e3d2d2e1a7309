//! Port interfaces for coordination and cache storage
//!
//! Adapters live in `huddle-infra`: an in-memory store for single-process
//! deployments and tests, and Redis for shared deployments.

use std::time::Duration;

use async_trait::async_trait;
use huddle_domain::Result;
use serde_json::Value;

/// Key/value store with atomic conditional set and per-key expiry.
///
/// Errors should be reported as `HuddleError::CoordinationStore`.
#[async_trait]
pub trait CoordinationStore: Send + Sync {
    /// Set `key` to `value` only if absent. Returns whether the value was
    /// written.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool>;

    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Returns whether a key was removed.
    async fn delete(&self, key: &str) -> Result<bool>;

    async fn exists(&self, key: &str) -> Result<bool>;

    /// Delete `key` only if it currently holds `expected`.
    ///
    /// The default is a get followed by a delete, which leaves a window in
    /// which the key can expire and be re-acquired between the two calls.
    /// Adapters that can compare and delete atomically should override it.
    async fn delete_if_equals(&self, key: &str, expected: &str) -> Result<bool> {
        match self.get(key).await? {
            Some(current) if current == expected => self.delete(key).await,
            _ => Ok(false),
        }
    }
}

/// One tier of cached values, partitioned by cache name.
///
/// Keys passed in are fully rendered (`<cacheName>:<args>`). Entries expire
/// after the TTL given to `put`.
#[async_trait]
pub trait CacheTier: Send + Sync {
    /// Short label for logs, e.g. `"local"` or `"shared"`.
    fn tier_name(&self) -> &'static str;

    async fn get(&self, cache_name: &str, key: &str) -> Result<Option<Value>>;

    async fn put(&self, cache_name: &str, key: &str, value: Value, ttl: Duration) -> Result<()>;

    async fn evict(&self, cache_name: &str, key: &str) -> Result<()>;

    /// Remove every entry under `cache_name`.
    async fn clear(&self, cache_name: &str) -> Result<()>;
}
