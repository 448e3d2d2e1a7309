//! Process-local cache tier backed by moka
//!
//! One bounded `moka::future::Cache` per cache name, created on first use
//! with the capacity from the policy table. Entries carry their own TTL so
//! a single cache can hold values written with different lifetimes.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use huddle_domain::PolicyTable;
//! use huddle_infra::cache::MokaCacheTier;
//!
//! let tier = MokaCacheTier::new(Arc::new(PolicyTable::default()));
//! tier.put("schedule", "schedule:week=5,season=2024", value, ttl).await?;
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use huddle_core::CacheTier;
use huddle_domain::constants::DEFAULT_LOCAL_MAX_ENTRIES;
use huddle_domain::{PolicyTable, Result};
use moka::future::Cache;
use moka::Expiry;
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Clone)]
struct CachedValue {
    value: Value,
    ttl: Duration,
}

/// Expires each entry after the TTL it was written with.
struct PerEntryTtl;

impl Expiry<String, CachedValue> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CachedValue,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CachedValue,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Local tier over moka caches partitioned by cache name.
pub struct MokaCacheTier {
    caches: DashMap<String, Cache<String, CachedValue>>,
    policies: Arc<PolicyTable>,
}

impl MokaCacheTier {
    pub fn new(policies: Arc<PolicyTable>) -> Self {
        Self { caches: DashMap::new(), policies }
    }

    fn cache_for(&self, cache_name: &str) -> Cache<String, CachedValue> {
        if let Some(cache) = self.caches.get(cache_name) {
            return cache.value().clone();
        }

        self.caches
            .entry(cache_name.to_string())
            .or_insert_with(|| {
                let capacity = self
                    .policies
                    .settings_for_name(cache_name)
                    .map_or(DEFAULT_LOCAL_MAX_ENTRIES, |settings| settings.local_max_entries);
                debug!(cache = cache_name, capacity, "cache.local_partition_created");
                Cache::builder().max_capacity(capacity).expire_after(PerEntryTtl).build()
            })
            .value()
            .clone()
    }

    /// Live entries in one partition after pending maintenance has run.
    pub async fn entry_count(&self, cache_name: &str) -> u64 {
        let Some(cache) = self.caches.get(cache_name).map(|c| c.value().clone()) else {
            return 0;
        };
        cache.run_pending_tasks().await;
        cache.entry_count()
    }
}

#[async_trait]
impl CacheTier for MokaCacheTier {
    fn tier_name(&self) -> &'static str {
        "local"
    }

    async fn get(&self, cache_name: &str, key: &str) -> Result<Option<Value>> {
        let cache = self.cache_for(cache_name);
        Ok(cache.get(key).await.map(|entry| entry.value))
    }

    async fn put(&self, cache_name: &str, key: &str, value: Value, ttl: Duration) -> Result<()> {
        if ttl.is_zero() {
            return Ok(());
        }
        let cache = self.cache_for(cache_name);
        cache.insert(key.to_string(), CachedValue { value, ttl }).await;
        Ok(())
    }

    async fn evict(&self, cache_name: &str, key: &str) -> Result<()> {
        self.cache_for(cache_name).invalidate(key).await;
        Ok(())
    }

    async fn clear(&self, cache_name: &str) -> Result<()> {
        if let Some(cache) = self.caches.get(cache_name).map(|c| c.value().clone()) {
            cache.invalidate_all();
            cache.run_pending_tasks().await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn tier() -> MokaCacheTier {
        MokaCacheTier::new(Arc::new(PolicyTable::default()))
    }

    #[tokio::test]
    async fn put_then_get() {
        let tier = tier();
        tier.put("schedule", "schedule:week=5,season=2024", json!({"games": 16}), Duration::from_secs(60))
            .await
            .unwrap();

        let value = tier.get("schedule", "schedule:week=5,season=2024").await.unwrap();
        assert_eq!(value, Some(json!({"games": 16})));
        assert_eq!(tier.get("schedule", "schedule:week=6,season=2024").await.unwrap(), None);
    }

    #[tokio::test]
    async fn entries_expire_after_their_own_ttl() {
        let tier = tier();
        tier.put("live-stats", "live-stats:a", json!(1), Duration::from_millis(50)).await.unwrap();
        tier.put("live-stats", "live-stats:b", json!(2), Duration::from_secs(60)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(120)).await;

        assert_eq!(tier.get("live-stats", "live-stats:a").await.unwrap(), None);
        assert_eq!(tier.get("live-stats", "live-stats:b").await.unwrap(), Some(json!(2)));
    }

    #[tokio::test]
    async fn clear_only_touches_one_partition() {
        let tier = tier();
        let ttl = Duration::from_secs(60);
        tier.put("news", "news:player=1", json!("a"), ttl).await.unwrap();
        tier.put("search", "search:query=mahomes", json!("b"), ttl).await.unwrap();

        tier.clear("news").await.unwrap();

        assert_eq!(tier.get("news", "news:player=1").await.unwrap(), None);
        assert_eq!(tier.entry_count("news").await, 0);
        assert_eq!(tier.entry_count("search").await, 1);
    }

    #[tokio::test]
    async fn evict_removes_single_key() {
        let tier = tier();
        let ttl = Duration::from_secs(60);
        tier.put("news", "news:player=1", json!("a"), ttl).await.unwrap();
        tier.put("news", "news:player=2", json!("b"), ttl).await.unwrap();

        tier.evict("news", "news:player=1").await.unwrap();

        assert_eq!(tier.get("news", "news:player=1").await.unwrap(), None);
        assert_eq!(tier.get("news", "news:player=2").await.unwrap(), Some(json!("b")));
    }
}
