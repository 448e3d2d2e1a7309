//! In-process coordination store and shared tier
//!
//! Stands in for Redis when the service runs as a single process, and in
//! tests. Expiry is evaluated lazily against the injected [`Clock`]; expired
//! entries behave as absent and are dropped on the next touch or by
//! [`InMemoryStore::purge_expired`].

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use huddle_common::time::{Clock, SystemClock};
use huddle_core::{CacheTier, CoordinationStore};
use huddle_domain::Result;
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Clone)]
struct Expiring<V> {
    value: V,
    expires_at: Instant,
}

impl<V> Expiring<V> {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// DashMap-backed store with per-key TTL.
pub struct InMemoryStore<C: Clock = SystemClock> {
    clock: C,
    locks: DashMap<String, Expiring<String>>,
    values: DashMap<(String, String), Expiring<Value>>,
}

impl InMemoryStore<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for InMemoryStore<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> InMemoryStore<C> {
    pub fn with_clock(clock: C) -> Self {
        Self { clock, locks: DashMap::new(), values: DashMap::new() }
    }

    fn expiry(&self, ttl: Duration) -> Instant {
        self.clock.now() + ttl
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.locks.len() + self.values.len();
        self.locks.retain(|_, entry| entry.is_live(now));
        self.values.retain(|_, entry| entry.is_live(now));
        let removed = before.saturating_sub(self.locks.len() + self.values.len());
        if removed > 0 {
            debug!(removed, "memory_store.purged");
        }
        removed
    }

    /// Live cached values across every partition.
    pub fn value_count(&self) -> usize {
        let now = self.clock.now();
        self.values.iter().filter(|entry| entry.is_live(now)).count()
    }
}

#[async_trait]
impl<C: Clock> CoordinationStore for InMemoryStore<C> {
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        let now = self.clock.now();
        let fresh = Expiring { value: value.to_string(), expires_at: self.expiry(ttl) };

        match self.locks.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_live(now) {
                    return Ok(false);
                }
                occupied.insert(fresh);
                Ok(true)
            }
            Entry::Vacant(vacant) => {
                vacant.insert(fresh);
                Ok(true)
            }
        }
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = self.clock.now();
        Ok(self.locks.get(key).filter(|entry| entry.is_live(now)).map(|entry| entry.value.clone()))
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let now = self.clock.now();
        Ok(self.locks.remove(key).is_some_and(|(_, entry)| entry.is_live(now)))
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let now = self.clock.now();
        Ok(self.locks.get(key).is_some_and(|entry| entry.is_live(now)))
    }

    async fn delete_if_equals(&self, key: &str, expected: &str) -> Result<bool> {
        let now = self.clock.now();
        let removed =
            self.locks.remove_if(key, |_, entry| entry.is_live(now) && entry.value == expected);
        Ok(removed.is_some())
    }
}

#[async_trait]
impl<C: Clock> CacheTier for InMemoryStore<C> {
    fn tier_name(&self) -> &'static str {
        "shared"
    }

    async fn get(&self, cache_name: &str, key: &str) -> Result<Option<Value>> {
        let now = self.clock.now();
        let slot = (cache_name.to_string(), key.to_string());

        let Some(entry) = self.values.get(&slot) else {
            return Ok(None);
        };
        if entry.is_live(now) {
            return Ok(Some(entry.value.clone()));
        }
        drop(entry);
        self.values.remove_if(&slot, |_, entry| !entry.is_live(now));
        Ok(None)
    }

    async fn put(&self, cache_name: &str, key: &str, value: Value, ttl: Duration) -> Result<()> {
        if ttl.is_zero() {
            return Ok(());
        }
        let entry = Expiring { value, expires_at: self.expiry(ttl) };
        self.values.insert((cache_name.to_string(), key.to_string()), entry);
        Ok(())
    }

    async fn evict(&self, cache_name: &str, key: &str) -> Result<()> {
        self.values.remove(&(cache_name.to_string(), key.to_string()));
        Ok(())
    }

    async fn clear(&self, cache_name: &str) -> Result<()> {
        self.values.retain(|(name, _), _| name != cache_name);
        Ok(())
    }
}
