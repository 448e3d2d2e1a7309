//! In-memory coordination store and cache tier fakes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use huddle_core::{CacheTier, CoordinationStore};
use huddle_domain::{HuddleError, Result};
use parking_lot::Mutex;
use serde_json::Value;

/// Coordination store with real expiry and an outage switch.
#[derive(Default)]
pub struct FakeCoordinationStore {
    entries: Mutex<HashMap<String, (String, Instant)>>,
    unavailable: AtomicBool,
    acquisitions: AtomicUsize,
}

impl FakeCoordinationStore {
    /// Every call fails with `CoordinationStore` while set.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Successful `set_if_absent` calls so far.
    pub fn acquisitions(&self) -> usize {
        self.acquisitions.load(Ordering::SeqCst)
    }

    /// Overwrite a key as if another process had taken it over.
    pub fn overwrite(&self, key: &str, value: &str, ttl: Duration) {
        self.entries.lock().insert(key.to_string(), (value.to_string(), Instant::now() + ttl));
    }

    pub fn value(&self, key: &str) -> Option<String> {
        self.live(key)
    }

    fn live(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some((value, expires)) if *expires > Instant::now() => Some(value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn check(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(HuddleError::CoordinationStore("connection refused".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl CoordinationStore for FakeCoordinationStore {
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        self.check()?;
        if self.live(key).is_some() {
            return Ok(false);
        }
        self.entries.lock().insert(key.to_string(), (value.to_string(), Instant::now() + ttl));
        self.acquisitions.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.check()?;
        Ok(self.live(key))
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        self.check()?;
        Ok(self.entries.lock().remove(key).is_some())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        self.check()?;
        Ok(self.live(key).is_some())
    }
}

/// Cache tier with real expiry, TTL inspection and failure switches.
pub struct FakeTier {
    name: &'static str,
    entries: Mutex<HashMap<String, (Value, Duration, Instant)>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    puts: AtomicUsize,
}

impl FakeTier {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: Mutex::new(HashMap::new()),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            puts: AtomicUsize::new(0),
        }
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Seed a value directly, bypassing the decorator.
    pub fn insert(&self, key: &str, value: Value, ttl: Duration) {
        self.entries.lock().insert(key.to_string(), (value, ttl, Instant::now() + ttl));
    }

    pub fn peek(&self, key: &str) -> Option<Value> {
        self.entries.lock().get(key).map(|(value, _, _)| value.clone())
    }

    /// Age `key` past its TTL without waiting for it.
    pub fn expire(&self, key: &str) {
        if let Some(entry) = self.entries.lock().get_mut(key) {
            entry.2 = Instant::now();
        }
    }

    /// TTL the entry was stored with.
    pub fn ttl_of(&self, key: &str) -> Option<Duration> {
        self.entries.lock().get(key).map(|(_, ttl, _)| *ttl)
    }
}

#[async_trait]
impl CacheTier for FakeTier {
    fn tier_name(&self) -> &'static str {
        self.name
    }

    async fn get(&self, _cache_name: &str, key: &str) -> Result<Option<Value>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(HuddleError::CacheTier(format!("{} read failed", self.name)));
        }
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some((value, _, expires)) if *expires > Instant::now() => Ok(Some(value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn put(&self, _cache_name: &str, key: &str, value: Value, ttl: Duration) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(HuddleError::CacheTier(format!("{} write failed", self.name)));
        }
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.insert(key, value, ttl);
        Ok(())
    }

    async fn evict(&self, _cache_name: &str, key: &str) -> Result<()> {
        self.entries.lock().remove(key);
        Ok(())
    }

    async fn clear(&self, cache_name: &str) -> Result<()> {
        let prefix = format!("{cache_name}:");
        self.entries.lock().retain(|key, _| !key.starts_with(&prefix));
        Ok(())
    }
}
