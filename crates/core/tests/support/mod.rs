//! Shared helpers for `huddle-core` integration tests.
//!
//! In-memory fakes for every port plus a builder that wires a decorator
//! over them.

#![allow(dead_code)]

pub mod provider;
pub mod stores;

use std::sync::Arc;
use std::time::Duration;

use huddle_core::{CacheHealthTracker, CachingDataProvider, LockManager, LockManagerConfig};
use huddle_domain::PolicyTable;

pub use provider::FakeProvider;
pub use stores::{FakeCoordinationStore, FakeTier};

/// Everything a decorator test needs, with handles on each fake.
pub struct Harness {
    pub upstream: Arc<FakeProvider>,
    pub local: Arc<FakeTier>,
    pub shared: Arc<FakeTier>,
    pub store: Arc<FakeCoordinationStore>,
    pub health: Arc<CacheHealthTracker>,
    pub locks: Arc<LockManager>,
    pub decorator: Arc<CachingDataProvider>,
}

impl Harness {
    pub fn new(upstream: FakeProvider) -> Self {
        Self::with_lock_config(upstream, fast_lock_config())
    }

    pub fn with_lock_config(upstream: FakeProvider, config: LockManagerConfig) -> Self {
        let upstream = Arc::new(upstream);
        let local = Arc::new(FakeTier::new("local"));
        let shared = Arc::new(FakeTier::new("shared"));
        let store = Arc::new(FakeCoordinationStore::default());
        let health = Arc::new(CacheHealthTracker::default());
        let locks = Arc::new(LockManager::new(store.clone(), config));

        let decorator = Arc::new(CachingDataProvider::new(
            upstream.clone(),
            local.clone(),
            shared.clone(),
            locks.clone(),
            health.clone(),
            Arc::new(PolicyTable::default()),
        ));

        Self { upstream, local, shared, store, health, locks, decorator }
    }
}

/// Short waits so timeout paths finish quickly.
pub fn fast_lock_config() -> LockManagerConfig {
    LockManagerConfig {
        key_prefix: "lock:".into(),
        lock_ttl: Duration::from_secs(30),
        wait_timeout: Duration::from_secs(2),
        poll_interval: Duration::from_millis(5),
    }
}
