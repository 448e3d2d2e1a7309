//! Per-key mutual exclusion over a coordination store
//!
//! At most one caller runs the protected work for a key at a time. The others
//! poll until the holder's result becomes visible through `peek`, the lock
//! disappears, or their wait deadline passes.
//!
//! Waiting is not an error: a waiter that gives up gets `Ok(None)` and
//! decides for itself what to do next.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use huddle_domain::constants::{
    DEFAULT_LOCK_POLL_INTERVAL_MS, DEFAULT_LOCK_TTL_SECS, DEFAULT_LOCK_WAIT_TIMEOUT_SECS,
    LOCK_KEY_PREFIX,
};
use huddle_domain::{HuddleError, LockConfig, LockRecord, Result};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::ports::CoordinationStore;

/// Lock manager settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockManagerConfig {
    /// Prepended to every lock key in the store
    pub key_prefix: String,
    pub lock_ttl: Duration,
    pub wait_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for LockManagerConfig {
    fn default() -> Self {
        Self {
            key_prefix: LOCK_KEY_PREFIX.to_string(),
            lock_ttl: Duration::from_secs(DEFAULT_LOCK_TTL_SECS),
            wait_timeout: Duration::from_secs(DEFAULT_LOCK_WAIT_TIMEOUT_SECS),
            poll_interval: Duration::from_millis(DEFAULT_LOCK_POLL_INTERVAL_MS),
        }
    }
}

impl From<&LockConfig> for LockManagerConfig {
    fn from(config: &LockConfig) -> Self {
        Self {
            key_prefix: config.key_prefix.clone(),
            lock_ttl: config.lock_ttl(),
            wait_timeout: config.wait_timeout(),
            poll_interval: config.poll_interval(),
        }
    }
}

/// Coordination lock manager.
pub struct LockManager {
    store: Arc<dyn CoordinationStore>,
    config: LockManagerConfig,
}

impl LockManager {
    pub fn new(store: Arc<dyn CoordinationStore>, config: LockManagerConfig) -> Self {
        Self { store, config }
    }

    pub fn with_defaults(store: Arc<dyn CoordinationStore>) -> Self {
        Self::new(store, LockManagerConfig::default())
    }

    pub fn config(&self) -> &LockManagerConfig {
        &self.config
    }

    /// Key under which the lock for `lock_key` is stored.
    pub fn store_key(&self, lock_key: &str) -> String {
        format!("{}{}", self.config.key_prefix, lock_key)
    }

    /// Run `work` while holding the lock for `lock_key`.
    ///
    /// - Acquired: `peek` is consulted once more and its value returned if
    ///   present, otherwise `work` runs. The lock is released afterwards on
    ///   every path, including a panic in `work`.
    /// - Held elsewhere: poll every `poll_interval` until `peek` yields a
    ///   value, the lock disappears, `wait_timeout` passes or `cancel` fires.
    ///   The last three end in `Ok(None)` unless a final `peek` finds the
    ///   value.
    ///
    /// # Errors
    /// Errors from `work` propagate after release. Store failures while
    /// acquiring or polling are returned as `HuddleError::CoordinationStore`.
    pub async fn run_exclusive<T, W, WFut, P, PFut>(
        &self,
        lock_key: &str,
        lock_ttl: Duration,
        wait_timeout: Duration,
        work: W,
        peek: P,
        cancel: &CancellationToken,
    ) -> Result<Option<T>>
    where
        W: FnOnce() -> WFut,
        WFut: Future<Output = Result<T>>,
        P: Fn() -> PFut,
        PFut: Future<Output = Option<T>>,
    {
        let store_key = self.store_key(lock_key);
        let owner_token = Uuid::new_v4().to_string();

        let acquired = match self.store.set_if_absent(&store_key, &owner_token, lock_ttl).await {
            Ok(acquired) => acquired,
            Err(err) => {
                warn!(lock_key = %store_key, error = %err, "lock.acquire_failed");
                // The write may have landed before the connection failed
                self.release(&store_key, &owner_token).await;
                return Err(coordination_error(err));
            }
        };

        if acquired {
            let record = LockRecord::new(store_key, owner_token, lock_ttl);
            return self.run_holding(record, work, peek).await.map(Some);
        }

        self.wait_for_holder(&store_key, wait_timeout, peek, cancel).await
    }

    /// [`run_exclusive`](Self::run_exclusive) with the configured TTL and
    /// wait timeout.
    ///
    /// # Errors
    /// See [`run_exclusive`](Self::run_exclusive).
    pub async fn run_exclusive_default<T, W, WFut, P, PFut>(
        &self,
        lock_key: &str,
        work: W,
        peek: P,
        cancel: &CancellationToken,
    ) -> Result<Option<T>>
    where
        W: FnOnce() -> WFut,
        WFut: Future<Output = Result<T>>,
        P: Fn() -> PFut,
        PFut: Future<Output = Option<T>>,
    {
        self.run_exclusive(
            lock_key,
            self.config.lock_ttl,
            self.config.wait_timeout,
            work,
            peek,
            cancel,
        )
        .await
    }

    async fn run_holding<T, W, WFut, P, PFut>(&self, record: LockRecord, work: W, peek: P) -> Result<T>
    where
        W: FnOnce() -> WFut,
        WFut: Future<Output = Result<T>>,
        P: Fn() -> PFut,
        PFut: Future<Output = Option<T>>,
    {
        debug!(
            lock_key = %record.lock_key,
            expires_at = %record.expires_at(),
            "lock.acquired"
        );

        let outcome = AssertUnwindSafe(async {
            // Another holder may have filled the cache between our miss and
            // our acquisition
            if let Some(value) = peek().await {
                debug!(lock_key = %record.lock_key, "lock.value_already_present");
                return Ok(value);
            }
            work().await
        })
        .catch_unwind()
        .await;

        self.release(&record.lock_key, &record.owner_token).await;

        match outcome {
            Ok(result) => result,
            Err(payload) => std::panic::resume_unwind(payload),
        }
    }

    async fn wait_for_holder<T, P, PFut>(
        &self,
        store_key: &str,
        wait_timeout: Duration,
        peek: P,
        cancel: &CancellationToken,
    ) -> Result<Option<T>>
    where
        P: Fn() -> PFut,
        PFut: Future<Output = Option<T>>,
    {
        let deadline = Instant::now() + wait_timeout;
        debug!(lock_key = %store_key, wait_ms = wait_timeout.as_millis() as u64, "lock.waiting");

        loop {
            if let Some(value) = peek().await {
                debug!(lock_key = %store_key, "lock.served_by_holder");
                return Ok(Some(value));
            }

            match self.store.exists(store_key).await {
                Ok(true) => {}
                Ok(false) => {
                    let value = peek().await;
                    if value.is_none() {
                        info!(lock_key = %store_key, "lock released without cache");
                    }
                    return Ok(value);
                }
                Err(err) => {
                    warn!(lock_key = %store_key, error = %err, "lock.poll_failed");
                    return Err(coordination_error(err));
                }
            }

            let now = Instant::now();
            if now >= deadline {
                warn!(
                    lock_key = %store_key,
                    wait_ms = wait_timeout.as_millis() as u64,
                    "lock.wait_timeout"
                );
                return Ok(None);
            }

            let pause = self.config.poll_interval.min(deadline - now);
            tokio::select! {
                () = cancel.cancelled() => {
                    debug!(lock_key = %store_key, "lock.wait_cancelled");
                    return Ok(None);
                }
                () = tokio::time::sleep(pause) => {}
            }
        }
    }

    /// Compare-and-delete. Never fails the caller.
    async fn release(&self, store_key: &str, owner_token: &str) {
        match self.store.delete_if_equals(store_key, owner_token).await {
            Ok(true) => debug!(lock_key = %store_key, "lock.released"),
            Ok(false) => {
                debug!(lock_key = %store_key, "lock.release_skipped_not_owner");
            }
            Err(err) => {
                warn!(lock_key = %store_key, error = %err, "lock.release_failed");
            }
        }
    }

    /// Acquire without waiting. The caller releases with
    /// [`force_release`](Self::force_release) or lets the TTL expire.
    ///
    /// # Errors
    /// Returns `HuddleError::CoordinationStore` if the store is unreachable.
    pub async fn try_lock(&self, lock_key: &str, ttl: Duration) -> Result<bool> {
        let store_key = self.store_key(lock_key);
        let owner_token = Uuid::new_v4().to_string();
        let acquired = self
            .store
            .set_if_absent(&store_key, &owner_token, ttl)
            .await
            .map_err(coordination_error)?;

        debug!(lock_key = %store_key, acquired, "lock.try_lock");
        Ok(acquired)
    }

    /// Delete the lock regardless of owner.
    ///
    /// # Errors
    /// Returns `HuddleError::CoordinationStore` if the store is unreachable.
    pub async fn force_release(&self, lock_key: &str) -> Result<()> {
        let store_key = self.store_key(lock_key);
        let removed = self.store.delete(&store_key).await.map_err(coordination_error)?;
        info!(lock_key = %store_key, removed, "lock.force_released");
        Ok(())
    }

    /// # Errors
    /// Returns `HuddleError::CoordinationStore` if the store is unreachable.
    pub async fn is_locked(&self, lock_key: &str) -> Result<bool> {
        self.store.exists(&self.store_key(lock_key)).await.map_err(coordination_error)
    }
}

fn coordination_error(err: HuddleError) -> HuddleError {
    match err {
        err @ HuddleError::CoordinationStore(_) => err,
        other => HuddleError::CoordinationStore(other.to_string()),
    }
}
