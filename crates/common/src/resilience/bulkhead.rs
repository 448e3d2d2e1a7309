//! Bulkhead for limiting concurrent operations
//!
//! A semaphore caps how many operations run at once. Callers past the cap
//! wait up to `acquire_timeout` for a permit and are rejected after that.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

/// Bulkhead configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkheadConfig {
    /// Maximum operations running at once
    pub max_concurrent: usize,
    /// How long to wait for a permit; `None` waits indefinitely
    pub acquire_timeout: Option<Duration>,
}

impl Default for BulkheadConfig {
    fn default() -> Self {
        Self { max_concurrent: 10, acquire_timeout: Some(Duration::from_secs(5)) }
    }
}

impl BulkheadConfig {
    pub fn new(max_concurrent: usize, acquire_timeout: Option<Duration>) -> Self {
        Self { max_concurrent, acquire_timeout }
    }

    /// # Errors
    /// Returns `BulkheadError::InvalidConfig` when `max_concurrent` is zero.
    pub fn validate(&self) -> Result<(), BulkheadError<std::convert::Infallible>> {
        if self.max_concurrent == 0 {
            return Err(BulkheadError::InvalidConfig(
                "max_concurrent must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Errors returned by [`Bulkhead::execute`].
#[derive(Debug, Error)]
pub enum BulkheadError<E> {
    #[error("bulkhead full: no permit within {timeout:?} (capacity {capacity})")]
    Rejected { capacity: usize, timeout: Duration },

    #[error("bulkhead closed")]
    Closed,

    #[error("invalid bulkhead configuration: {0}")]
    InvalidConfig(String),

    #[error("operation failed: {0}")]
    Operation(E),
}

impl<E> BulkheadError<E> {
    /// True when the operation never ran because no permit was available.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected { .. } | Self::Closed)
    }
}

/// Counters for monitoring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkheadMetrics {
    pub total_operations: u64,
    pub rejected_operations: u64,
    pub current_concurrent: usize,
    pub max_concurrent: usize,
}

impl BulkheadMetrics {
    /// Fraction of capacity in use (0.0 to 1.0).
    pub fn utilization(&self) -> f64 {
        if self.max_concurrent == 0 {
            return 0.0;
        }
        self.current_concurrent as f64 / self.max_concurrent as f64
    }

    pub fn is_at_capacity(&self) -> bool {
        self.current_concurrent >= self.max_concurrent
    }
}

/// Concurrency limiter. Clones share permits and counters.
#[derive(Clone)]
pub struct Bulkhead {
    config: BulkheadConfig,
    semaphore: Arc<Semaphore>,
    total_operations: Arc<AtomicU64>,
    rejected_operations: Arc<AtomicU64>,
}

impl Bulkhead {
    /// # Errors
    /// Returns `BulkheadError::InvalidConfig` for a zero capacity.
    pub fn new(config: BulkheadConfig) -> Result<Self, BulkheadError<std::convert::Infallible>> {
        config.validate()?;
        Ok(Self {
            semaphore: Arc::new(Semaphore::new(config.max_concurrent)),
            total_operations: Arc::new(AtomicU64::new(0)),
            rejected_operations: Arc::new(AtomicU64::new(0)),
            config,
        })
    }

    /// Take a permit without waiting.
    pub fn try_acquire(&self) -> Option<OwnedSemaphorePermit> {
        Arc::clone(&self.semaphore).try_acquire_owned().ok()
    }

    async fn acquire<E>(&self) -> Result<OwnedSemaphorePermit, BulkheadError<E>> {
        let semaphore = Arc::clone(&self.semaphore);
        let result = match self.config.acquire_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, semaphore.acquire_owned()).await {
                Ok(acquired) => acquired.map_err(|_| BulkheadError::Closed),
                Err(_) => Err(BulkheadError::Rejected {
                    capacity: self.config.max_concurrent,
                    timeout,
                }),
            },
            None => semaphore.acquire_owned().await.map_err(|_| BulkheadError::Closed),
        };

        if result.is_err() {
            self.rejected_operations.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    /// Run `operation` once a permit is available.
    ///
    /// # Errors
    /// `Rejected` if no permit frees up in time, `Operation` wrapping the
    /// operation's own error otherwise.
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, BulkheadError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let _permit = self.acquire().await.inspect_err(|_| {
            debug!(capacity = self.config.max_concurrent, "bulkhead rejected operation");
        })?;

        self.total_operations.fetch_add(1, Ordering::Relaxed);
        operation().await.map_err(BulkheadError::Operation)
    }

    pub fn current_concurrent(&self) -> usize {
        self.config.max_concurrent.saturating_sub(self.semaphore.available_permits())
    }

    pub fn metrics(&self) -> BulkheadMetrics {
        BulkheadMetrics {
            total_operations: self.total_operations.load(Ordering::Acquire),
            rejected_operations: self.rejected_operations.load(Ordering::Acquire),
            current_concurrent: self.current_concurrent(),
            max_concurrent: self.config.max_concurrent,
        }
    }
}

impl fmt::Debug for Bulkhead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bulkhead")
            .field("max_concurrent", &self.config.max_concurrent)
            .field("current_concurrent", &self.current_concurrent())
            .finish()
    }
}
