//! Composition root
//!
//! Wires the tiers, the lock manager, the health tracker, the fetch
//! decorator, the warming service and both background schedulers from one
//! [`HuddleConfig`].

use std::sync::Arc;
use std::time::Duration;

use huddle_core::{
    CacheHealthTracker, CacheTier, CacheWarmingService, CachingDataProvider, CoordinationStore,
    LockManager, LockManagerConfig, SportsDataProvider,
};
use huddle_domain::{HuddleConfig, HuddleError, Result};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::cache::{InMemoryStore, MokaCacheTier};
use crate::scheduling::{HealthMonitor, HealthMonitorConfig, WarmingScheduler};

const START_TIMEOUT: Duration = Duration::from_secs(10);

/// Every long-lived component of the cache subsystem.
pub struct CacheContext {
    pub config: HuddleConfig,
    pub provider: Arc<CachingDataProvider>,
    pub health: Arc<CacheHealthTracker>,
    pub locks: Arc<LockManager>,
    pub warming: Arc<CacheWarmingService>,
    pub warming_scheduler: WarmingScheduler,
    pub health_monitor: HealthMonitor,
    cancel: CancellationToken,
}

impl CacheContext {
    /// Single-process deployment: one [`InMemoryStore`] serves as both the
    /// coordination store and the shared tier.
    ///
    /// # Errors
    /// Returns `HuddleError::Config` for invalid configuration.
    pub async fn in_memory(
        config: HuddleConfig,
        upstream: Arc<dyn SportsDataProvider>,
    ) -> Result<Self> {
        let store = Arc::new(InMemoryStore::new());
        Self::with_backends(config, upstream, store.clone(), store).await
    }

    /// Cross-process deployment on Redis.
    ///
    /// # Errors
    /// Returns an error if Redis is unreachable or the configuration is
    /// invalid.
    #[cfg(feature = "redis")]
    pub async fn with_redis(
        config: HuddleConfig,
        upstream: Arc<dyn SportsDataProvider>,
        redis_url: &str,
        namespace: &str,
    ) -> Result<Self> {
        use crate::cache::{RedisCacheTier, RedisCoordinationStore};

        let conn = crate::cache::redis::connect(redis_url).await?;
        let coordination = Arc::new(RedisCoordinationStore::new(conn.clone()));
        let shared = Arc::new(RedisCacheTier::new(conn, namespace));
        Self::with_backends(config, upstream, coordination, shared).await
    }

    /// Build on caller-supplied coordination store and shared tier.
    ///
    /// # Errors
    /// Returns `HuddleError::Config` for invalid configuration or rules.
    pub async fn with_backends(
        config: HuddleConfig,
        upstream: Arc<dyn SportsDataProvider>,
        coordination: Arc<dyn CoordinationStore>,
        shared: Arc<dyn CacheTier>,
    ) -> Result<Self> {
        config.validate()?;

        let policies = Arc::new(config.policy_table()?);
        let local: Arc<dyn CacheTier> = Arc::new(MokaCacheTier::new(Arc::clone(&policies)));
        let locks =
            Arc::new(LockManager::new(coordination, LockManagerConfig::from(&config.lock)));
        let health = Arc::new(CacheHealthTracker::new(config.health.thresholds()));
        let cancel = CancellationToken::new();

        let provider = Arc::new(
            CachingDataProvider::new(
                upstream,
                local,
                shared,
                Arc::clone(&locks),
                Arc::clone(&health),
                policies,
            )
            .with_cancellation(cancel.clone())
            .configure(&config.decorator)?,
        );

        let warming =
            Arc::new(CacheWarmingService::new(Arc::clone(&provider), config.warming.clone()));
        let warming_scheduler = WarmingScheduler::new(Arc::clone(&warming)).await?;
        let health_monitor = HealthMonitor::new(
            Arc::clone(&health),
            HealthMonitorConfig::from(&config.health),
        );

        Ok(Self {
            config,
            provider,
            health,
            locks,
            warming,
            warming_scheduler,
            health_monitor,
            cancel,
        })
    }

    /// Start the warming scheduler and the health monitor.
    ///
    /// # Errors
    /// Returns `HuddleError::Internal` if either fails to start in time.
    pub async fn start(&mut self) -> Result<()> {
        tokio::time::timeout(START_TIMEOUT, self.warming_scheduler.start())
            .await
            .map_err(|_| {
                error!(timeout_secs = START_TIMEOUT.as_secs(), "WarmingScheduler start timed out");
                HuddleError::Internal("WarmingScheduler start timed out".into())
            })??;

        self.health_monitor.start().await?;
        info!("cache.context_started");
        Ok(())
    }

    /// Stop background work and end every in-progress lock wait.
    ///
    /// Both schedulers are stopped even if the first one fails.
    ///
    /// # Errors
    /// Returns the first stop failure.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.cancel.cancel();

        let warming = if self.warming_scheduler.is_running() {
            self.warming_scheduler.stop().await.map_err(HuddleError::from)
        } else {
            Ok(())
        };
        let health = if self.health_monitor.is_running() {
            self.health_monitor.stop().await.map_err(HuddleError::from)
        } else {
            Ok(())
        };

        info!("cache.context_stopped");
        warming.and(health)
    }
}
