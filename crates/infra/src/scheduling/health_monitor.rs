//! Periodic cache health checks.
//!
//! Runs [`CacheHealthTracker::check_health`] every `check_interval` and logs
//! the detailed per-cache report every `report_interval`. The latest status
//! is published on a watch channel so callers can read it without touching
//! the counters.

use std::sync::Arc;
use std::time::Duration;

use huddle_core::CacheHealthTracker;
use huddle_domain::{HealthConfig, HealthStatus};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::scheduling::error::{SchedulerError, SchedulerResult};

/// Configuration for the health monitor
#[derive(Debug, Clone)]
pub struct HealthMonitorConfig {
    pub check_interval: Duration,
    pub report_interval: Duration,
    /// Timeout for awaiting the loop task on stop
    pub join_timeout: Duration,
}

impl Default for HealthMonitorConfig {
    fn default() -> Self {
        Self::from(&HealthConfig::default())
    }
}

impl From<&HealthConfig> for HealthMonitorConfig {
    fn from(config: &HealthConfig) -> Self {
        Self {
            check_interval: config.check_interval(),
            report_interval: config.report_interval(),
            join_timeout: Duration::from_secs(5),
        }
    }
}

/// Interval-driven health monitor
pub struct HealthMonitor {
    tracker: Arc<CacheHealthTracker>,
    config: HealthMonitorConfig,
    cancellation_token: CancellationToken,
    task_handle: Option<JoinHandle<()>>,
    status_tx: watch::Sender<HealthStatus>,
}

impl HealthMonitor {
    pub fn new(tracker: Arc<CacheHealthTracker>, config: HealthMonitorConfig) -> Self {
        let (status_tx, _) = watch::channel(HealthStatus::NoSamples);
        Self {
            tracker,
            config,
            cancellation_token: CancellationToken::new(),
            task_handle: None,
            status_tx,
        }
    }

    /// Start the monitor loop.
    ///
    /// The first check runs one `check_interval` after start.
    ///
    /// # Errors
    ///
    /// Returns error if the monitor is already running
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        self.cancellation_token = CancellationToken::new();

        let tracker = Arc::clone(&self.tracker);
        let config = self.config.clone();
        let cancel = self.cancellation_token.clone();
        let status_tx = self.status_tx.clone();

        self.task_handle = Some(tokio::spawn(async move {
            Self::monitor_loop(tracker, config, status_tx, cancel).await;
        }));

        info!(
            check_interval_secs = self.config.check_interval.as_secs(),
            report_interval_secs = self.config.report_interval.as_secs(),
            "health.monitor_started"
        );
        Ok(())
    }

    /// Stop the monitor loop and wait for it to exit.
    ///
    /// # Errors
    ///
    /// Returns error if the monitor is not running
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        if !self.is_running() {
            return Err(SchedulerError::NotRunning);
        }

        self.cancellation_token.cancel();

        if let Some(handle) = self.task_handle.take() {
            let join_timeout = self.config.join_timeout;
            tokio::time::timeout(join_timeout, handle)
                .await
                .map_err(|source| SchedulerError::Timeout { duration: join_timeout, source })??;
        }

        info!("health.monitor_stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.task_handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Status from the most recent check; `NoSamples` before the first one.
    pub fn latest_status(&self) -> HealthStatus {
        self.status_tx.borrow().clone()
    }

    /// Receiver notified after every check.
    pub fn subscribe(&self) -> watch::Receiver<HealthStatus> {
        self.status_tx.subscribe()
    }

    async fn monitor_loop(
        tracker: Arc<CacheHealthTracker>,
        config: HealthMonitorConfig,
        status_tx: watch::Sender<HealthStatus>,
        cancel: CancellationToken,
    ) {
        let start = Instant::now();
        let mut checks = interval_at(start + config.check_interval, config.check_interval);
        let mut reports = interval_at(start + config.report_interval, config.report_interval);
        checks.set_missed_tick_behavior(MissedTickBehavior::Delay);
        reports.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    debug!("health.monitor_cancelled");
                    break;
                }
                _ = checks.tick() => {
                    let status = tracker.check_health();
                    status_tx.send_replace(status);
                }
                _ = reports.tick() => {
                    tracker.detailed_report();
                }
            }
        }
    }
}

impl Drop for HealthMonitor {
    fn drop(&mut self) {
        if self.is_running() {
            self.cancellation_token.cancel();
        }
    }
}
