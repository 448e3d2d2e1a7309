//! Calendar-driven cache warming.
//!
//! Each [`WarmingRule`] becomes one cron job evaluated in the configured time
//! zone. A fired job runs the rule's routine on the shared
//! [`CacheWarmingService`]; overlapping runs are skipped by the service, so
//! two rules firing at the same minute never double the upstream load.
//!
//! Lifecycle is explicit: join handles are tracked, cancellation is a token,
//! and start, stop and every job run are wrapped in a timeout.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use huddle_core::CacheWarmingService;
//! use huddle_infra::scheduling::{SchedulerResult, WarmingScheduler, WarmingSchedulerConfig};
//!
//! # async fn example(service: Arc<CacheWarmingService>) -> SchedulerResult<()> {
//! let mut scheduler =
//!     WarmingScheduler::with_config(WarmingSchedulerConfig::default(), service).await?;
//!
//! scheduler.start().await?;
//! // ... application runs ...
//! scheduler.stop().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono_tz::Tz;
use huddle_core::CacheWarmingService;
use huddle_domain::{WarmingConfig, WarmingOutcome, WarmingRule};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::scheduling::error::{SchedulerError, SchedulerResult};

/// Configuration for the warming scheduler.
#[derive(Debug, Clone)]
pub struct WarmingSchedulerConfig {
    /// When false no rule is registered and `start` only runs the monitor.
    pub enabled: bool,
    pub rules: Vec<WarmingRule>,
    /// Zone in which every cron expression is evaluated.
    pub timezone: Tz,
    /// Timeout applied to a single warming run.
    pub job_timeout: Duration,
    /// Timeout for starting the underlying scheduler.
    pub start_timeout: Duration,
    /// Timeout for stopping the scheduler.
    pub stop_timeout: Duration,
    /// Timeout for awaiting the monitor task join handle.
    pub join_timeout: Duration,
}

impl Default for WarmingSchedulerConfig {
    fn default() -> Self {
        Self::from(&WarmingConfig::default())
    }
}

impl From<&WarmingConfig> for WarmingSchedulerConfig {
    fn from(config: &WarmingConfig) -> Self {
        Self {
            enabled: config.enabled,
            rules: config.rules.clone(),
            timezone: config.timezone,
            job_timeout: Duration::from_secs(600),
            start_timeout: Duration::from_secs(5),
            stop_timeout: Duration::from_secs(5),
            join_timeout: Duration::from_secs(5),
        }
    }
}

/// Cron scheduler running warming rules against one service.
pub struct WarmingScheduler {
    scheduler: Arc<RwLock<JobScheduler>>,
    config: WarmingSchedulerConfig,
    job_ids: Vec<(String, Uuid)>,
    monitor_handle: Option<JoinHandle<()>>,
    cancellation: CancellationToken,
    service: Arc<CacheWarmingService>,
    /// Set once the inner scheduler has been shut down; it is rebuilt on the
    /// next `start`.
    shut_down: bool,
}

impl WarmingScheduler {
    /// Create a scheduler using the service's own warming configuration.
    pub async fn new(service: Arc<CacheWarmingService>) -> SchedulerResult<Self> {
        let config = WarmingSchedulerConfig::from(service.config());
        Self::with_config(config, service).await
    }

    /// Create a scheduler with a custom configuration.
    ///
    /// Every rule is registered here, so a malformed cron expression fails
    /// construction rather than the first `start`.
    pub async fn with_config(
        config: WarmingSchedulerConfig,
        service: Arc<CacheWarmingService>,
    ) -> SchedulerResult<Self> {
        let raw_scheduler = JobScheduler::new()
            .await
            .map_err(|source| SchedulerError::CreationFailed { source })?;

        let mut scheduler = Self {
            scheduler: Arc::new(RwLock::new(raw_scheduler)),
            config,
            job_ids: Vec::new(),
            monitor_handle: None,
            cancellation: CancellationToken::new(),
            service,
            shut_down: false,
        };

        scheduler.register_rules().await?;
        Ok(scheduler)
    }

    /// Start the scheduler, spawning the monitoring task.
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        if self.shut_down {
            self.rebuild().await?;
        }

        self.cancellation = CancellationToken::new();

        let scheduler = self.scheduler.clone();
        let start_timeout = self.config.start_timeout;
        let start_result = tokio::time::timeout(start_timeout, async move {
            let guard = scheduler.write().await;
            guard.start().await
        })
        .await
        .map_err(|source| SchedulerError::Timeout { duration: start_timeout, source })?;

        start_result.map_err(|source| SchedulerError::StartFailed { source })?;

        let cancel = self.cancellation.clone();
        let handle = tokio::spawn(async move {
            Self::monitor_task(cancel).await;
        });

        self.monitor_handle = Some(handle);
        info!(
            rules = self.job_ids.len(),
            timezone = %self.config.timezone,
            "warming.scheduler_started"
        );
        Ok(())
    }

    /// Stop the scheduler and wait for the monitor task to finish.
    ///
    /// A warming run already in flight is not interrupted.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        if !self.is_running() {
            return Err(SchedulerError::NotRunning);
        }

        self.cancellation.cancel();

        let scheduler = self.scheduler.clone();
        let stop_timeout = self.config.stop_timeout;
        let stop_result = tokio::time::timeout(stop_timeout, async move {
            let mut guard = scheduler.write().await;
            guard.shutdown().await
        })
        .await
        .map_err(|source| SchedulerError::Timeout { duration: stop_timeout, source })?;

        self.shut_down = true;
        stop_result.map_err(|source| SchedulerError::StopFailed { source })?;

        if let Some(handle) = self.monitor_handle.take() {
            let join_timeout = self.config.join_timeout;
            tokio::time::timeout(join_timeout, handle)
                .await
                .map_err(|source| SchedulerError::Timeout { duration: join_timeout, source })??;
        }

        info!("warming.scheduler_stopped");
        self.cancellation = CancellationToken::new();
        Ok(())
    }

    /// Returns true when the monitor task is active.
    pub fn is_running(&self) -> bool {
        self.monitor_handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Names of the registered rules with their job ids.
    pub fn registered_rules(&self) -> &[(String, Uuid)] {
        &self.job_ids
    }

    pub fn config(&self) -> &WarmingSchedulerConfig {
        &self.config
    }

    async fn rebuild(&mut self) -> SchedulerResult<()> {
        let raw_scheduler = JobScheduler::new()
            .await
            .map_err(|source| SchedulerError::CreationFailed { source })?;
        self.scheduler = Arc::new(RwLock::new(raw_scheduler));
        self.job_ids.clear();
        self.shut_down = false;
        self.register_rules().await
    }

    async fn register_rules(&mut self) -> SchedulerResult<()> {
        if !self.config.enabled {
            info!("warming.scheduler_disabled");
            return Ok(());
        }

        for rule in self.config.rules.clone() {
            let job_id = self.register_rule(&rule).await?;
            self.job_ids.push((rule.name, job_id));
        }
        Ok(())
    }

    async fn register_rule(&self, rule: &WarmingRule) -> SchedulerResult<Uuid> {
        let service = self.service.clone();
        let job_timeout = self.config.job_timeout;
        let name = rule.name.clone();
        let kind = rule.kind;

        let job_definition =
            Job::new_async_tz(rule.cron.as_str(), self.config.timezone, move |_id, _lock| {
                let service = service.clone();
                let name = name.clone();

                Box::pin(async move {
                    info!(rule = %name, kind = %kind, "warming.rule_fired");
                    let started = Instant::now();

                    match tokio::time::timeout(job_timeout, service.warm(kind)).await {
                        Ok(WarmingOutcome::Completed(report)) => {
                            debug!(
                                rule = %name,
                                succeeded = report.succeeded,
                                failed = report.failed,
                                "warming.rule_finished"
                            );
                        }
                        Ok(WarmingOutcome::Skipped) => {
                            debug!(rule = %name, "warming.rule_skipped");
                        }
                        Err(elapsed) => {
                            error!(
                                rule = %name,
                                timeout_secs = job_timeout.as_secs(),
                                elapsed_ms = started.elapsed().as_millis() as u64,
                                "warming.rule_timed_out"
                            );
                            debug!(elapsed = ?elapsed, "Timeout details");
                        }
                    }
                })
            })
            .map_err(|source| SchedulerError::JobRegistrationFailed {
                rule: rule.name.clone(),
                source,
            })?;

        let job_id = job_definition.guid();
        let scheduler = self.scheduler.write().await;
        scheduler.add(job_definition).await.map_err(|source| {
            SchedulerError::JobRegistrationFailed { rule: rule.name.clone(), source }
        })?;

        debug!(rule = %rule.name, cron = %rule.cron, job_id = %job_id, "warming.rule_registered");
        Ok(job_id)
    }

    async fn monitor_task(cancel: CancellationToken) {
        cancel.cancelled().await;
        debug!("warming.scheduler_monitor_cancelled");
    }
}

impl Drop for WarmingScheduler {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("WarmingScheduler dropped while running; cancelling tasks");
            self.cancellation.cancel();
        }
    }
}
