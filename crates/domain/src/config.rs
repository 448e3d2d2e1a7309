//! Configuration structures
//!
//! Every section has serde defaults so a partial file (or none at all)
//! yields a working configuration. Loading lives in `huddle-infra`.

use std::collections::HashMap;
use std::time::Duration;

use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_HEALTH_CHECK_INTERVAL_SECS, DEFAULT_HEALTH_REPORT_INTERVAL_SECS,
    DEFAULT_HIT_RATIO_ALERT, DEFAULT_HIT_RATIO_TARGET, DEFAULT_LOCK_POLL_INTERVAL_MS,
    DEFAULT_LOCK_TTL_SECS, DEFAULT_LOCK_WAIT_TIMEOUT_SECS, DEFAULT_SEASON,
    DEFAULT_WARMING_INTER_CALL_DELAY_MS, FIRST_NFL_WEEK, LAST_NFL_WEEK, LOCK_KEY_PREFIX,
};
use crate::errors::{HuddleError, Result};
use crate::types::{HealthThresholds, PolicyTable, WarmingKind};

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HuddleConfig {
    pub lock: LockConfig,
    pub decorator: DecoratorConfig,
    pub health: HealthConfig,
    pub warming: WarmingConfig,
    /// Per-cache overrides keyed by cache name (e.g. `"schedule"`)
    pub policies: HashMap<String, PolicyOverride>,
    pub logging: LoggingConfig,
}

impl HuddleConfig {
    /// Check cross-field constraints that serde cannot express.
    ///
    /// # Errors
    /// Returns `HuddleError::Config` describing the first violation.
    pub fn validate(&self) -> Result<()> {
        self.lock.validate()?;
        self.decorator.validate()?;
        self.health.validate()?;
        self.warming.validate()?;
        PolicyTable::from_overrides(&self.policies)?;
        Ok(())
    }

    /// Resolved policy table.
    ///
    /// # Errors
    /// Returns `HuddleError::Config` for unknown cache names or zero TTLs.
    pub fn policy_table(&self) -> Result<PolicyTable> {
        PolicyTable::from_overrides(&self.policies)
    }
}

/// Coordination lock settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    pub key_prefix: String,
    pub lock_ttl_secs: u64,
    pub wait_timeout_secs: u64,
    pub poll_interval_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            key_prefix: LOCK_KEY_PREFIX.to_string(),
            lock_ttl_secs: DEFAULT_LOCK_TTL_SECS,
            wait_timeout_secs: DEFAULT_LOCK_WAIT_TIMEOUT_SECS,
            poll_interval_ms: DEFAULT_LOCK_POLL_INTERVAL_MS,
        }
    }
}

impl LockConfig {
    pub fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.lock_ttl_secs)
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.lock_ttl_secs == 0 {
            return Err(HuddleError::Config("lock.lock_ttl_secs must be greater than zero".into()));
        }
        if self.poll_interval_ms == 0 {
            return Err(HuddleError::Config(
                "lock.poll_interval_ms must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Fetch decorator settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoratorConfig {
    /// Maximum concurrent direct fetches after lock fallback; `None` is
    /// unbounded
    pub fallback_concurrency: Option<usize>,
    /// How long a fallback waits for a gate permit
    pub fallback_acquire_timeout_ms: u64,
}

impl Default for DecoratorConfig {
    fn default() -> Self {
        Self { fallback_concurrency: None, fallback_acquire_timeout_ms: 1_000 }
    }
}

impl DecoratorConfig {
    pub fn fallback_acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.fallback_acquire_timeout_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.fallback_concurrency == Some(0) {
            return Err(HuddleError::Config(
                "decorator.fallback_concurrency must be at least 1 when set".into(),
            ));
        }
        Ok(())
    }
}

/// Health tracker thresholds and monitor cadence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    pub alert_threshold: f64,
    pub target_threshold: f64,
    pub check_interval_secs: u64,
    pub report_interval_secs: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            alert_threshold: DEFAULT_HIT_RATIO_ALERT,
            target_threshold: DEFAULT_HIT_RATIO_TARGET,
            check_interval_secs: DEFAULT_HEALTH_CHECK_INTERVAL_SECS,
            report_interval_secs: DEFAULT_HEALTH_REPORT_INTERVAL_SECS,
        }
    }
}

impl HealthConfig {
    pub fn thresholds(&self) -> HealthThresholds {
        HealthThresholds { alert: self.alert_threshold, target: self.target_threshold }
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval_secs)
    }

    fn validate(&self) -> Result<()> {
        let in_range = |v: f64| (0.0..=1.0).contains(&v);
        if !in_range(self.alert_threshold) || !in_range(self.target_threshold) {
            return Err(HuddleError::Config("health thresholds must be within 0.0..=1.0".into()));
        }
        if self.alert_threshold > self.target_threshold {
            return Err(HuddleError::Config(
                "health.alert_threshold must not exceed health.target_threshold".into(),
            ));
        }
        if self.check_interval_secs == 0 || self.report_interval_secs == 0 {
            return Err(HuddleError::Config("health intervals must be greater than zero".into()));
        }
        Ok(())
    }
}

/// One calendar rule for the warming scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarmingRule {
    pub name: String,
    /// Six-field cron expression (`sec min hour day month weekday`)
    pub cron: String,
    pub kind: WarmingKind,
}

impl WarmingRule {
    pub fn new(name: impl Into<String>, cron: impl Into<String>, kind: WarmingKind) -> Self {
        Self { name: name.into(), cron: cron.into(), kind }
    }

    /// Sunday noon, Thursday and Monday evening, plus a daily morning refresh.
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new("sunday-pregame", "0 0 12 * * Sun", WarmingKind::GameDay),
            Self::new("thursday-night", "0 0 19 * * Thu", WarmingKind::GameDay),
            Self::new("monday-night", "0 0 19 * * Mon", WarmingKind::GameDay),
            Self::new("daily-refresh", "0 0 6 * * *", WarmingKind::Daily),
        ]
    }
}

/// Warming service and scheduler settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WarmingConfig {
    pub enabled: bool,
    pub season: i32,
    /// First day of week 1
    pub season_start: NaiveDate,
    /// Pins the current week instead of deriving it from `season_start`
    pub week_override: Option<u32>,
    pub timezone: Tz,
    pub inter_call_delay_ms: u64,
    pub rules: Vec<WarmingRule>,
}

impl Default for WarmingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            season: DEFAULT_SEASON,
            season_start: NaiveDate::from_ymd_opt(2024, 9, 5).unwrap_or_default(),
            week_override: None,
            timezone: chrono_tz::America::New_York,
            inter_call_delay_ms: DEFAULT_WARMING_INTER_CALL_DELAY_MS,
            rules: WarmingRule::defaults(),
        }
    }
}

impl WarmingConfig {
    pub fn inter_call_delay(&self) -> Duration {
        Duration::from_millis(self.inter_call_delay_ms)
    }

    /// NFL week containing `today`, clamped to the regular and post season.
    pub fn week_on(&self, today: NaiveDate) -> u32 {
        if let Some(week) = self.week_override {
            return week;
        }

        let days = (today - self.season_start).num_days();
        if days < 0 {
            return FIRST_NFL_WEEK;
        }
        let week = u32::try_from(days / 7).unwrap_or(u32::MAX).saturating_add(1);
        week.clamp(FIRST_NFL_WEEK, LAST_NFL_WEEK)
    }

    fn validate(&self) -> Result<()> {
        if let Some(week) = self.week_override {
            if !(FIRST_NFL_WEEK..=LAST_NFL_WEEK).contains(&week) {
                return Err(HuddleError::Config(format!(
                    "warming.week_override must be within {FIRST_NFL_WEEK}..={LAST_NFL_WEEK}, got {week}"
                )));
            }
        }

        let mut names = std::collections::HashSet::new();
        for rule in &self.rules {
            if rule.cron.split_whitespace().count() < 6 {
                return Err(HuddleError::Config(format!(
                    "warming rule '{}' needs a six-field cron expression",
                    rule.name
                )));
            }
            if !names.insert(rule.name.as_str()) {
                return Err(HuddleError::Config(format!(
                    "duplicate warming rule name '{}'",
                    rule.name
                )));
            }
        }
        Ok(())
    }
}

/// Per-cache override of the built-in policy table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyOverride {
    pub local_ttl_secs: Option<u64>,
    pub shared_ttl_secs: Option<u64>,
    pub local_max_entries: Option<u64>,
}

/// Subscriber settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), json: false }
    }
}
