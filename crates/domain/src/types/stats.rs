//! Cache statistics and health verdicts

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_HIT_RATIO_ALERT, DEFAULT_HIT_RATIO_TARGET};

/// Point-in-time copy of one cache name's counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStatsSnapshot {
    pub cache_name: String,
    pub hits: u64,
    pub misses: u64,
    /// Cumulative response time in milliseconds
    pub total_response_ms: u64,
    pub response_count: u64,
}

impl CacheStatsSnapshot {
    pub fn requests(&self) -> u64 {
        self.hits + self.misses
    }

    /// `hits / (hits + misses)`, or 0.0 with no samples.
    pub fn hit_ratio(&self) -> f64 {
        ratio(self.hits, self.requests())
    }

    /// Mean response time in milliseconds, or 0.0 with no samples.
    pub fn average_response_ms(&self) -> f64 {
        if self.response_count == 0 {
            return 0.0;
        }
        self.total_response_ms as f64 / self.response_count as f64
    }
}

pub(crate) fn ratio(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}

/// Hit-ratio thresholds for the periodic health check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HealthThresholds {
    /// Below this the check degrades and warns
    pub alert: f64,
    /// Reported alongside healthy checks
    pub target: f64,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self { alert: DEFAULT_HIT_RATIO_ALERT, target: DEFAULT_HIT_RATIO_TARGET }
    }
}

/// Result of a health check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy { overall_hit_ratio: f64, target: f64 },
    /// Overall ratio below the alert threshold. `below_alert` lists the
    /// individual caches that are also under it.
    Degraded { overall_hit_ratio: f64, alert: f64, below_alert: Vec<CacheStatsSnapshot> },
    /// Nothing recorded since start-up or the last reset
    NoSamples,
}

impl HealthStatus {
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }

    pub fn overall_hit_ratio(&self) -> f64 {
        match self {
            Self::Healthy { overall_hit_ratio, .. } | Self::Degraded { overall_hit_ratio, .. } => {
                *overall_hit_ratio
            }
            Self::NoSamples => 0.0,
        }
    }
}
