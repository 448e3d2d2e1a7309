//! Warming run types

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::impl_domain_status_conversions;

/// Which warming routine a rule triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WarmingKind {
    /// Playoff teams, current-week schedule and per-team stats
    GameDay,
    /// Playoff teams only
    Daily,
}

impl_domain_status_conversions!(WarmingKind {
    GameDay => "game-day",
    Daily => "daily",
});

/// Summary of a finished warming run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarmingReport {
    pub kind: WarmingKind,
    /// Week warmed, for game-day runs
    pub week: Option<u32>,
    pub succeeded: usize,
    pub failed: usize,
    pub duration: Duration,
}

impl WarmingReport {
    pub fn attempted(&self) -> usize {
        self.succeeded + self.failed
    }
}

/// Outcome of asking the warming service to run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WarmingOutcome {
    Completed(WarmingReport),
    /// Another run was already in progress
    Skipped,
}

impl WarmingOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped)
    }

    pub fn report(&self) -> Option<&WarmingReport> {
        match self {
            Self::Completed(report) => Some(report),
            Self::Skipped => None,
        }
    }
}
