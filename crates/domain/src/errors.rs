//! Error types used throughout the cache subsystem

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for Huddle
///
/// Lock-wait timeouts are deliberately absent: a waiter that gives up
/// observes `Ok(None)` from the lock manager, not an error.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum HuddleError {
    /// Upstream signalled throttling. Never retried here.
    #[error("Rate limited by upstream: {0}")]
    RateLimited(String),

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The lock/coordination backend could not be reached.
    #[error("Coordination store error: {0}")]
    CoordinationStore(String),

    #[error("Cache tier error: {0}")]
    CacheTier(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl HuddleError {
    /// True for upstream throttling, which callers back off from.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited(_))
    }

    /// True when the failure came from the coordination backend and the
    /// caller may fetch directly instead.
    pub fn is_coordination_failure(&self) -> bool {
        matches!(self, Self::CoordinationStore(_))
    }
}

impl From<serde_json::Error> for HuddleError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type alias for Huddle operations
pub type Result<T> = std::result::Result<T, HuddleError>;
