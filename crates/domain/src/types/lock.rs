//! Coordination lock records

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A lock held in the coordination store.
///
/// The stored value is `owner_token`; release compares it before deleting so
/// a holder whose lock expired and was re-acquired elsewhere cannot release
/// the new holder's lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    /// Fully prefixed key in the coordination store
    pub lock_key: String,
    /// Fresh per acquisition, never reused
    pub owner_token: String,
    pub acquired_at: DateTime<Utc>,
    pub ttl: Duration,
}

impl LockRecord {
    pub fn new(lock_key: impl Into<String>, owner_token: impl Into<String>, ttl: Duration) -> Self {
        Self {
            lock_key: lock_key.into(),
            owner_token: owner_token.into(),
            acquired_at: Utc::now(),
            ttl,
        }
    }

    /// Wall-clock instant after which the store drops the record on its own.
    pub fn expires_at(&self) -> DateTime<Utc> {
        let ttl = chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::MAX);
        self.acquired_at.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Whether the TTL has elapsed at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at()
    }
}
