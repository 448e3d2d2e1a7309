//! Subsystem constants
//!
//! Centralized defaults consulted by configuration and services.

// Lock manager defaults
pub const LOCK_KEY_PREFIX: &str = "lock:";
pub const DEFAULT_LOCK_TTL_SECS: u64 = 30;
pub const DEFAULT_LOCK_WAIT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_LOCK_POLL_INTERVAL_MS: u64 = 50;

// Health tracker thresholds
pub const DEFAULT_HIT_RATIO_TARGET: f64 = 0.80;
pub const DEFAULT_HIT_RATIO_ALERT: f64 = 0.60;
pub const DEFAULT_HEALTH_CHECK_INTERVAL_SECS: u64 = 300; // 5 minutes
pub const DEFAULT_HEALTH_REPORT_INTERVAL_SECS: u64 = 3600; // hourly

// Warming
pub const DEFAULT_WARMING_INTER_CALL_DELAY_MS: u64 = 100;
pub const DEFAULT_SEASON: i32 = 2024;
pub const FIRST_NFL_WEEK: u32 = 1;
pub const LAST_NFL_WEEK: u32 = 22;

// Tiers
pub const DEFAULT_LOCAL_MAX_ENTRIES: u64 = 10_000;
pub const CACHE_KEY_SEPARATOR: char = ':';
