//! Domain types
//!
//! - `policy`: cache names, per-tier TTLs and key templates
//! - `lock`: coordination lock records
//! - `stats`: per-cache counters and health verdicts
//! - `warming`: warming kinds, reports and outcomes

pub mod lock;
pub mod policy;
pub mod stats;
pub mod warming;

pub use lock::LockRecord;
pub use policy::{CachePolicy, KeyArgs, PolicySettings, PolicyTable};
pub use stats::{CacheStatsSnapshot, HealthStatus, HealthThresholds};
pub use warming::{WarmingKind, WarmingOutcome, WarmingReport};
