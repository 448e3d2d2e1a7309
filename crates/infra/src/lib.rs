//! # Huddle Infrastructure
//!
//! Infrastructure implementations of the core ports and the runtime around
//! them.
//!
//! This crate contains:
//! - Cache tiers (moka, in-memory, Redis behind the `redis` feature)
//! - Coordination stores for the lock manager
//! - The cron warming scheduler and the health monitor
//! - Configuration loading and logging set-up
//!
//! ## Architecture
//! - Implements traits defined in `huddle-core`
//! - Depends on `huddle-common`, `huddle-domain` and `huddle-core`
//! - Contains all "impure" code (network, timers, files)

pub mod cache;
pub mod config;
pub mod context;
pub mod errors;
pub mod observability;
pub mod scheduling;

// Re-export commonly used items
pub use cache::{InMemoryStore, MokaCacheTier};
pub use context::CacheContext;
pub use errors::InfraError;
pub use observability::init_tracing;
pub use scheduling::{
    HealthMonitor, HealthMonitorConfig, SchedulerError, SchedulerResult, WarmingScheduler,
    WarmingSchedulerConfig,
};
