//! Background runtime for the cache subsystem
//!
//! - Warming scheduler (cron rules in a fixed time zone)
//! - Health monitor (interval checks and hourly reports)
//!
//! Both follow the same lifecycle rules:
//! - Explicit `start`/`stop`
//! - Join handles for spawned tasks
//! - Cancellation token support
//! - Timeouts around every await that can hang

pub mod error;
pub mod health_monitor;
pub mod warming_scheduler;

pub use error::{SchedulerError, SchedulerResult};
pub use health_monitor::{HealthMonitor, HealthMonitorConfig};
pub use warming_scheduler::{WarmingScheduler, WarmingSchedulerConfig};
