//! Infrastructure error handling
//!
//! External error types are converted into [`huddle_domain::HuddleError`]
//! here so adapters can use `?` without leaking backend types upward.

pub mod conversions;

pub use conversions::InfraError;
#[cfg(feature = "redis")]
pub use conversions::{redis_store_error, redis_tier_error};
