//! # Huddle Core
//!
//! Caching and stampede-protection logic with no infrastructure
//! dependencies.
//!
//! This crate contains:
//! - Port interfaces (traits) for the upstream provider, the coordination
//!   store and the cache tiers
//! - The lock manager, health tracker and cache-aside fetch decorator
//! - The warming service
//!
//! ## Architecture Principles
//! - Depends only on `huddle-common` and `huddle-domain`
//! - No network, Redis or scheduler code
//! - All external systems reached through traits

pub mod cache;
pub mod provider;
pub mod warming;

pub use cache::decorator::CachingDataProvider;
pub use cache::health::CacheHealthTracker;
pub use cache::lock_manager::{LockManager, LockManagerConfig};
pub use cache::ports::{CacheTier, CoordinationStore};
pub use provider::ports::SportsDataProvider;
pub use warming::service::CacheWarmingService;
