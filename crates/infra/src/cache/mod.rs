//! Cache tier and coordination store adapters
//!
//! - [`MokaCacheTier`]: bounded per-process tier
//! - [`InMemoryStore`]: single-process coordination store and shared tier
//! - `RedisCoordinationStore` / `RedisCacheTier`: cross-process backends
//!   (feature `redis`)

pub mod memory;
pub mod moka_tier;
#[cfg(feature = "redis")]
pub mod redis;

pub use memory::InMemoryStore;
pub use moka_tier::MokaCacheTier;
#[cfg(feature = "redis")]
pub use self::redis::{RedisCacheTier, RedisCoordinationStore};
