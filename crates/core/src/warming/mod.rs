//! Proactive cache warming

pub mod service;

pub use service::CacheWarmingService;
