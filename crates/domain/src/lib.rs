//! # Huddle Domain
//!
//! Data types shared by every Huddle crate.
//!
//! This crate contains:
//! - The error taxonomy and `Result` alias
//! - The cache policy table (cache names, per-tier TTLs, key templates)
//! - Lock records, statistics snapshots and warming reports
//! - Configuration structures with serde defaults
//!
//! ## Architecture
//! - No dependencies on other Huddle crates
//! - Only external dependencies allowed
//! - Pure data, no I/O

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
