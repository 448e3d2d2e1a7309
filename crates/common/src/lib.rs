//! Runtime utilities shared across Huddle crates.
//!
//! - `time`: a `Clock` abstraction so expiry logic can be driven by a
//!   `MockClock` in tests
//! - `resilience`: a semaphore `Bulkhead` for bounding concurrent work

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]

pub mod resilience;
pub mod time;

pub use resilience::{Bulkhead, BulkheadConfig, BulkheadError, BulkheadMetrics};
pub use time::{Clock, MockClock, SystemClock};
