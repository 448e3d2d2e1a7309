//! Resilience primitives

pub mod bulkhead;

pub use bulkhead::{Bulkhead, BulkheadConfig, BulkheadError, BulkheadMetrics};
