//! Cache-aside fetching with per-key stampede protection

pub mod decorator;
pub mod health;
pub mod lock_manager;
pub mod ports;
