//! Upstream sports-data provider

pub mod ports;
