//! Configuration loading
//!
//! Reads [`huddle_domain::HuddleConfig`] from TOML/JSON files and `HUDDLE_*`
//! environment variables.

pub mod loader;

// Re-export commonly used items
pub use loader::{load, load_from_env, load_from_file, probe_config_paths, ConfigError};
