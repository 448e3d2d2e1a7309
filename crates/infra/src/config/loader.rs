//! Configuration loader
//!
//! Loads [`HuddleConfig`] from a file and environment variables.
//!
//! ## Loading Strategy
//! 1. `HUDDLE_CONFIG` names a file explicitly; otherwise standard paths are
//!    probed, and built-in defaults are used when no file exists
//! 2. Supports JSON and TOML formats (by extension)
//! 3. `HUDDLE_*` environment variables override individual values
//! 4. The merged result is validated
//!
//! ## Environment Variables
//! - `HUDDLE_CONFIG`: Config file path
//! - `HUDDLE_LOCK_KEY_PREFIX`: Prefix for lock keys
//! - `HUDDLE_LOCK_TTL_SECS`: Lock lifetime in seconds
//! - `HUDDLE_LOCK_WAIT_TIMEOUT_SECS`: How long waiters poll
//! - `HUDDLE_LOCK_POLL_INTERVAL_MS`: Waiter poll interval
//! - `HUDDLE_FALLBACK_CONCURRENCY`: Cap on direct fetches after lock fallback
//! - `HUDDLE_HEALTH_ALERT_THRESHOLD`: Hit ratio below which health degrades
//! - `HUDDLE_HEALTH_TARGET_THRESHOLD`: Target hit ratio
//! - `HUDDLE_WARMING_ENABLED`: Whether scheduled warming runs (true/false)
//! - `HUDDLE_SEASON`: Season year warmed
//! - `HUDDLE_SEASON_START`: First day of week 1 (`YYYY-MM-DD`)
//! - `HUDDLE_WEEK_OVERRIDE`: Pin the current NFL week
//! - `HUDDLE_TIMEZONE`: IANA zone for warming rules
//! - `HUDDLE_LOG_LEVEL`: Default log filter directive
//! - `HUDDLE_LOG_JSON`: Emit JSON logs (true/false)
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./huddle.toml`, `./huddle.json`, `./config.toml`, `./config.json`
//! 2. The same names in `..` and `../..`
//! 3. The same names relative to the executable location

use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::NaiveDate;
use chrono_tz::Tz;
use huddle_domain::{HuddleConfig, HuddleError, Result};
use thiserror::Error;

use crate::errors::InfraError;

const CONFIG_FILE_NAMES: [&str; 4] = ["huddle.toml", "huddle.json", "config.toml", "config.json"];

/// Failures while locating, reading or parsing configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid TOML format: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid JSON format: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid value for {key}: {reason}")]
    InvalidVar { key: String, reason: String },
}

impl From<ConfigError> for InfraError {
    fn from(err: ConfigError) -> Self {
        InfraError(HuddleError::Config(err.to_string()))
    }
}

impl From<ConfigError> for HuddleError {
    fn from(err: ConfigError) -> Self {
        InfraError::from(err).into()
    }
}

/// Load configuration: file (or defaults), then environment overrides.
///
/// # Errors
/// Returns `HuddleError::Config` if:
/// - `HUDDLE_CONFIG` names a missing file
/// - File format is invalid
/// - An environment override cannot be parsed
/// - The merged configuration fails validation
pub fn load() -> Result<HuddleConfig> {
    let mut config = match std::env::var("HUDDLE_CONFIG") {
        Ok(path) => read_file(&PathBuf::from(path))?,
        Err(_) => match probe_config_paths() {
            Some(path) => read_file(&path)?,
            None => {
                tracing::info!("No config file found, using defaults");
                HuddleConfig::default()
            }
        },
    };

    apply_env_overrides(&mut config)?;
    config.validate()?;
    Ok(config)
}

/// Load configuration from defaults and environment variables only.
///
/// # Environment Variables
/// See module documentation for the complete list.
///
/// # Errors
/// Returns `HuddleError::Config` if a variable has an invalid value or the
/// result fails validation.
pub fn load_from_env() -> Result<HuddleConfig> {
    let mut config = HuddleConfig::default();
    apply_env_overrides(&mut config)?;
    config.validate()?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes the standard locations. Missing sections and
/// fields take their defaults.
///
/// # Errors
/// Returns `HuddleError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
/// - The configuration fails validation
pub fn load_from_file(path: Option<PathBuf>) -> Result<HuddleConfig> {
    let config_path = match path {
        Some(p) => p,
        None => probe_config_paths().ok_or_else(|| {
            HuddleError::Config("No config file found in any of the standard locations".into())
        })?,
    };

    let config = read_file(&config_path)?;
    config.validate()?;
    Ok(config)
}

fn read_file(path: &Path) -> std::result::Result<HuddleConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    tracing::info!(path = %path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(path)
        .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;

    parse_config(&contents, path)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> std::result::Result<HuddleConfig, ConfigError> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match extension {
        "toml" => Ok(toml::from_str(contents)?),
        "json" => Ok(serde_json::from_str(contents)?),
        other => Err(ConfigError::UnsupportedFormat(other.to_string())),
    }
}

/// Probe multiple paths for configuration files
///
/// Searches the working directory, its two parents, then the executable's
/// directory, for `huddle.{toml,json}` and `config.{toml,json}`.
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut bases = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        bases.extend([cwd.clone(), cwd.join(".."), cwd.join("../..")]);
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            bases.push(exe_dir.to_path_buf());
        }
    }

    bases
        .iter()
        .flat_map(|base| CONFIG_FILE_NAMES.iter().map(move |name| base.join(name)))
        .find(|path| path.exists())
}

fn apply_env_overrides(config: &mut HuddleConfig) -> std::result::Result<(), ConfigError> {
    if let Ok(prefix) = std::env::var("HUDDLE_LOCK_KEY_PREFIX") {
        config.lock.key_prefix = prefix;
    }
    if let Some(secs) = env_parse("HUDDLE_LOCK_TTL_SECS")? {
        config.lock.lock_ttl_secs = secs;
    }
    if let Some(secs) = env_parse("HUDDLE_LOCK_WAIT_TIMEOUT_SECS")? {
        config.lock.wait_timeout_secs = secs;
    }
    if let Some(ms) = env_parse("HUDDLE_LOCK_POLL_INTERVAL_MS")? {
        config.lock.poll_interval_ms = ms;
    }
    if let Some(max) = env_parse("HUDDLE_FALLBACK_CONCURRENCY")? {
        config.decorator.fallback_concurrency = Some(max);
    }
    if let Some(ratio) = env_parse("HUDDLE_HEALTH_ALERT_THRESHOLD")? {
        config.health.alert_threshold = ratio;
    }
    if let Some(ratio) = env_parse("HUDDLE_HEALTH_TARGET_THRESHOLD")? {
        config.health.target_threshold = ratio;
    }

    config.warming.enabled = env_bool("HUDDLE_WARMING_ENABLED", config.warming.enabled);
    if let Some(season) = env_parse("HUDDLE_SEASON")? {
        config.warming.season = season;
    }
    if let Some(start) = env_parse::<NaiveDate>("HUDDLE_SEASON_START")? {
        config.warming.season_start = start;
    }
    if let Some(week) = env_parse("HUDDLE_WEEK_OVERRIDE")? {
        config.warming.week_override = Some(week);
    }
    if let Some(tz) = env_parse::<Tz>("HUDDLE_TIMEZONE")? {
        config.warming.timezone = tz;
    }

    if let Ok(level) = std::env::var("HUDDLE_LOG_LEVEL") {
        config.logging.level = level;
    }
    config.logging.json = env_bool("HUDDLE_LOG_JSON", config.logging.json);

    Ok(())
}

/// Parse an optional environment variable.
///
/// # Errors
/// Returns `ConfigError::InvalidVar` if the variable is set but unparsable.
fn env_parse<T>(key: &str) -> std::result::Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Ok(raw) = std::env::var(key) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<T>()
        .map(Some)
        .map_err(|e| ConfigError::InvalidVar { key: key.to_string(), reason: e.to_string() })
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
///
/// # Returns
/// The parsed boolean value, or `default` if not set.
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
