//! Logging initialisation
//!
//! Installs the global `tracing` subscriber. `RUST_LOG` wins over the
//! configured level when set. Cache metrics themselves live in
//! `huddle_core::CacheHealthTracker`.

use huddle_domain::{HuddleError, LoggingConfig, Result};
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Build the filter: `RUST_LOG` if set, else `logging.level`.
///
/// # Errors
/// Returns `HuddleError::Config` for an unparsable level directive.
pub fn env_filter(logging: &LoggingConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&logging.level)
        .map_err(|err| HuddleError::Config(format!("invalid log level '{}': {err}", logging.level)))
}

/// Install the global subscriber.
///
/// # Errors
/// Returns `HuddleError::Config` for a bad level and `HuddleError::Internal`
/// when a subscriber is already installed.
pub fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = env_filter(logging)?;

    let fmt_layer = if logging.json {
        fmt::layer().json().with_current_span(true).with_target(true).boxed()
    } else {
        fmt::layer().with_target(true).boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|err| HuddleError::Internal(format!("failed to install tracing subscriber: {err}")))?;

    tracing::debug!(level = %logging.level, json = logging.json, "tracing.initialised");
    Ok(())
}
