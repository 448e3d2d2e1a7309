//! Conversions from external infrastructure errors into domain errors.

use huddle_domain::HuddleError;
#[cfg(feature = "redis")]
use redis::RedisError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub HuddleError);

impl From<InfraError> for HuddleError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<HuddleError> for InfraError {
    fn from(value: HuddleError) -> Self {
        InfraError(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
#[cfg(feature = "redis")]
trait IntoHuddleError {
    fn into_huddle(self) -> HuddleError;
}

/* -------------------------------------------------------------------------- */
/* redis::RedisError → HuddleError */
/* -------------------------------------------------------------------------- */

#[cfg(feature = "redis")]
impl IntoHuddleError for RedisError {
    fn into_huddle(self) -> HuddleError {
        use redis::ErrorKind;

        if self.is_timeout() {
            return HuddleError::CoordinationStore("redis command timed out".into());
        }
        if self.is_connection_refusal() {
            return HuddleError::CoordinationStore("redis connection refused".into());
        }
        if self.is_connection_dropped() {
            return HuddleError::CoordinationStore("redis connection dropped".into());
        }

        match self.kind() {
            ErrorKind::TypeError => {
                HuddleError::Serialization(format!("unexpected redis reply: {self}"))
            }
            ErrorKind::AuthenticationFailed => {
                HuddleError::Config(format!("redis authentication failed: {self}"))
            }
            ErrorKind::InvalidClientConfig => {
                HuddleError::Config(format!("invalid redis client configuration: {self}"))
            }
            _ => HuddleError::CoordinationStore(self.to_string()),
        }
    }
}

#[cfg(feature = "redis")]
impl From<RedisError> for InfraError {
    fn from(value: RedisError) -> Self {
        InfraError(value.into_huddle())
    }
}

/// Redis failure seen by the coordination store.
#[cfg(feature = "redis")]
pub fn redis_store_error(err: RedisError) -> HuddleError {
    err.into_huddle()
}

/// Redis failure seen by the shared cache tier. Backend outages are reported
/// as tier errors so the decorator treats them as a miss.
#[cfg(feature = "redis")]
pub fn redis_tier_error(err: RedisError) -> HuddleError {
    match err.into_huddle() {
        HuddleError::CoordinationStore(message) => HuddleError::CacheTier(message),
        other => other,
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
