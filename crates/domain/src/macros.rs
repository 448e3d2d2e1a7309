//! Display and FromStr for string-backed enums
//!
//! Parsing is case-insensitive; rendering uses the mapped string verbatim.
//!
//! # Example
//!
//! ```rust
//! use huddle_domain::impl_domain_status_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum Tier {
//!     Local,
//!     Shared,
//! }
//!
//! impl_domain_status_conversions!(Tier {
//!     Local => "local",
//!     Shared => "shared",
//! });
//!
//! assert_eq!(Tier::Shared.to_string(), "shared");
//! assert_eq!("LOCAL".parse::<Tier>(), Ok(Tier::Local));
//! ```

/// Implements `Display` and `FromStr` for a fieldless enum.
///
/// The `FromStr` error is a `String` naming the enum and the rejected input.
#[macro_export]
macro_rules! impl_domain_status_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$variant => f.write_str($str),)+
                }
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($enum_name), s)),
                }
            }
        }
    };
}
