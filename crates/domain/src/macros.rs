//! Macro for implementing Display and FromStr for setting enums
//!
//! Settings arrive as plain strings from environment variables and config
//! files. This macro gives a unit-only enum a canonical lowercase spelling
//! and case-insensitive parsing that reports failures as
//! [`SealPostError::Config`](crate::errors::SealPostError::Config).
//!
//! # Example
//!
//! ```rust
//! use sealpost_domain::impl_setting_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum Verbosity {
//!     Quiet,
//!     Loud,
//! }
//!
//! impl_setting_conversions!(Verbosity {
//!     Quiet => "quiet",
//!     Loud => "loud",
//! });
//!
//! assert_eq!("LOUD".parse::<Verbosity>().ok(), Some(Verbosity::Loud));
//! ```

/// Implements Display and FromStr for unit-only setting enums
///
/// * `$enum_name` - The name of the enum type
/// * `$variant => $str` - Mapping of enum variants to their lowercase setting
///   spelling
#[macro_export]
macro_rules! impl_setting_conversions {
    ($enum_name:ident { $($variant:ident => $str:literal),+ $(,)? }) => {
        impl $enum_name {
            /// Canonical setting spelling of this variant.
            pub const fn as_setting(&self) -> &'static str {
                match self {
                    $(Self::$variant => $str,)+
                }
            }
        }

        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_setting())
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = $crate::errors::SealPostError;

            fn from_str(s: &str) -> ::std::result::Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err($crate::errors::SealPostError::Config(format!(
                        "Invalid {}: {}",
                        stringify!($enum_name),
                        s
                    ))),
                }
            }
        }
    };
}
