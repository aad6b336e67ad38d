//! # SealPost Domain
//!
//! Wire schema and configuration types for SealPost.
//!
//! This crate contains:
//! - Request/response envelopes and known API error codes
//! - Endpoint descriptors
//! - The unified [`NetworkError`] and setup-time [`SealPostError`]
//! - Networking configuration
//!
//! ## Architecture
//! - No dependencies on other SealPost crates
//! - No I/O

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
