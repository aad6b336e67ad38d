//! # SealPost Infrastructure
//!
//! Infrastructure implementations of core ports.
//!
//! This crate contains:
//! - The reqwest/rustls HTTP transport (with certificate pinning)
//! - Conversions from external crate errors into domain errors
//! - Settings loader (environment, JSON and TOML files)
//! - Tracing bootstrap
//!
//! ## Architecture
//! - Implements traits defined in `sealpost-core`
//! - Contains all "impure" code (sockets, TLS, environment, files)

pub mod config;
pub mod errors;
pub mod http;
pub mod observability;
pub mod service;

// Re-export commonly used items
pub use errors::{InfraError, IntoTransportError};
pub use http::{HttpTransport, HttpTransportBuilder, PinningVerifier};
pub use service::{connect, connect_from_settings, service_builder};
