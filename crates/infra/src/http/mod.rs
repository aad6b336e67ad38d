//! HTTP transport

mod client;
pub mod tls;

pub use client::{HttpTransport, HttpTransportBuilder};
pub use tls::{pinned_client_config, PinningVerifier};
