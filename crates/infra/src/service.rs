//! Service composition
//!
//! Wires a [`NetworkingService`] to the [`HttpTransport`] built from the
//! same configuration.

use std::sync::Arc;

use sealpost_core::{NetworkingService, NetworkingServiceBuilder, SigningPrimitive};
use sealpost_domain::{NetworkConfig, NetworkSettings, Result};

use crate::http::HttpTransport;

/// Builder for a service backed by an [`HttpTransport`], for callers that
/// want to set a name, observer or completion context first.
///
/// # Errors
/// Returns the transport construction error.
pub fn service_builder(
    config: NetworkConfig,
    signer: Arc<dyn SigningPrimitive>,
) -> Result<NetworkingServiceBuilder> {
    let transport = HttpTransport::from_config(&config)?;
    Ok(NetworkingService::builder(config, Arc::new(transport), signer))
}

/// Builds a service on the current Tokio runtime.
///
/// # Errors
/// Returns transport construction errors and `SealPostError::Client` when no
/// runtime is running.
pub fn connect(config: NetworkConfig, signer: Arc<dyn SigningPrimitive>) -> Result<NetworkingService> {
    service_builder(config, signer)?.build()
}

/// Validates `settings` and builds a service from them.
///
/// # Errors
/// Returns `SealPostError::Config` for invalid settings, plus everything
/// [`connect`] returns.
pub fn connect_from_settings(
    settings: NetworkSettings,
    signer: Arc<dyn SigningPrimitive>,
) -> Result<NetworkingService> {
    connect(settings.into_config()?, signer)
}
