//! rustls configuration for certificate pinning
//!
//! [`PinningVerifier`] asks the application's [`PinningProvider`] about the
//! presented chain first and then runs the regular WebPKI validation against
//! the bundled Mozilla roots. A chain is trusted only when both agree.

use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::client::WebPkiServerVerifier;
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{CertificateError, ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use sealpost_domain::{PinningProvider, Result, SealPostError};
use tracing::{debug, warn};

use crate::errors::InfraError;

/// Server certificate verifier that consults a [`PinningProvider`].
#[derive(Debug)]
pub struct PinningVerifier {
    provider: Arc<dyn PinningProvider>,
    webpki: Arc<WebPkiServerVerifier>,
}

impl PinningVerifier {
    /// Creates a verifier backed by the `webpki-roots` trust anchors.
    ///
    /// # Errors
    /// Returns `SealPostError::Tls` if the WebPKI verifier cannot be built.
    pub fn new(provider: Arc<dyn PinningProvider>, crypto: Arc<CryptoProvider>) -> Result<Self> {
        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

        let webpki = WebPkiServerVerifier::builder_with_provider(Arc::new(roots), crypto)
            .build()
            .map_err(|e| SealPostError::Tls(format!("failed to build certificate verifier: {e}")))?;

        Ok(Self { provider, webpki })
    }
}

impl ServerCertVerifier for PinningVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        let name = server_name.to_str();
        let chain: Vec<&[u8]> = intermediates.iter().map(AsRef::as_ref).collect();

        if !self.provider.validate(&name, end_entity.as_ref(), &chain) {
            warn!(server = %name, "Server certificate rejected by pinning provider");
            return Err(rustls::Error::InvalidCertificate(CertificateError::ApplicationVerificationFailure));
        }

        debug!(server = %name, "Pinning provider accepted certificate; validating chain");
        self.webpki.verify_server_cert(end_entity, intermediates, server_name, ocsp_response, now)
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        self.webpki.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        self.webpki.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.webpki.supported_verify_schemes()
    }
}

/// Builds a rustls client configuration that pins through `provider`.
///
/// # Errors
/// Returns `SealPostError::Tls` if the ring provider rejects the default
/// protocol versions or the verifier cannot be built.
pub fn pinned_client_config(provider: Arc<dyn PinningProvider>) -> Result<ClientConfig> {
    let crypto = Arc::new(rustls::crypto::ring::default_provider());
    let verifier = PinningVerifier::new(provider, Arc::clone(&crypto))?;

    let config = ClientConfig::builder_with_provider(crypto)
        .with_safe_default_protocol_versions()
        .map_err(|e| SealPostError::from(InfraError::from(e)))?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(verifier))
        .with_no_client_auth();

    Ok(config)
}
