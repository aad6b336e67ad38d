use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client as ReqwestClient, Method, Response};
use sealpost_core::{OutgoingRequest, ProgressCallback, Transport, TransportResponse};
use sealpost_domain::constants::DEFAULT_TIMEOUT_SECS;
use sealpost_domain::{
    NetworkConfig, ResponseMetadata, Result, SealPostError, TlsValidation, TransportError,
    TransportErrorKind,
};
use tracing::{debug, instrument, trace, warn};

use crate::errors::{InfraError, IntoTransportError};
use crate::http::tls;

/// reqwest-backed [`Transport`].
///
/// Sends each request exactly once. Timeouts, connection failures and TLS
/// rejections come back as a [`TransportError`]; any response that arrives,
/// whatever its status, comes back with its body and metadata.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: ReqwestClient,
    timeout: Duration,
}

impl HttpTransport {
    /// Start building a new transport.
    pub fn builder() -> HttpTransportBuilder {
        HttpTransportBuilder::default()
    }

    /// Transport using the timeout and TLS strategy of `config`.
    ///
    /// # Errors
    /// Returns `SealPostError::Client` or `SealPostError::Tls` if the
    /// underlying client cannot be built.
    pub fn from_config(config: &NetworkConfig) -> Result<Self> {
        Self::builder().timeout(config.timeout()).tls_validation(config.tls_validation().clone()).build()
    }

    /// Default timeout applied when a request carries none.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn read_body(
        response: &mut Response,
        progress: Option<&ProgressCallback>,
    ) -> std::result::Result<Vec<u8>, reqwest::Error> {
        let expected = response.content_length().filter(|len| *len > 0);
        let mut body = Vec::with_capacity(expected.map_or(0, |len| usize::try_from(len).unwrap_or(0)));

        while let Some(chunk) = response.chunk().await? {
            body.extend_from_slice(&chunk);
            if let (Some(progress), Some(expected)) = (progress, expected) {
                #[allow(clippy::cast_precision_loss)]
                let fraction = (body.len() as f64 / expected as f64).min(1.0);
                progress(fraction);
            }
        }

        if let Some(progress) = progress {
            progress(1.0);
        }
        Ok(body)
    }
}

fn metadata_of(response: &Response) -> ResponseMetadata {
    let headers = response
        .headers()
        .iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
        .collect();
    ResponseMetadata::new(response.status().as_u16(), response.url().to_string(), headers)
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(skip_all, fields(url = %request.url, encrypted = request.is_encrypted()))]
    async fn send(&self, request: OutgoingRequest, progress: Option<ProgressCallback>) -> TransportResponse {
        let method = match Method::from_bytes(request.method.as_bytes()) {
            Ok(method) => method,
            Err(err) => {
                return TransportResponse::failed(TransportError::new(
                    TransportErrorKind::Other,
                    format!("invalid HTTP method '{}': {err}", request.method),
                ))
            }
        };

        let OutgoingRequest { url, headers, body, encrypted_body, timeout, .. } = request;
        let wire_body = encrypted_body.unwrap_or(body);
        trace!(body = %String::from_utf8_lossy(&wire_body), "request body");

        let mut builder =
            self.client.request(method.clone(), url.clone()).timeout(timeout.unwrap_or(self.timeout));
        for (name, value) in headers.iter() {
            builder = builder.header(name, value);
        }

        debug!(%method, %url, "sending HTTP request");
        let mut response = match builder.body(wire_body).send().await {
            Ok(response) => response,
            Err(err) => {
                let error = err.into_transport_error();
                debug!(%method, %url, error = %error, "HTTP request failed");
                return TransportResponse::failed(error);
            }
        };

        let metadata = metadata_of(&response);
        debug!(%method, %url, status = metadata.status, "received HTTP response");

        match Self::read_body(&mut response, progress.as_ref()).await {
            Ok(body) => {
                trace!(body = %String::from_utf8_lossy(&body), "response body");
                TransportResponse::received(body, metadata)
            }
            Err(err) => {
                let error = err.into_transport_error();
                warn!(%url, status = metadata.status, error = %error, "failed to read response body");
                TransportResponse { body: None, metadata: Some(metadata), error: Some(error) }
            }
        }
    }
}

/// Builder for [`HttpTransport`].
#[derive(Debug)]
pub struct HttpTransportBuilder {
    timeout: Duration,
    tls_validation: TlsValidation,
}

impl Default for HttpTransportBuilder {
    fn default() -> Self {
        Self { timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS), tls_validation: TlsValidation::Default }
    }
}

impl HttpTransportBuilder {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn tls_validation(mut self, tls_validation: TlsValidation) -> Self {
        self.tls_validation = tls_validation;
        self
    }

    /// # Errors
    /// Returns `SealPostError::Tls` when the pinning configuration cannot be
    /// assembled and `SealPostError::Client` when reqwest rejects the client.
    pub fn build(self) -> Result<HttpTransport> {
        let mut builder = ReqwestClient::builder().timeout(self.timeout).no_proxy();

        match self.tls_validation {
            TlsValidation::Default => {}
            TlsValidation::NoValidation => {
                warn!("TLS certificate validation is disabled; use this for development only");
                builder = builder.danger_accept_invalid_certs(true);
            }
            TlsValidation::Pinning(provider) => {
                builder = builder.use_preconfigured_tls(tls::pinned_client_config(provider)?);
            }
        }

        let client = builder.build().map_err(|err| {
            let infra: InfraError = err.into();
            SealPostError::from(infra)
        })?;

        Ok(HttpTransport { client, timeout: self.timeout })
    }
}
