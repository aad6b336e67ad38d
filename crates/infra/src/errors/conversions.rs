//! Conversions from external infrastructure errors into domain errors.

use std::error::Error as StdError;

use reqwest::Error as HttpError;
use rustls::Error as TlsError;
use sealpost_domain::{SealPostError, TransportError, TransportErrorKind};

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub SealPostError);

impl From<InfraError> for SealPostError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<SealPostError> for InfraError {
    fn from(value: SealPostError) -> Self {
        InfraError(value)
    }
}

/// Classifies a per-request failure for the response classifier.
pub trait IntoTransportError {
    fn into_transport_error(self) -> TransportError;
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → TransportError */
/* -------------------------------------------------------------------------- */

fn caused_by_tls(error: &(dyn StdError + 'static)) -> bool {
    let mut current: Option<&(dyn StdError + 'static)> = Some(error);
    while let Some(err) = current {
        if err.downcast_ref::<TlsError>().is_some() {
            return true;
        }
        if let Some(io) = err.downcast_ref::<std::io::Error>() {
            if io.get_ref().is_some_and(|inner| inner.downcast_ref::<TlsError>().is_some()) {
                return true;
            }
        }
        current = err.source();
    }
    false
}

fn looks_like_tls(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("certificate") || lower.contains("tls handshake") || lower.contains("invalid peer")
}

fn describe(error: &HttpError) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

impl IntoTransportError for HttpError {
    fn into_transport_error(self) -> TransportError {
        let message = describe(&self);

        let kind = if self.is_timeout() {
            TransportErrorKind::Timeout
        } else if caused_by_tls(&self) || looks_like_tls(&message) {
            TransportErrorKind::Tls
        } else if self.is_connect() {
            TransportErrorKind::NotConnected
        } else if self.is_body() || self.is_decode() {
            TransportErrorKind::BadServerResponse
        } else {
            TransportErrorKind::Other
        };

        TransportError::new(kind, message)
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(SealPostError::Client(format!("failed to build HTTP client: {}", describe(&value))))
    }
}

/* -------------------------------------------------------------------------- */
/* rustls::Error → SealPostError */
/* -------------------------------------------------------------------------- */

impl From<TlsError> for InfraError {
    fn from(value: TlsError) -> Self {
        InfraError(SealPostError::Tls(value.to_string()))
    }
}
