//! Error types used throughout SealPost
//!
//! Three layers of errors exist:
//! - [`SealPostError`]: setup-time failures (configuration, TLS, client
//!   construction).
//! - [`TransportError`]: a raw transport failure handed from the transport
//!   adapter to the response classifier.
//! - [`NetworkError`]: the single caller-visible error of a dispatched call.

use std::error::Error as StdError;
use std::fmt;

use thiserror::Error;

use crate::impl_setting_conversions;
use crate::types::{ApiError, KnownApiError, ResponseMetadata};

/// Boxed error used for nested causes and collaborator failures.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Setup-time error for SealPost
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SealPostError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("HTTP client error: {0}")]
    Client(String),
}

/// Result type alias for SealPost setup operations
pub type Result<T> = std::result::Result<T, SealPostError>;

// ============================================================================
// Transport errors
// ============================================================================

/// Coarse category of a transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    Timeout,
    NotConnected,
    BadServerResponse,
    Tls,
    Other,
}

impl_setting_conversions!(TransportErrorKind {
    Timeout => "timeout",
    NotConnected => "not_connected",
    BadServerResponse => "bad_server_response",
    Tls => "tls",
    Other => "other",
});

/// Failure reported by a transport instead of a response body.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("transport error ({kind}): {message}")]
pub struct TransportError {
    kind: TransportErrorKind,
    message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Classifier reason for a transport failure that produced no body.
    pub fn reason(&self) -> ErrorReason {
        match self.kind {
            TransportErrorKind::Timeout => ErrorReason::TimeOut,
            TransportErrorKind::NotConnected => ErrorReason::NoInternetConnection,
            TransportErrorKind::BadServerResponse => ErrorReason::BadServerResponse,
            TransportErrorKind::Tls => ErrorReason::SslError,
            TransportErrorKind::Other => ErrorReason::Generic,
        }
    }
}

// ============================================================================
// Network errors
// ============================================================================

/// Why a dispatched call failed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorReason {
    Unknown,
    Generic,
    InvalidResponseObject,
    InvalidRequestObject,
    SignError,
    TimeOut,
    NoInternetConnection,
    BadServerResponse,
    SslError,
    ErrorStatusCode,
    ApiError,
    MissingActivation,
    /// Application-defined reason.
    Custom(String),
}

impl ErrorReason {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Unknown => "unknown",
            Self::Generic => "generic",
            Self::InvalidResponseObject => "invalidResponseObject",
            Self::InvalidRequestObject => "invalidRequestObject",
            Self::SignError => "signError",
            Self::TimeOut => "timeOut",
            Self::NoInternetConnection => "noInternetConnection",
            Self::BadServerResponse => "badServerResponse",
            Self::SslError => "sslError",
            Self::ErrorStatusCode => "errorStatusCode",
            Self::ApiError => "apiError",
            Self::MissingActivation => "missingActivation",
            Self::Custom(reason) => reason,
        }
    }
}

impl fmt::Display for ErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The caller-visible error of a dispatched call.
///
/// A `NetworkError` never holds another `NetworkError` as its nested cause:
/// every constructor that accepts a cause goes through [`NetworkError::wrap`],
/// which copies the fields of an already-unified error forward instead.
#[derive(Debug)]
pub struct NetworkError {
    reason: ErrorReason,
    nested: Option<BoxError>,
    http_status: Option<u16>,
    http_response: Option<ResponseMetadata>,
    api_error: Option<ApiError>,
}

impl NetworkError {
    pub fn new(reason: ErrorReason) -> Self {
        Self { reason, nested: None, http_status: None, http_response: None, api_error: None }
    }

    /// Builds an error with `reason`, flattening `error` when it already is a
    /// `NetworkError`.
    pub fn wrap(reason: ErrorReason, error: impl Into<BoxError>) -> Self {
        match error.into().downcast::<Self>() {
            Ok(unified) => {
                let unified = *unified;
                Self { reason, ..unified }
            }
            Err(other) => Self { nested: Some(other), ..Self::new(reason) },
        }
    }

    /// Builds an error with a plain text cause.
    pub fn with_message(reason: ErrorReason, message: impl Into<String>) -> Self {
        Self::wrap(reason, message.into())
    }

    #[must_use]
    pub fn with_http_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }

    #[must_use]
    pub fn with_response(mut self, response: Option<ResponseMetadata>) -> Self {
        self.http_response = response;
        self
    }

    #[must_use]
    pub fn with_api_error(mut self, api_error: Option<ApiError>) -> Self {
        self.api_error = api_error;
        self
    }

    pub fn reason(&self) -> &ErrorReason {
        &self.reason
    }

    pub fn nested_error(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.nested.as_deref()
    }

    pub fn http_response(&self) -> Option<&ResponseMetadata> {
        self.http_response.as_ref()
    }

    pub fn api_error(&self) -> Option<&ApiError> {
        self.api_error.as_ref()
    }

    /// Explicit status, else the status of the attached response, else 0.
    pub fn http_status_code(&self) -> u16 {
        self.http_status
            .or_else(|| self.http_response.as_ref().map(|response| response.status))
            .unwrap_or(0)
    }

    pub fn api_error_code(&self) -> Option<&str> {
        self.api_error.as_ref().map(|api_error| api_error.code.as_str())
    }

    pub fn known_api_error(&self) -> Option<KnownApiError> {
        self.api_error.as_ref().and_then(ApiError::known_code)
    }

    fn transport_kind(&self) -> Option<TransportErrorKind> {
        self.nested
            .as_deref()
            .and_then(|nested| nested.downcast_ref::<TransportError>())
            .map(TransportError::kind)
    }

    /// The call failed because the network could not be reached.
    pub fn is_network_unreachable(&self) -> bool {
        matches!(self.transport_kind(), Some(TransportErrorKind::NotConnected))
    }

    /// The call failed because the server certificate was not trusted.
    pub fn is_connection_untrusted(&self) -> bool {
        matches!(self.transport_kind(), Some(TransportErrorKind::Tls))
    }
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error reason: {}", self.reason)?;
        let status = self.http_status_code();
        if status != 0 {
            write!(f, ", HTTP status code: {status}")?;
        }
        if let Some(code) = self.api_error_code() {
            write!(f, ", API error code: {code}")?;
        }
        if let Some(nested) = &self.nested {
            write!(f, ", caused by: {nested}")?;
        }
        Ok(())
    }
}

impl StdError for NetworkError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.nested.as_deref().map(|nested| nested as &(dyn StdError + 'static))
    }
}

impl From<TransportError> for NetworkError {
    fn from(error: TransportError) -> Self {
        Self::wrap(error.reason(), error)
    }
}
