//! Request and response envelopes
//!
//! Every request body is wrapped as `{"requestObject": ...}` and every
//! response is read as `{"status": "OK"|"ERROR", ...}`.

use std::fmt;
use std::str::FromStr;

use serde::de::{DeserializeOwned, Error as _};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::constants::{REQUEST_OBJECT_KEY, RESPONSE_ERROR_KEY, RESPONSE_OBJECT_KEY};

/// Request body wrapper, always serialized under `requestObject`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestEnvelope<T> {
    #[serde(rename = "requestObject")]
    request_object: T,
}

impl<T> RequestEnvelope<T> {
    pub const KEY: &'static str = REQUEST_OBJECT_KEY;

    pub fn new(request_object: T) -> Self {
        Self { request_object }
    }

    pub fn request_object(&self) -> &T {
        &self.request_object
    }

    pub fn into_inner(self) -> T {
        self.request_object
    }
}

/// Envelope status as sent by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResponseStatus {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "ERROR")]
    Error,
}

/// Business error returned inside an `ERROR` envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self { code: code.into(), message: message.into() }
    }

    /// Resolves the code against the known backend codes.
    pub fn known_code(&self) -> Option<KnownApiError> {
        self.code.parse().ok()
    }
}

/// Response envelope.
///
/// Exactly one of `response_object` (status `OK`) or `response_error`
/// (status `ERROR`) is present. The fields are private, so the invariant is
/// fixed at construction and deserialization.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseEnvelope<T> {
    status: ResponseStatus,
    response_object: Option<T>,
    response_error: Option<ApiError>,
}

impl<T> ResponseEnvelope<T> {
    pub fn ok(response_object: T) -> Self {
        Self { status: ResponseStatus::Ok, response_object: Some(response_object), response_error: None }
    }

    pub fn error(response_error: ApiError) -> Self {
        Self { status: ResponseStatus::Error, response_object: None, response_error: Some(response_error) }
    }

    pub fn status(&self) -> ResponseStatus {
        self.status
    }

    pub fn is_ok(&self) -> bool {
        self.status == ResponseStatus::Ok
    }

    pub fn response_object(&self) -> Option<&T> {
        self.response_object.as_ref()
    }

    pub fn response_error(&self) -> Option<&ApiError> {
        self.response_error.as_ref()
    }

    pub fn into_result(self) -> Result<T, ApiError> {
        match (self.response_object, self.response_error) {
            (Some(object), _) => Ok(object),
            (None, Some(error)) => Err(error),
            // Unreachable through the constructors and the deserializer.
            (None, None) => Err(ApiError::new(KnownApiError::ErrorGeneric.as_str(), "empty envelope")),
        }
    }
}

impl<T: Serialize> Serialize for ResponseEnvelope<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("status", &self.status)?;
        if let Some(object) = &self.response_object {
            map.serialize_entry(RESPONSE_OBJECT_KEY, object)?;
        }
        if let Some(error) = &self.response_error {
            map.serialize_entry(RESPONSE_ERROR_KEY, error)?;
        }
        map.end()
    }
}

#[derive(Deserialize)]
struct RawResponseEnvelope {
    status: ResponseStatus,
    #[serde(rename = "responseObject", default)]
    response_object: Option<Value>,
    #[serde(rename = "responseError", default)]
    response_error: Option<ApiError>,
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for ResponseEnvelope<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawResponseEnvelope::deserialize(deserializer)?;
        match raw.status {
            ResponseStatus::Ok => {
                // A missing object still decodes for payload types that accept null, e.g. `()`.
                let object = raw.response_object.unwrap_or(Value::Null);
                T::deserialize(object).map(Self::ok).map_err(D::Error::custom)
            }
            ResponseStatus::Error => {
                // The backend sends the error payload under `responseObject`.
                let error = match (raw.response_error, raw.response_object) {
                    (Some(error), _) => error,
                    (None, Some(object)) => ApiError::deserialize(object).map_err(D::Error::custom)?,
                    (None, None) => return Err(D::Error::custom("ERROR envelope without error payload")),
                };
                Ok(Self::error(error))
            }
        }
    }
}

// ============================================================================
// Known API error codes
// ============================================================================

macro_rules! known_api_errors {
    ($($variant:ident => $code:literal),+ $(,)?) => {
        /// Error codes the backend is known to return.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum KnownApiError {
            $($variant,)+
        }

        impl KnownApiError {
            pub const ALL: &'static [Self] = &[$(Self::$variant,)+];

            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $code,)+
                }
            }
        }

        impl FromStr for KnownApiError {
            type Err = UnknownApiErrorCode;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($code => Ok(Self::$variant),)+
                    other => Err(UnknownApiErrorCode(other.to_string())),
                }
            }
        }
    };
}

known_api_errors! {
    ErrorGeneric => "ERROR_GENERIC",
    PowerAuthAuthFail => "POWERAUTH_AUTH_FAIL",
    InvalidRequest => "INVALID_REQUEST",
    InvalidActivation => "INVALID_ACTIVATION",
    InvalidApplication => "INVALID_APPLICATION",
    InvalidOperation => "INVALID_OPERATION",
    ErrActivation => "ERR_ACTIVATION",
    ErrAuthentication => "ERR_AUTHENTICATION",
    ErrSecureVault => "ERR_SECURE_VAULT",
    ErrEncryption => "ERR_ENCRYPTION",
    PushRegistrationFailed => "PUSH_REGISTRATION_FAILED",
    OperationAlreadyFinished => "OPERATION_ALREADY_FINISHED",
    OperationAlreadyFailed => "OPERATION_ALREADY_FAILED",
    OperationAlreadyCanceled => "OPERATION_ALREADY_CANCELED",
    OperationExpired => "OPERATION_EXPIRED",
    OperationFailed => "OPERATION_FAILED",
    ActivationCodeFailed => "ACTIVATION_CODE_FAILED",
    OnboardingFailed => "ONBOARDING_FAILED",
    OnboardingProcessLimitReached => "ONBOARDING_PROCESS_LIMIT_REACHED",
    TooManyOnboardingProcesses => "TOO_MANY_ONBOARDING_PROCESSES",
    OnboardingOtpFailed => "ONBOARDING_OTP_FAILED",
    InvalidDocument => "INVALID_DOCUMENT",
    DocumentSubmitFailed => "DOCUMENT_SUBMIT_FAILED",
    IdentityVerificationFailed => "IDENTITY_VERIFICATION_FAILED",
    IdentityVerificationLimitReached => "IDENTITY_VERIFICATION_LIMIT_REACHED",
    DocumentVerificationFailed => "DOCUMENT_VERIFICATION_FAILED",
    PresenceCheckFailed => "PRESENCE_CHECK_FAILED",
    PresenceCheckNotEnabled => "PRESENCE_CHECK_NOT_ENABLED",
    PresenceCheckLimitReached => "PRESENCE_CHECK_LIMIT_REACHED",
    TooManyRequests => "TOO_MANY_REQUESTS",
    RemoteCommunicationError => "REMOTE_COMMUNICATION_ERROR",
}

impl fmt::Display for KnownApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when an API error code is not one of [`KnownApiError`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown API error code: {0}")]
pub struct UnknownApiErrorCode(pub String);
