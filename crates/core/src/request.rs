//! Request builder
//!
//! Turns an endpoint and a payload into an [`OutgoingRequest`]: envelope
//! serialization, optional encryption, and header composition.

use std::time::Duration;

use sealpost_domain::constants::{
    HEADER_ACCEPT, HEADER_ACCEPT_LANGUAGE, HEADER_CONTENT_TYPE, HEADER_USER_AGENT, HTTP_METHOD_POST,
    JSON_CONTENT_TYPE,
};
use sealpost_domain::{
    EncryptedRequest, EndpointDescriptor, ErrorReason, NetworkConfig, NetworkError, RequestEnvelope,
};
use serde::Serialize;
use tracing::{error, trace};
use url::Url;

use crate::ports::Encryptor;

// ============================================================================
// Headers
// ============================================================================

/// Ordered header list with case-insensitive names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestHeaders {
    entries: Vec<(String, String)>,
}

impl RequestHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `name`, replacing any existing value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(key, _)| key.eq_ignore_ascii_case(&name)) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Sets `name` only when it is not present yet.
    pub fn insert_if_absent(&mut self, name: &str, value: &str) {
        if !self.contains(name) {
            self.entries.push((name.to_string(), value.to_string()));
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================================
// OutgoingRequest
// ============================================================================

/// A fully prepared POST request.
#[derive(Debug, Clone)]
pub struct OutgoingRequest {
    pub url: Url,
    pub method: &'static str,
    pub headers: RequestHeaders,
    /// Serialized request envelope. Signatures are computed over this body.
    pub body: Vec<u8>,
    /// Encrypted body substituted on the wire when encryption succeeded.
    pub encrypted_body: Option<Vec<u8>>,
    /// Per-request timeout; the transport default applies when `None`.
    pub timeout: Option<Duration>,
}

impl OutgoingRequest {
    /// Bytes actually sent.
    pub fn wire_body(&self) -> &[u8] {
        self.encrypted_body.as_deref().unwrap_or(&self.body)
    }

    pub fn is_encrypted(&self) -> bool {
        self.encrypted_body.is_some()
    }
}

// ============================================================================
// RequestBuilder
// ============================================================================

/// Builds [`OutgoingRequest`]s against a [`NetworkConfig`].
pub struct RequestBuilder<'a> {
    config: &'a NetworkConfig,
    accept_language: &'a str,
    headers: &'a [(String, String)],
    encryptor: Option<&'a dyn Encryptor>,
    timeout: Option<Duration>,
}

impl<'a> RequestBuilder<'a> {
    pub fn new(config: &'a NetworkConfig) -> Self {
        Self { config, accept_language: config.accept_language(), headers: &[], encryptor: None, timeout: None }
    }

    #[must_use]
    pub fn accept_language(mut self, accept_language: &'a str) -> Self {
        self.accept_language = accept_language;
        self
    }

    /// Caller headers. They override the default headers.
    #[must_use]
    pub fn headers(mut self, headers: &'a [(String, String)]) -> Self {
        self.headers = headers;
        self
    }

    #[must_use]
    pub fn encryptor(mut self, encryptor: Option<&'a dyn Encryptor>) -> Self {
        self.encryptor = encryptor;
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Serializes `payload` into a request for `endpoint`.
    ///
    /// # Errors
    /// Returns `invalidRequestObject` when the URL cannot be built or the
    /// payload cannot be serialized.
    pub fn build<T: Serialize + ?Sized>(
        &self,
        endpoint: &EndpointDescriptor,
        payload: &T,
    ) -> Result<OutgoingRequest, NetworkError> {
        let url = self.config.build_url(endpoint.path()).map_err(|e| {
            error!(path = endpoint.path(), error = %e, "Failed to build request URL");
            NetworkError::wrap(ErrorReason::InvalidRequestObject, e)
        })?;

        let body = serde_json::to_vec(&RequestEnvelope::new(payload)).map_err(|e| {
            error!(path = endpoint.path(), error = %e, "Failed to serialize request object");
            NetworkError::wrap(ErrorReason::InvalidRequestObject, e)
        })?;
        trace!(path = endpoint.path(), body = %String::from_utf8_lossy(&body), "Request body");

        let mut headers = RequestHeaders::new();
        headers.insert(HEADER_ACCEPT_LANGUAGE, self.accept_language);
        if let Some(user_agent) = self.config.user_agent_header(self.accept_language) {
            headers.insert(HEADER_USER_AGENT, user_agent);
        }
        for (name, value) in self.headers {
            headers.insert(name.as_str(), value.as_str());
        }
        headers.insert_if_absent(HEADER_ACCEPT, JSON_CONTENT_TYPE);
        headers.insert_if_absent(HEADER_CONTENT_TYPE, JSON_CONTENT_TYPE);

        let mut encrypted_body = None;
        if let Some(encryptor) = self.encryptor {
            match encryptor.encrypt_request(&body) {
                Some(cryptogram) => {
                    let encrypted = serde_json::to_vec(&EncryptedRequest::from(&cryptogram))
                        .map_err(|e| NetworkError::wrap(ErrorReason::InvalidRequestObject, e))?;
                    encrypted_body = Some(encrypted);
                    if !endpoint.auth().is_signed() {
                        if let Some(metadata) = encryptor.metadata() {
                            headers.insert(metadata.header_name, metadata.header_value);
                        }
                    }
                }
                None => error!(path = endpoint.path(), "Failed to encrypt request with encryptor"),
            }
        }

        Ok(OutgoingRequest {
            url,
            method: HTTP_METHOD_POST,
            headers,
            body,
            encrypted_body,
            timeout: self.timeout,
        })
    }
}
