//! Port interfaces for request dispatch
//!
//! Everything the dispatch engine needs from the outside world is expressed
//! here: the credential a call is made for, the signing primitive and access
//! tokens, the optional encryptor, the HTTP transport, the context a
//! completion runs on, and an observer for received bodies.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use sealpost_domain::{
    AuthHeader, BoxError, Cryptogram, EncryptionMetadata, ResponseMetadata, TransportError,
};
use url::Url;

use crate::request::OutgoingRequest;

/// Identity a signed call is made for.
pub trait Credential: Send + Sync + fmt::Debug {
    /// Stable identity. Keys the serial lane and the token cache.
    fn id(&self) -> &str;

    /// Whether the credential can currently produce signatures.
    fn has_active_session(&self) -> bool;
}

/// Access token able to produce an authorization header.
pub trait AccessToken: Send + Sync + fmt::Debug {
    fn generate_header(&self) -> Option<AuthHeader>;

    /// Cached tokens that report `false` are fetched again.
    fn is_valid(&self) -> bool {
        true
    }
}

/// Cryptographic signing primitive.
#[async_trait]
pub trait SigningPrimitive: Send + Sync {
    /// Computes the key signature header over `{method, uri_id, body}`.
    ///
    /// Synchronous and potentially slow; always called from a blocking worker.
    fn sign(
        &self,
        method: &str,
        uri_id: &str,
        body: &[u8],
        credential: &dyn Credential,
    ) -> Result<AuthHeader, BoxError>;

    /// Fetches the named access token. `Ok(None)` means the primitive had
    /// neither a token nor an error to report.
    async fn fetch_token(
        &self,
        name: &str,
        credential: &dyn Credential,
    ) -> Result<Option<Arc<dyn AccessToken>>, BoxError>;
}

/// End-to-end encryptor bound to one call.
pub trait Encryptor: Send + Sync + fmt::Debug {
    fn encrypt_request(&self, plaintext: &[u8]) -> Option<Cryptogram>;

    fn decrypt_response(&self, cryptogram: &Cryptogram) -> Option<Vec<u8>>;

    /// Header sent along with unsigned encrypted requests.
    fn metadata(&self) -> Option<EncryptionMetadata>;
}

/// Receives the fraction of the response body received so far.
pub type ProgressCallback = Arc<dyn Fn(f64) + Send + Sync>;

/// What a transport produced for a single request.
///
/// `body` is present whenever a response was received, even with an error
/// status. `error` is only meaningful when `body` is absent.
#[derive(Debug, Default)]
pub struct TransportResponse {
    pub body: Option<Vec<u8>>,
    pub metadata: Option<ResponseMetadata>,
    pub error: Option<TransportError>,
}

impl TransportResponse {
    pub fn received(body: Vec<u8>, metadata: ResponseMetadata) -> Self {
        Self { body: Some(body), metadata: Some(metadata), error: None }
    }

    pub fn failed(error: TransportError) -> Self {
        Self { body: None, metadata: None, error: Some(error) }
    }
}

/// HTTP transport. Sends one request, once, and resolves exactly once.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: OutgoingRequest, progress: Option<ProgressCallback>) -> TransportResponse;
}

/// Unit of work run by a [`CompletionContext`].
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Where completions run.
pub trait CompletionContext: Send + Sync {
    fn execute(&self, job: Job);
}

/// Observes every response body the service receives.
pub trait ResponseObserver: Send + Sync {
    fn response_received(&self, url: &Url, status: Option<u16>, body: &[u8]);

    fn encrypted_response_received(&self, url: &Url, status: Option<u16>, body: &[u8], decrypted: &[u8]);
}
