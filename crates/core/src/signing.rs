//! Signing coordinator
//!
//! Produces the authorization header a request needs: a key signature
//! computed on a blocking worker, an access token header, or nothing.

use std::sync::Arc;

use sealpost_domain::{AuthHeader, AuthMode, ErrorReason, NetworkError};
use tracing::{debug, instrument, warn};

use crate::ports::{Credential, SigningPrimitive};
use crate::request::OutgoingRequest;
use crate::token_store::TokenStore;

/// Coordinates the signing primitive and the token cache.
pub struct SigningCoordinator {
    primitive: Arc<dyn SigningPrimitive>,
    tokens: Arc<TokenStore>,
}

impl SigningCoordinator {
    pub fn new(primitive: Arc<dyn SigningPrimitive>) -> Self {
        Self { primitive, tokens: Arc::new(TokenStore::new()) }
    }

    #[must_use]
    pub fn with_token_store(mut self, tokens: Arc<TokenStore>) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn token_store(&self) -> &Arc<TokenStore> {
        &self.tokens
    }

    /// Computes the authorization header for `request`.
    ///
    /// # Errors
    /// - `invalidRequestObject` when the request has no body
    /// - `signError` when the key signature fails, the credential is missing
    ///   or has no active session, or a token cannot produce a header
    /// - `generic` when fetching the token fails
    /// - `unknown` when the token fetch yields neither a token nor an error
    #[instrument(skip_all, fields(url = %request.url))]
    pub async fn sign(
        &self,
        request: &OutgoingRequest,
        auth: &AuthMode,
        credential: Option<&Arc<dyn Credential>>,
    ) -> Result<Option<AuthHeader>, NetworkError> {
        if request.body.is_empty() {
            return Err(NetworkError::new(ErrorReason::InvalidRequestObject));
        }

        match auth {
            AuthMode::Unsigned => Ok(None),
            AuthMode::SignedByKey { uri_id } => {
                let credential = require_credential(credential)?;
                if !credential.has_active_session() {
                    warn!(credential = credential.id(), "Signing requested without an active session");
                    return Err(NetworkError::with_message(
                        ErrorReason::SignError,
                        format!("credential '{}' has no active session", credential.id()),
                    ));
                }

                let primitive = Arc::clone(&self.primitive);
                let credential = Arc::clone(credential);
                let uri_id = uri_id.to_string();
                let body = request.body.clone();
                let method = request.method;

                let signed = tokio::task::spawn_blocking(move || {
                    primitive.sign(method, &uri_id, &body, credential.as_ref())
                })
                .await;

                match signed {
                    Ok(Ok(header)) => {
                        debug!(header = %header.key, "Request signed");
                        Ok(Some(header))
                    }
                    Ok(Err(e)) => Err(NetworkError::wrap(ErrorReason::SignError, e)),
                    Err(join) => Err(NetworkError::wrap(ErrorReason::SignError, join)),
                }
            }
            AuthMode::SignedByToken { token_name } => {
                let credential = require_credential(credential)?;
                match self.tokens.get_or_fetch(token_name, credential.as_ref(), self.primitive.as_ref()).await {
                    Err(e) => Err(NetworkError::wrap(ErrorReason::Generic, e)),
                    Ok(None) => Err(NetworkError::new(ErrorReason::Unknown)),
                    Ok(Some(token)) => token
                        .generate_header()
                        .map(Some)
                        .ok_or_else(|| NetworkError::new(ErrorReason::SignError)),
                }
            }
        }
    }
}

fn require_credential(credential: Option<&Arc<dyn Credential>>) -> Result<&Arc<dyn Credential>, NetworkError> {
    credential.ok_or_else(|| {
        NetworkError::with_message(ErrorReason::SignError, "signed endpoint called without a credential")
    })
}

#[cfg(test)]
mod tests {
    use sealpost_domain::{EndpointDescriptor, NetworkConfig};
    use url::Url;

    use super::*;
    use crate::request::RequestBuilder;
    use crate::test_support::{FakeSigner, TestCredential};

    const KEY: EndpointDescriptor = EndpointDescriptor::signed("/confirm", "/operation/authorize");
    const TOKEN: EndpointDescriptor = EndpointDescriptor::signed_with_token("/list", "possession");
    const OPEN: EndpointDescriptor = EndpointDescriptor::unsigned("/ping");

    fn request(endpoint: &EndpointDescriptor) -> OutgoingRequest {
        let config = NetworkConfig::new(Url::parse("https://api.example.com").unwrap());
        RequestBuilder::new(&config).build(endpoint, &serde_json::json!({ "n": 1 })).unwrap()
    }

    fn credential(active: bool) -> Arc<dyn Credential> {
        if active {
            Arc::new(TestCredential::active("alice"))
        } else {
            Arc::new(TestCredential::inactive("alice"))
        }
    }

    #[tokio::test]
    async fn unsigned_requests_get_no_header() {
        let coordinator = SigningCoordinator::new(Arc::new(FakeSigner::new()));
        let header = coordinator.sign(&request(&OPEN), OPEN.auth(), None).await.unwrap();
        assert!(header.is_none());
    }

    #[tokio::test]
    async fn key_signature_covers_uri_id_and_body() {
        let signer = Arc::new(FakeSigner::new());
        let coordinator = SigningCoordinator::new(signer.clone());
        let cred = credential(true);

        let header = coordinator.sign(&request(&KEY), KEY.auth(), Some(&cred)).await.unwrap().unwrap();

        assert_eq!(header.key, FakeSigner::SIGNATURE_HEADER);
        assert!(header.value.starts_with("POST /operation/authorize"));
        assert_eq!(signer.signed_bodies().len(), 1);
    }

    #[tokio::test]
    async fn key_signature_without_session_is_sign_error() {
        let signer = Arc::new(FakeSigner::new());
        let coordinator = SigningCoordinator::new(signer.clone());
        let cred = credential(false);

        let err = coordinator.sign(&request(&KEY), KEY.auth(), Some(&cred)).await.unwrap_err();
        assert_eq!(err.reason(), &ErrorReason::SignError);
        assert!(signer.signed_bodies().is_empty());
    }

    #[tokio::test]
    async fn failing_primitive_is_sign_error() {
        let coordinator = SigningCoordinator::new(Arc::new(FakeSigner::new().failing_sign()));
        let cred = credential(true);
        let err = coordinator.sign(&request(&KEY), KEY.auth(), Some(&cred)).await.unwrap_err();
        assert_eq!(err.reason(), &ErrorReason::SignError);
        assert!(err.nested_error().is_some());
    }

    #[tokio::test]
    async fn missing_credential_is_sign_error() {
        let coordinator = SigningCoordinator::new(Arc::new(FakeSigner::new()));
        let err = coordinator.sign(&request(&TOKEN), TOKEN.auth(), None).await.unwrap_err();
        assert_eq!(err.reason(), &ErrorReason::SignError);
    }

    #[tokio::test]
    async fn empty_body_is_invalid_request_object() {
        let coordinator = SigningCoordinator::new(Arc::new(FakeSigner::new()));
        let mut req = request(&KEY);
        req.body.clear();
        let cred = credential(true);
        let err = coordinator.sign(&req, KEY.auth(), Some(&cred)).await.unwrap_err();
        assert_eq!(err.reason(), &ErrorReason::InvalidRequestObject);
    }

    #[tokio::test]
    async fn token_header_is_used() {
        let coordinator = SigningCoordinator::new(Arc::new(FakeSigner::new()));
        let cred = credential(true);
        let header = coordinator.sign(&request(&TOKEN), TOKEN.auth(), Some(&cred)).await.unwrap().unwrap();
        assert_eq!(header.key, FakeSigner::TOKEN_HEADER);
        assert_eq!(coordinator.token_store().len().await, 1);
    }

    #[tokio::test]
    async fn token_outcomes_map_to_reasons() {
        let cred = credential(true);
        let cases = [
            (FakeSigner::new().failing_tokens(), ErrorReason::Generic),
            (FakeSigner::new().without_token(), ErrorReason::Unknown),
            (FakeSigner::new().with_headerless_token(), ErrorReason::SignError),
        ];
        for (signer, reason) in cases {
            let coordinator = SigningCoordinator::new(Arc::new(signer));
            let err = coordinator.sign(&request(&TOKEN), TOKEN.auth(), Some(&cred)).await.unwrap_err();
            assert_eq!(err.reason(), &reason);
        }
    }
}
