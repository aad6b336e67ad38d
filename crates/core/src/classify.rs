//! Response classifier
//!
//! Decodes (and, for encrypted calls, decrypts) a response body into an
//! envelope, then resolves the envelope or the transport failure into the
//! caller's `Result`.

use sealpost_domain::constants::HTTP_STATUS_OK;
use sealpost_domain::{
    EncryptedResponse, ErrorReason, NetworkError, ResponseEnvelope, ResponseMetadata, TransportError,
};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, error, trace, warn};
use url::Url;

use crate::ports::{Encryptor, ResponseObserver, TransportResponse};

/// Why a received body could not be turned into an envelope.
#[derive(Debug, Error)]
pub enum DecodeFailure {
    #[error("failed to decode response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to decrypt response")]
    Decryption,
}

/// A received body after decoding.
#[derive(Debug)]
pub enum ProcessedResponse<T> {
    Plain(ResponseEnvelope<T>),
    Encrypted { envelope: ResponseEnvelope<T>, decrypted: Vec<u8> },
    Failed(DecodeFailure),
}

/// Decodes `data` into an envelope, decrypting it first when an encryptor
/// is given.
///
/// When decryption fails and `accept_plaintext_errors` is set, a plaintext
/// envelope is still accepted, but only if its status is `ERROR`.
pub fn process_response<T: DeserializeOwned>(
    data: &[u8],
    encryptor: Option<&dyn Encryptor>,
    accept_plaintext_errors: bool,
) -> ProcessedResponse<T> {
    let Some(encryptor) = encryptor else {
        return match serde_json::from_slice(data) {
            Ok(envelope) => ProcessedResponse::Plain(envelope),
            Err(e) => {
                error!(error = %e, "Failed to decode the response");
                trace!(body = %String::from_utf8_lossy(data), "Undecodable response body");
                ProcessedResponse::Failed(e.into())
            }
        };
    };

    let decrypted = serde_json::from_slice::<EncryptedResponse>(data)
        .ok()
        .and_then(|encrypted| encrypted.to_cryptogram().ok())
        .and_then(|cryptogram| encryptor.decrypt_response(&cryptogram));

    match decrypted {
        Some(decrypted) => match serde_json::from_slice(&decrypted) {
            Ok(envelope) => ProcessedResponse::Encrypted { envelope, decrypted },
            Err(e) => {
                error!(error = %e, "Failed to decode decrypted response");
                trace!(body = %String::from_utf8_lossy(&decrypted), "Undecodable decrypted body");
                ProcessedResponse::Failed(e.into())
            }
        },
        None => {
            warn!("Failed to decrypt response");
            if accept_plaintext_errors {
                if let Ok(envelope) = serde_json::from_slice::<ResponseEnvelope<T>>(data) {
                    if !envelope.is_ok() {
                        warn!("Accepting plain error response for encrypted call");
                        return ProcessedResponse::Plain(envelope);
                    }
                }
            }
            ProcessedResponse::Failed(DecodeFailure::Decryption)
        }
    }
}

/// Resolves a decoded body.
///
/// # Errors
/// - `apiError` for an `ERROR` envelope
/// - `errorStatusCode` for an undecodable body with a non-200 status
/// - `invalidResponseObject` for an undecodable body otherwise
pub fn resolve<T>(processed: ProcessedResponse<T>, metadata: Option<ResponseMetadata>) -> Result<T, NetworkError> {
    let envelope = match processed {
        ProcessedResponse::Plain(envelope) | ProcessedResponse::Encrypted { envelope, .. } => envelope,
        ProcessedResponse::Failed(cause) => {
            let reason = match &metadata {
                Some(meta) if meta.status != HTTP_STATUS_OK => ErrorReason::ErrorStatusCode,
                _ => ErrorReason::InvalidResponseObject,
            };
            return Err(NetworkError::wrap(reason, cause).with_response(metadata));
        }
    };

    envelope.into_result().map_err(|api_error| {
        NetworkError::new(ErrorReason::ApiError).with_response(metadata).with_api_error(Some(api_error))
    })
}

/// Error for a transport that produced no body.
pub fn transport_failure(error: Option<TransportError>, metadata: Option<ResponseMetadata>) -> NetworkError {
    match error {
        Some(error) => NetworkError::from(error).with_response(metadata),
        None => NetworkError::new(ErrorReason::Generic).with_response(metadata),
    }
}

/// Classifies transport responses for one call.
pub struct ResponseClassifier<'a> {
    encryptor: Option<&'a dyn Encryptor>,
    accept_plaintext_errors: bool,
    observer: Option<&'a dyn ResponseObserver>,
}

impl<'a> ResponseClassifier<'a> {
    pub fn new(encryptor: Option<&'a dyn Encryptor>, accept_plaintext_errors: bool) -> Self {
        Self { encryptor, accept_plaintext_errors, observer: None }
    }

    #[must_use]
    pub fn observer(mut self, observer: Option<&'a dyn ResponseObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn classify<T: DeserializeOwned>(&self, url: &Url, response: TransportResponse) -> Result<T, NetworkError> {
        let TransportResponse { body, metadata, error } = response;
        let status = metadata.as_ref().map(|meta| meta.status);

        let Some(body) = body else {
            let err = transport_failure(error, metadata);
            debug!(%url, error = %err, "Transport failed");
            return Err(err);
        };

        let processed = process_response::<T>(&body, self.encryptor, self.accept_plaintext_errors);
        if let Some(observer) = self.observer {
            match &processed {
                ProcessedResponse::Encrypted { decrypted, .. } => {
                    observer.encrypted_response_received(url, status, &body, decrypted);
                }
                ProcessedResponse::Plain(_) | ProcessedResponse::Failed(_) => {
                    observer.response_received(url, status, &body);
                }
            }
        }
        resolve(processed, metadata)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use sealpost_domain::{Cryptogram, EncryptedRequest, EncryptionMetadata, TransportErrorKind};
    use serde::Deserialize;
    use serde_json::{json, Value};

    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Pong {
        id: u32,
    }

    /// Reverses the body bytes; refuses to decrypt when `broken`.
    #[derive(Debug)]
    struct ReverseEncryptor {
        broken: bool,
    }

    impl Encryptor for ReverseEncryptor {
        fn encrypt_request(&self, plaintext: &[u8]) -> Option<Cryptogram> {
            Some(Cryptogram { body: plaintext.iter().rev().copied().collect(), ..Cryptogram::default() })
        }

        fn decrypt_response(&self, cryptogram: &Cryptogram) -> Option<Vec<u8>> {
            (!self.broken).then(|| cryptogram.body.iter().rev().copied().collect())
        }

        fn metadata(&self) -> Option<EncryptionMetadata> {
            None
        }
    }

    fn encrypted_body(encryptor: &ReverseEncryptor, plain: &Value) -> Vec<u8> {
        let cryptogram = encryptor.encrypt_request(&serde_json::to_vec(plain).unwrap()).unwrap();
        let wire = EncryptedRequest::from(&cryptogram);
        serde_json::to_vec(&json!({ "encryptedData": wire.encrypted_data, "mac": wire.mac })).unwrap()
    }

    fn meta(status: u16) -> Option<ResponseMetadata> {
        Some(ResponseMetadata::new(status, "https://api.example.com/x".into(), Vec::new()))
    }

    fn bytes(value: Value) -> Vec<u8> {
        serde_json::to_vec(&value).unwrap()
    }

    #[test]
    fn ok_envelope_resolves_to_object() {
        let processed = process_response::<Pong>(&bytes(json!({"status":"OK","responseObject":{"id":5}})), None, true);
        assert_eq!(resolve(processed, meta(200)).unwrap(), Pong { id: 5 });
    }

    #[test]
    fn error_envelope_is_api_error() {
        let body = bytes(json!({"status":"ERROR","responseObject":{"code":"ERR_AUTHENTICATION","message":"no"}}));
        let err = resolve(process_response::<Pong>(&body, None, true), meta(400)).unwrap_err();
        assert_eq!(err.reason(), &ErrorReason::ApiError);
        assert_eq!(err.api_error_code(), Some("ERR_AUTHENTICATION"));
        assert_eq!(err.http_status_code(), 400);
    }

    #[test]
    fn undecodable_body_with_error_status_is_error_status_code() {
        let err = resolve(process_response::<Pong>(b"<html>502</html>", None, true), meta(502)).unwrap_err();
        assert_eq!(err.reason(), &ErrorReason::ErrorStatusCode);
        assert_eq!(err.http_status_code(), 502);
    }

    #[test]
    fn undecodable_body_with_ok_status_is_invalid_response_object() {
        let err = resolve(process_response::<Pong>(b"{\"unexpected\":1}", None, true), meta(200)).unwrap_err();
        assert_eq!(err.reason(), &ErrorReason::InvalidResponseObject);

        let err = resolve(process_response::<Pong>(b"", None, true), None).unwrap_err();
        assert_eq!(err.reason(), &ErrorReason::InvalidResponseObject);
    }

    #[test]
    fn encrypted_ok_response_is_decrypted() {
        let encryptor = ReverseEncryptor { broken: false };
        let body = encrypted_body(&encryptor, &json!({"status":"OK","responseObject":{"id":9}}));

        let processed = process_response::<Pong>(&body, Some(&encryptor), true);
        assert!(matches!(processed, ProcessedResponse::Encrypted { .. }));
        assert_eq!(resolve(processed, meta(200)).unwrap(), Pong { id: 9 });
    }

    #[test]
    fn plaintext_error_is_accepted_when_decryption_fails() {
        let encryptor = ReverseEncryptor { broken: true };
        let body = bytes(json!({"status":"ERROR","responseObject":{"code":"ERR_ENCRYPTION","message":"x"}}));

        let processed = process_response::<Pong>(&body, Some(&encryptor), true);
        assert!(matches!(processed, ProcessedResponse::Plain(_)));
        assert_eq!(resolve(processed, meta(400)).unwrap_err().api_error_code(), Some("ERR_ENCRYPTION"));
    }

    #[test]
    fn plaintext_ok_is_rejected_when_decryption_fails() {
        let encryptor = ReverseEncryptor { broken: true };
        let body = bytes(json!({"status":"OK","responseObject":{"id":1}}));

        let processed = process_response::<Pong>(&body, Some(&encryptor), true);
        assert!(matches!(processed, ProcessedResponse::Failed(DecodeFailure::Decryption)));
        assert_eq!(resolve(processed, meta(200)).unwrap_err().reason(), &ErrorReason::InvalidResponseObject);
    }

    #[test]
    fn plaintext_error_is_rejected_when_opted_out() {
        let encryptor = ReverseEncryptor { broken: true };
        let body = bytes(json!({"status":"ERROR","responseObject":{"code":"ERR_ENCRYPTION","message":"x"}}));
        let processed = process_response::<Pong>(&body, Some(&encryptor), false);
        assert!(matches!(processed, ProcessedResponse::Failed(DecodeFailure::Decryption)));
    }

    #[test]
    fn transport_failures_map_to_reasons() {
        let err = transport_failure(Some(TransportError::new(TransportErrorKind::Timeout, "slow")), None);
        assert_eq!(err.reason(), &ErrorReason::TimeOut);

        let err = transport_failure(None, None);
        assert_eq!(err.reason(), &ErrorReason::Generic);
    }

    #[derive(Default)]
    struct CountingObserver {
        plain: AtomicUsize,
        encrypted: AtomicUsize,
    }

    impl ResponseObserver for CountingObserver {
        fn response_received(&self, _url: &Url, _status: Option<u16>, _body: &[u8]) {
            self.plain.fetch_add(1, Ordering::SeqCst);
        }

        fn encrypted_response_received(&self, _url: &Url, _status: Option<u16>, _body: &[u8], _decrypted: &[u8]) {
            self.encrypted.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn classifier_notifies_observer() {
        let url = Url::parse("https://api.example.com/x").unwrap();
        let observer = CountingObserver::default();
        let encryptor = ReverseEncryptor { broken: false };

        let plain = TransportResponse::received(
            bytes(json!({"status":"OK","responseObject":{"id":1}})),
            ResponseMetadata::new(200, url.to_string(), Vec::new()),
        );
        let _: Pong = ResponseClassifier::new(None, true).observer(Some(&observer)).classify(&url, plain).unwrap();

        let encrypted = TransportResponse::received(
            encrypted_body(&encryptor, &json!({"status":"OK","responseObject":{"id":2}})),
            ResponseMetadata::new(200, url.to_string(), Vec::new()),
        );
        let pong: Pong =
            ResponseClassifier::new(Some(&encryptor), true).observer(Some(&observer)).classify(&url, encrypted).unwrap();

        assert_eq!(pong, Pong { id: 2 });
        assert_eq!(observer.plain.load(Ordering::SeqCst), 1);
        assert_eq!(observer.encrypted.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn classifier_reports_transport_error_without_body() {
        let url = Url::parse("https://api.example.com/x").unwrap();
        let response = TransportResponse::failed(TransportError::new(TransportErrorKind::NotConnected, "offline"));
        let err = ResponseClassifier::new(None, true).classify::<Pong>(&url, response).unwrap_err();
        assert_eq!(err.reason(), &ErrorReason::NoInternetConnection);
        assert!(err.is_network_unreachable());
    }
}
