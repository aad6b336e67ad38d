//! Fakes for unit tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use sealpost_domain::{AuthHeader, BoxError, ResponseMetadata};
use serde_json::{json, Value};

use crate::ports::{
    AccessToken, Credential, ProgressCallback, SigningPrimitive, Transport, TransportResponse,
};
use crate::request::OutgoingRequest;

#[derive(Debug)]
pub struct TestCredential {
    id: String,
    active: bool,
}

impl TestCredential {
    pub fn active(id: &str) -> Self {
        Self { id: id.to_string(), active: true }
    }

    pub fn inactive(id: &str) -> Self {
        Self { id: id.to_string(), active: false }
    }
}

impl Credential for TestCredential {
    fn id(&self) -> &str {
        &self.id
    }

    fn has_active_session(&self) -> bool {
        self.active
    }
}

#[derive(Debug)]
struct FakeToken {
    header: Option<AuthHeader>,
}

impl AccessToken for FakeToken {
    fn generate_header(&self) -> Option<AuthHeader> {
        self.header.clone()
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum TokenBehavior {
    Issue,
    Fail,
    Nothing,
    Headerless,
}

/// Signing primitive that records what it signed and how many signatures ran
/// at once.
pub struct FakeSigner {
    sign_delay: Duration,
    fail_sign: bool,
    tokens: TokenBehavior,
    token_fetches: AtomicUsize,
    signed: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeSigner {
    pub const SIGNATURE_HEADER: &'static str = "X-Signature";
    pub const TOKEN_HEADER: &'static str = "X-Token";

    pub fn new() -> Self {
        Self {
            sign_delay: Duration::ZERO,
            fail_sign: false,
            tokens: TokenBehavior::Issue,
            token_fetches: AtomicUsize::new(0),
            signed: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_sign_delay(mut self, delay: Duration) -> Self {
        self.sign_delay = delay;
        self
    }

    pub fn failing_sign(mut self) -> Self {
        self.fail_sign = true;
        self
    }

    pub fn failing_tokens(mut self) -> Self {
        self.tokens = TokenBehavior::Fail;
        self
    }

    pub fn without_token(mut self) -> Self {
        self.tokens = TokenBehavior::Nothing;
        self
    }

    pub fn with_headerless_token(mut self) -> Self {
        self.tokens = TokenBehavior::Headerless;
        self
    }

    pub fn token_fetches(&self) -> usize {
        self.token_fetches.load(Ordering::SeqCst)
    }

    /// Signed request bodies in signing order.
    pub fn signed_bodies(&self) -> Vec<String> {
        self.signed.lock().clone()
    }

    pub fn signatures_in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn max_concurrent_signatures(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SigningPrimitive for FakeSigner {
    fn sign(
        &self,
        method: &str,
        uri_id: &str,
        body: &[u8],
        _credential: &dyn Credential,
    ) -> Result<AuthHeader, BoxError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.signed.lock().push(String::from_utf8_lossy(body).into_owned());
        if !self.sign_delay.is_zero() {
            std::thread::sleep(self.sign_delay);
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail_sign {
            return Err("signing refused".into());
        }
        Ok(AuthHeader::new(Self::SIGNATURE_HEADER, format!("{method} {uri_id} {}", body.len())))
    }

    async fn fetch_token(
        &self,
        name: &str,
        _credential: &dyn Credential,
    ) -> Result<Option<Arc<dyn AccessToken>>, BoxError> {
        self.token_fetches.fetch_add(1, Ordering::SeqCst);
        match self.tokens {
            TokenBehavior::Issue => Ok(Some(Arc::new(FakeToken {
                header: Some(AuthHeader::new(Self::TOKEN_HEADER, format!("token {name}"))),
            }))),
            TokenBehavior::Headerless => Ok(Some(Arc::new(FakeToken { header: None }))),
            TokenBehavior::Nothing => Ok(None),
            TokenBehavior::Fail => Err("token service unavailable".into()),
        }
    }
}

type Responder = Arc<dyn Fn(&OutgoingRequest) -> TransportResponse + Send + Sync>;

/// Transport that answers from a closure after an optional delay.
pub struct FakeTransport {
    responder: Responder,
    delay: Duration,
    requests: Mutex<Vec<OutgoingRequest>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeTransport {
    pub fn responding(responder: impl Fn(&OutgoingRequest) -> TransportResponse + Send + Sync + 'static) -> Self {
        Self {
            responder: Arc::new(responder),
            delay: Duration::ZERO,
            requests: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Answers every request with `200 {"status":"OK","responseObject": object}`.
    pub fn ok(object: Value) -> Self {
        Self::json(200, json!({ "status": "OK", "responseObject": object }))
    }

    pub fn json(status: u16, body: Value) -> Self {
        Self::responding(move |request| {
            TransportResponse::received(
                serde_json::to_vec(&body).unwrap_or_default(),
                ResponseMetadata::new(status, request.url.to_string(), Vec::new()),
            )
        })
    }

    /// Echoes the request object back as the response object.
    pub fn echo() -> Self {
        Self::responding(|request| {
            let sent: Value = serde_json::from_slice(&request.body).unwrap_or(Value::Null);
            let body = json!({ "status": "OK", "responseObject": sent["requestObject"] });
            TransportResponse::received(
                serde_json::to_vec(&body).unwrap_or_default(),
                ResponseMetadata::new(200, request.url.to_string(), Vec::new()),
            )
        })
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn requests(&self) -> Vec<OutgoingRequest> {
        self.requests.lock().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn max_concurrent_requests(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send(&self, request: OutgoingRequest, progress: Option<ProgressCallback>) -> TransportResponse {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.requests.lock().push(request.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if let Some(progress) = progress {
            progress(1.0);
        }
        (self.responder)(&request)
    }
}
