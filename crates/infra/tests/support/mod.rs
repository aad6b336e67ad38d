#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use sealpost_core::{AccessToken, Credential, Encryptor, NetworkingService, SigningPrimitive};
use sealpost_domain::{
    AuthHeader, BoxError, ConcurrencyStrategy, Cryptogram, EncryptionMetadata, NetworkConfig, UserAgent,
};
use serde_json::{json, Value};
use url::Url;
use wiremock::MockServer;

pub const SIGNATURE_HEADER: &str = "X-Signature";
pub const ENCRYPTION_HEADER: &str = "X-Encryption";
const XOR_KEY: u8 = 0x5a;

#[derive(Debug)]
pub struct TestCredential {
    id: String,
    active: bool,
}

impl TestCredential {
    pub fn active(id: &str) -> Arc<dyn Credential> {
        Arc::new(Self { id: id.to_string(), active: true })
    }

    pub fn inactive(id: &str) -> Arc<dyn Credential> {
        Arc::new(Self { id: id.to_string(), active: false })
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
struct BearerToken(String);

impl AccessToken for BearerToken {
    fn generate_header(&self) -> Option<AuthHeader> {
        Some(AuthHeader::new("Authorization", format!("Bearer {}", self.0)))
    }
}

/// Signs with a readable, deterministic header value.
#[derive(Default)]
pub struct TestSigner {
    token_fetches: AtomicUsize,
}

impl TestSigner {
    pub fn token_fetches(&self) -> usize {
        self.token_fetches.load(Ordering::SeqCst)
    }

    pub fn expected_signature(uri_id: &str, credential: &str, body: &[u8]) -> String {
        format!("POST {uri_id} {credential} {}", body.len())
    }
}

#[async_trait]
impl SigningPrimitive for TestSigner {
    fn sign(
        &self,
        method: &str,
        uri_id: &str,
        body: &[u8],
        credential: &dyn Credential,
    ) -> Result<AuthHeader, BoxError> {
        assert_eq!(method, "POST");
        Ok(AuthHeader::new(SIGNATURE_HEADER, Self::expected_signature(uri_id, credential.id(), body)))
    }

    async fn fetch_token(
        &self,
        name: &str,
        credential: &dyn Credential,
    ) -> Result<Option<Arc<dyn AccessToken>>, BoxError> {
        self.token_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(Some(Arc::new(BearerToken(format!("{name}-{}", credential.id())))))
    }
}

/// Reversible stand-in for an end-to-end encryptor.
#[derive(Debug, Default)]
pub struct XorEncryptor;

fn xor(bytes: &[u8]) -> Vec<u8> {
    bytes.iter().map(|b| b ^ XOR_KEY).collect()
}

impl Encryptor for XorEncryptor {
    fn encrypt_request(&self, plaintext: &[u8]) -> Option<Cryptogram> {
        Some(Cryptogram { ephemeral_public_key: Some(vec![7]), body: xor(plaintext), mac: vec![1], nonce: None })
    }

    fn decrypt_response(&self, cryptogram: &Cryptogram) -> Option<Vec<u8>> {
        (cryptogram.mac == [1]).then(|| xor(&cryptogram.body))
    }

    fn metadata(&self) -> Option<EncryptionMetadata> {
        Some(EncryptionMetadata { header_name: ENCRYPTION_HEADER.into(), header_value: "app-scope".into() })
    }
}

impl XorEncryptor {
    /// Response body the backend would send for `envelope`.
    pub fn seal(envelope: &Value) -> Value {
        let plain = serde_json::to_vec(envelope).expect("serializable");
        json!({ "encryptedData": STANDARD.encode(xor(&plain)), "mac": STANDARD.encode([1u8]) })
    }

    /// Plain request envelope recovered from an encrypted request body.
    pub fn open(body: &[u8]) -> Value {
        let request: Value = serde_json::from_slice(body).expect("json body");
        let data = request["encryptedData"].as_str().expect("encryptedData");
        let plain = xor(&STANDARD.decode(data).expect("base64"));
        serde_json::from_slice(&plain).expect("json envelope")
    }
}

pub fn ok_envelope(object: Value) -> Value {
    json!({ "status": "OK", "responseObject": object })
}

pub fn error_envelope(code: &str, message: &str) -> Value {
    json!({ "status": "ERROR", "responseObject": { "code": code, "message": message } })
}

pub fn config_for(server: &MockServer, strategy: ConcurrencyStrategy) -> NetworkConfig {
    NetworkConfig::builder(Url::parse(&format!("{}/api/", server.uri())).expect("mock server url"))
        .concurrency(strategy)
        .user_agent(UserAgent::LibraryDefault)
        .app_identity("com.example.tests", "1.0")
        .build()
}

pub fn service(server: &MockServer, strategy: ConcurrencyStrategy) -> (NetworkingService, Arc<TestSigner>) {
    let signer = Arc::new(TestSigner::default());
    let service = sealpost_infra::service_builder(config_for(server, strategy), Arc::clone(&signer) as _)
        .expect("transport")
        .name("integration")
        .build()
        .expect("service");
    (service, signer)
}
