//! End-to-end encryption wire types
//!
//! The cryptogram itself is produced and consumed by an external encryptor.
//! These types only describe how it travels inside a JSON body.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

/// Output of an ECIES-style encryptor, or input to its decryption.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cryptogram {
    pub ephemeral_public_key: Option<Vec<u8>>,
    pub body: Vec<u8>,
    pub mac: Vec<u8>,
    pub nonce: Option<Vec<u8>>,
}

/// Header the encryptor wants attached to unsigned encrypted requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionMetadata {
    pub header_name: String,
    pub header_value: String,
}

/// Encrypted request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ephemeral_public_key: Option<String>,
    pub encrypted_data: String,
    pub mac: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
}

impl From<&Cryptogram> for EncryptedRequest {
    fn from(cryptogram: &Cryptogram) -> Self {
        Self {
            ephemeral_public_key: cryptogram.ephemeral_public_key.as_ref().map(|key| STANDARD.encode(key)),
            encrypted_data: STANDARD.encode(&cryptogram.body),
            mac: STANDARD.encode(&cryptogram.mac),
            nonce: cryptogram.nonce.as_ref().map(|nonce| STANDARD.encode(nonce)),
        }
    }
}

/// Encrypted response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedResponse {
    pub encrypted_data: String,
    pub mac: String,
}

impl EncryptedResponse {
    pub fn to_cryptogram(&self) -> Result<Cryptogram, base64::DecodeError> {
        Ok(Cryptogram {
            ephemeral_public_key: None,
            body: STANDARD.decode(&self.encrypted_data)?,
            mac: STANDARD.decode(&self.mac)?,
            nonce: None,
        })
    }
}
