//! Encryption at rest for session payloads.
//!
//! Payloads are serialized to JSON, sealed with XChaCha20-Poly1305 under a key
//! derived from the process secret, and stored as base64 of `nonce || ciphertext`.
//! Every encryption draws a fresh nonce, so encoding is not deterministic.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chacha20poly1305::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Key, XChaCha20Poly1305, XNonce,
};
use serde_json::Value;
use sha2::{Digest, Sha256};

use super::{CodecError, SessionData};

const NONCE_LEN: usize = 24;

/// Serializes and encrypts session payloads with one secret key.
#[derive(Clone)]
pub struct PayloadCodec {
    cipher: XChaCha20Poly1305,
}

impl std::fmt::Debug for PayloadCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayloadCodec").finish_non_exhaustive()
    }
}

impl PayloadCodec {
    /// Build a codec from the configured secret.
    ///
    /// # Errors
    ///
    /// Returns `MissingSecret` if the secret is empty.
    pub fn new(secret: &str) -> Result<Self, CodecError> {
        if secret.is_empty() {
            return Err(CodecError::MissingSecret);
        }

        let key: [u8; 32] = Sha256::digest(secret.as_bytes()).into();
        Ok(Self {
            cipher: XChaCha20Poly1305::new(Key::from_slice(&key)),
        })
    }

    /// Serialize and encrypt a payload.
    pub fn encode(&self, data: &SessionData) -> Result<String, CodecError> {
        let plaintext =
            serde_json::to_vec(data).map_err(|e| CodecError::Serialize(e.to_string()))?;
        self.encrypt(&plaintext)
    }

    /// Decrypt and deserialize a stored payload.
    pub fn decode(&self, stored: &str) -> Result<SessionData, CodecError> {
        let plaintext = self.decrypt(stored)?;
        match serde_json::from_slice(&plaintext) {
            Ok(Value::Object(data)) => Ok(data),
            Ok(other) => Err(CodecError::Deserialize(format!(
                "expected a JSON object, found {}",
                json_kind(&other)
            ))),
            Err(e) => Err(CodecError::Deserialize(e.to_string())),
        }
    }

    fn encrypt(&self, plaintext: &[u8]) -> Result<String, CodecError> {
        let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|_| CodecError::Encrypt)?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(sealed))
    }

    fn decrypt(&self, stored: &str) -> Result<Vec<u8>, CodecError> {
        let sealed = STANDARD
            .decode(stored)
            .map_err(|e| CodecError::Decrypt(format!("invalid base64: {e}")))?;

        if sealed.len() < NONCE_LEN {
            return Err(CodecError::Decrypt("ciphertext too short".to_string()));
        }

        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
        self.cipher
            .decrypt(XNonce::from_slice(nonce), ciphertext)
            .map_err(|_| CodecError::Decrypt("authentication failed".to_string()))
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
