//! Encrypted envelope format.
//!
//! The envelope is the only form in which secret material may be persisted:
//! ciphertext plus the metadata (iv, tag, key id) needed to decrypt it later,
//! independent of the master secret. Binary fields are base64; field names
//! follow the platform's persisted JSON convention.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

use crate::aead::{IV_SIZE, TAG_SIZE};
use crate::keys::KeyId;
use credvault_common::{Error, Result};

/// Cipher identifier recorded in every envelope.
pub const ALGORITHM: &str = "xchacha20-poly1305";

/// Envelope format version recorded in every envelope.
pub const ENVELOPE_VERSION: u32 = 1;

/// An encrypted payload with its decryption metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedEnvelope {
    /// Base64 ciphertext, tag excluded.
    pub ciphertext: String,
    /// Base64 initialization vector, unique per encryption call.
    pub iv: String,
    /// Base64 Poly1305 authentication tag.
    pub auth_tag: String,
    /// Id of the derived key this envelope was sealed under.
    pub key_id: KeyId,
    /// Cipher identifier; fixed for a given implementation.
    pub algorithm: String,
    /// Envelope format version; fixed for a given implementation.
    pub version: u32,
}

impl EncryptedEnvelope {
    pub(crate) fn assemble(
        ciphertext: Vec<u8>,
        iv: [u8; IV_SIZE],
        auth_tag: [u8; TAG_SIZE],
        key_id: KeyId,
    ) -> Self {
        Self {
            ciphertext: STANDARD.encode(ciphertext),
            iv: STANDARD.encode(iv),
            auth_tag: STANDARD.encode(auth_tag),
            key_id,
            algorithm: ALGORITHM.to_string(),
            version: ENVELOPE_VERSION,
        }
    }

    /// Decode and validate the binary fields.
    ///
    /// Fails fast before any cryptography runs, so malformed envelopes are
    /// distinguishable from tampered ones.
    pub(crate) fn decode(&self) -> Result<(Vec<u8>, [u8; IV_SIZE], [u8; TAG_SIZE])> {
        if self.algorithm != ALGORITHM {
            return Err(Error::Validation(format!(
                "Unsupported algorithm: {}",
                self.algorithm
            )));
        }

        if self.version != ENVELOPE_VERSION {
            return Err(Error::Validation(format!(
                "Unsupported envelope version: {}",
                self.version
            )));
        }

        let ciphertext = STANDARD
            .decode(&self.ciphertext)
            .map_err(|_| Error::Validation("Ciphertext is not valid base64".to_string()))?;

        let iv_bytes = STANDARD
            .decode(&self.iv)
            .map_err(|_| Error::Validation("IV is not valid base64".to_string()))?;
        if iv_bytes.len() != IV_SIZE {
            return Err(Error::Validation(format!(
                "Invalid IV length: expected {}, got {}",
                IV_SIZE,
                iv_bytes.len()
            )));
        }

        let tag_bytes = STANDARD
            .decode(&self.auth_tag)
            .map_err(|_| Error::Validation("Auth tag is not valid base64".to_string()))?;
        if tag_bytes.len() != TAG_SIZE {
            return Err(Error::Validation(format!(
                "Invalid auth tag length: expected {}, got {}",
                TAG_SIZE,
                tag_bytes.len()
            )));
        }

        let mut iv = [0u8; IV_SIZE];
        iv.copy_from_slice(&iv_bytes);
        let mut auth_tag = [0u8; TAG_SIZE];
        auth_tag.copy_from_slice(&tag_bytes);

        Ok((ciphertext, iv, auth_tag))
    }

    /// Check the envelope's fields without decrypting.
    pub fn validate(&self) -> Result<()> {
        self.decode().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_envelope() -> EncryptedEnvelope {
        EncryptedEnvelope::assemble(
            vec![1, 2, 3],
            [9u8; IV_SIZE],
            [7u8; TAG_SIZE],
            KeyId::new("key_test_0001").unwrap(),
        )
    }

    #[test]
    fn test_assemble_sets_constants() {
        let envelope = valid_envelope();

        assert_eq!(envelope.algorithm, ALGORITHM);
        assert_eq!(envelope.version, ENVELOPE_VERSION);
        assert!(envelope.validate().is_ok());
    }

    #[test]
    fn test_serialized_field_names() {
        let json = serde_json::to_string(&valid_envelope()).unwrap();

        assert!(json.contains("\"authTag\""));
        assert!(json.contains("\"keyId\""));
        assert!(json.contains("\"ciphertext\""));
    }

    #[test]
    fn test_json_roundtrip() {
        let envelope = valid_envelope();
        let json = serde_json::to_string(&envelope).unwrap();
        let restored: EncryptedEnvelope = serde_json::from_str(&json).unwrap();

        assert_eq!(restored, envelope);
    }

    #[test]
    fn test_bad_base64_fails_validation() {
        let mut envelope = valid_envelope();
        envelope.ciphertext = "not base64!!!".to_string();

        assert!(matches!(
            envelope.validate(),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_wrong_iv_length_fails_validation() {
        let mut envelope = valid_envelope();
        envelope.iv = STANDARD.encode([0u8; 12]);

        assert!(matches!(
            envelope.validate(),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_unknown_algorithm_fails_validation() {
        let mut envelope = valid_envelope();
        envelope.algorithm = "rot13".to_string();

        assert!(envelope.validate().is_err());
    }

    #[test]
    fn test_unknown_version_fails_validation() {
        let mut envelope = valid_envelope();
        envelope.version = 99;

        assert!(envelope.validate().is_err());
    }
}
