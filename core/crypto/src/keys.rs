//! Key types with secure memory handling.
//!
//! Derived keys automatically zeroize their memory on drop to prevent
//! sensitive data from persisting after use. Only key *identifiers* are
//! ever persisted, inside envelopes; key material never leaves this crate.

use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Length of derived encryption keys in bytes (256-bit).
pub const KEY_LENGTH: usize = 32;

/// A key derived from the master secret.
///
/// Never serialized, never logged, never persisted. The derivation is
/// reproducible from the master secret and the key id, so losing the
/// in-memory copy loses nothing.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey {
    key: [u8; KEY_LENGTH],
}

impl DerivedKey {
    /// Create a derived key from raw bytes.
    pub fn from_bytes(key: [u8; KEY_LENGTH]) -> Self {
        Self { key }
    }

    /// Get the key bytes.
    ///
    /// # Security
    /// The returned slice should be used immediately and not stored.
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.key
    }
}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DerivedKey([REDACTED])")
    }
}

/// Identifier of a derived key: `key_<base36 millis>_<random hex>`.
///
/// Globally unique and never reused; the timestamp component makes ids
/// monotonically informative for operators.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyId(String);

impl KeyId {
    /// Create a KeyId from an externally supplied string.
    ///
    /// # Errors
    /// - Returns error if the id is empty
    pub fn new(id: impl Into<String>) -> credvault_common::Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(credvault_common::Error::Validation(
                "KeyId cannot be empty".to_string(),
            ));
        }
        Ok(Self(id))
    }

    /// Generate a fresh key id.
    pub fn generate() -> Self {
        use rand::RngCore;

        let millis = chrono::Utc::now().timestamp_millis().max(0) as u64;
        let mut entropy = [0u8; 4];
        rand::thread_rng().fill_bytes(&mut entropy);

        let hex: String = entropy.iter().map(|b| format!("{:02x}", b)).collect();
        Self(format!("key_{}_{}", to_base36(millis), hex))
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a derived key.
///
/// `Active` keys encrypt new envelopes. `Rotating` keys are decrypt-only,
/// kept resident so already-issued envelopes keep working until the
/// re-encryption sweep migrates them. `Retired` keys have had their
/// material discarded; the id remains as a tombstone so it is never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    Active,
    Rotating,
    Retired,
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

    if n == 0 {
        return "0".to_string();
    }

    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).expect("base36 digits are ASCII")
}
