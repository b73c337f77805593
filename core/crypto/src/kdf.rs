//! Key derivation using Argon2id.
//!
//! Each key id maps to an independently derived key obtained by stretching
//! the master secret with Argon2id, a memory-hard function resistant to both
//! GPU and time-memory trade-off attacks. The salt is derived
//! deterministically from the key id, so the key for a given id is always
//! reproducible without persisting it, and distinct ids never collide on
//! key material even under the same master secret.

use argon2::{Algorithm, Argon2, Params, Version};
use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use serde::{Deserialize, Serialize};

use crate::keys::{DerivedKey, KeyId, KEY_LENGTH};
use credvault_common::{Error, Result};

const SALT_DOMAIN: &[u8] = b"credvault.kdf.salt.v1";
const FINGERPRINT_DOMAIN: &[u8] = b"credvault.master.fingerprint.v1";

/// Parameters for Argon2id key derivation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB (e.g., 65536 = 64 MiB).
    pub memory_cost: u32,
    /// Number of iterations.
    pub time_cost: u32,
    /// Degree of parallelism.
    pub parallelism: u32,
}

impl KdfParams {
    /// Create parameters suitable for interactive use.
    ///
    /// These parameters provide a balance between security and usability,
    /// targeting approximately 0.5-1 second of derivation time.
    pub fn interactive() -> Self {
        Self {
            memory_cost: 65536, // 64 MiB
            time_cost: 3,
            parallelism: 4,
        }
    }

    /// Create parameters suitable for highly sensitive deployments.
    ///
    /// Higher security parameters that may take several seconds.
    pub fn sensitive() -> Self {
        Self {
            memory_cost: 262144, // 256 MiB
            time_cost: 4,
            parallelism: 4,
        }
    }

    /// Create moderate parameters for constrained environments and tests.
    pub fn moderate() -> Self {
        Self {
            memory_cost: 32768, // 32 MiB
            time_cost: 3,
            parallelism: 2,
        }
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self::interactive()
    }
}

/// Derive the key for `key_id` from the master secret using Argon2id.
///
/// # Preconditions
/// - `master_secret` must not be empty
///
/// # Postconditions
/// - Deterministic: the same `(master_secret, key_id, params)` always yields
///   the same key
/// - Distinct key ids yield distinct keys under the same secret
///
/// # Errors
/// - Returns error if the master secret is empty
/// - Returns error if Argon2id parameters are invalid
///
/// # Security
/// - The master secret is not stored or logged
/// - Derived key material is zeroized after use
pub fn derive_key(master_secret: &[u8], key_id: &KeyId, params: &KdfParams) -> Result<DerivedKey> {
    if master_secret.is_empty() {
        return Err(Error::Validation(
            "Master secret cannot be empty".to_string(),
        ));
    }

    let salt = salt_for_key_id(key_id);

    let argon2_params = Params::new(
        params.memory_cost,
        params.time_cost,
        params.parallelism,
        Some(KEY_LENGTH),
    )
    .map_err(|e| Error::Crypto(format!("Invalid KDF parameters: {}", e)))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);

    let mut key_bytes = [0u8; KEY_LENGTH];
    argon2
        .hash_password_into(master_secret, &salt, &mut key_bytes)
        .map_err(|e| Error::Crypto(format!("Key derivation failed: {}", e)))?;

    Ok(DerivedKey::from_bytes(key_bytes))
}

/// One-way fingerprint of the master secret.
///
/// Used only for administrative confirmation via constant-time comparison,
/// never to derive encryption keys.
pub fn master_fingerprint(master_secret: &[u8]) -> [u8; 32] {
    let mut hasher = Blake2b::<U32>::new();
    hasher.update(FINGERPRINT_DOMAIN);
    hasher.update(master_secret);

    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// Deterministic salt for a key id.
fn salt_for_key_id(key_id: &KeyId) -> [u8; 32] {
    let mut hasher = Blake2b::<U32>::new();
    hasher.update(SALT_DOMAIN);
    hasher.update(key_id.as_str().as_bytes());

    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}
