//! Encryption service: envelope encryption under derived keys, with
//! rotation and re-encryption.
//!
//! One long-lived instance owns the key ring. Encrypt and decrypt only read
//! the ring; rotation is the single writer, serialized by the ring lock.
//! All operations are synchronous, CPU-bound, and perform no I/O.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use subtle::ConstantTimeEq;

use crate::aead;
use crate::envelope::EncryptedEnvelope;
use crate::kdf::{derive_key, master_fingerprint, KdfParams};
use crate::keys::{DerivedKey, KeyId, KeyState};
use credvault_common::{Error, Result};

/// A derived key resident in the ring, with its lifecycle state.
///
/// Material is dropped (and zeroized) on retirement; the entry remains as a
/// tombstone so the id is never reused.
struct KeyEntry {
    key: Option<DerivedKey>,
    state: KeyState,
    created_at: DateTime<Utc>,
}

struct KeyRing {
    keys: HashMap<KeyId, KeyEntry>,
    current: KeyId,
    master_fingerprint: [u8; 32],
}

/// Authenticated encryption with key lifecycle management.
pub struct EncryptionService {
    ring: RwLock<KeyRing>,
    params: KdfParams,
}

impl EncryptionService {
    /// Create a service with an initial key derived from the master secret.
    ///
    /// # Preconditions
    /// - `master_secret` must not be empty
    ///
    /// # Postconditions
    /// - One active key is resident and selected for new encryptions
    ///
    /// # Errors
    /// - Returns error if the master secret is empty or derivation fails
    pub fn new(master_secret: &str, params: KdfParams) -> Result<Self> {
        let key_id = KeyId::generate();
        let key = derive_key(master_secret.as_bytes(), &key_id, &params)?;

        let mut keys = HashMap::new();
        keys.insert(
            key_id.clone(),
            KeyEntry {
                key: Some(key),
                state: KeyState::Active,
                created_at: Utc::now(),
            },
        );

        Ok(Self {
            ring: RwLock::new(KeyRing {
                keys,
                current: key_id,
                master_fingerprint: master_fingerprint(master_secret.as_bytes()),
            }),
            params,
        })
    }

    /// Encrypt plaintext under the current active key.
    ///
    /// # Postconditions
    /// - A fresh random IV is generated for every call, never reused even
    ///   for identical plaintext
    /// - The returned envelope references the current key id
    ///
    /// # Errors
    /// - Returns error if encryption fails
    pub fn encrypt(&self, plaintext: &str) -> Result<EncryptedEnvelope> {
        let ring = self.ring.read().unwrap();
        let entry = ring
            .keys
            .get(&ring.current)
            .ok_or_else(|| Error::Crypto("Current key missing from ring".to_string()))?;
        let key = entry
            .key
            .as_ref()
            .ok_or_else(|| Error::Crypto("Current key has no material".to_string()))?;

        let (ciphertext, iv, tag) = aead::seal(key, plaintext.as_bytes())?;
        Ok(EncryptedEnvelope::assemble(
            ciphertext,
            iv,
            tag,
            ring.current.clone(),
        ))
    }

    /// Decrypt an envelope under the key it references.
    ///
    /// # Errors
    /// - `Validation` if envelope fields are malformed (checked before any
    ///   cryptography runs)
    /// - `UnknownKey` if the referenced key is not resident or was retired
    /// - `Integrity` if ciphertext, iv, or tag have been altered; decryption
    ///   is all-or-nothing
    pub fn decrypt(&self, envelope: &EncryptedEnvelope) -> Result<String> {
        let (ciphertext, iv, tag) = envelope.decode()?;

        let ring = self.ring.read().unwrap();
        let entry = ring
            .keys
            .get(&envelope.key_id)
            .ok_or_else(|| Error::UnknownKey(envelope.key_id.to_string()))?;
        let key = entry.key.as_ref().ok_or_else(|| {
            Error::UnknownKey(format!("{} has been retired", envelope.key_id))
        })?;

        let plaintext = aead::open(key, &ciphertext, &iv, &tag)?;
        String::from_utf8(plaintext)
            .map_err(|_| Error::Validation("Decrypted payload is not valid UTF-8".to_string()))
    }

    /// Decrypt under the envelope's key and re-encrypt under the current key.
    ///
    /// Used to migrate envelopes off retiring keys. Pure decrypt-then-encrypt,
    /// so re-running it on an already-migrated envelope is safe.
    pub fn re_encrypt(&self, envelope: &EncryptedEnvelope) -> Result<EncryptedEnvelope> {
        let plaintext = self.decrypt(envelope)?;
        self.encrypt(&plaintext)
    }

    /// Derive a key from a new master secret and make it current.
    ///
    /// # Postconditions
    /// - The superseded key moves to the rotating state and remains resident
    ///   for decryption until explicitly retired
    /// - New encryptions use the returned key id
    /// - `verify_master_key` now answers for the new secret
    ///
    /// # Errors
    /// - Returns error if the new secret is empty or derivation fails
    pub fn rotate_key(&self, new_master_secret: &str) -> Result<KeyId> {
        let new_id = KeyId::generate();
        // Derivation is deliberately slow; do it before taking the write lock
        // so concurrent encrypt/decrypt calls are not held up.
        let new_key = derive_key(new_master_secret.as_bytes(), &new_id, &self.params)?;

        let mut ring = self.ring.write().unwrap();

        let previous = ring.current.clone();
        if let Some(entry) = ring.keys.get_mut(&previous) {
            entry.state = KeyState::Rotating;
        }

        ring.keys.insert(
            new_id.clone(),
            KeyEntry {
                key: Some(new_key),
                state: KeyState::Active,
                created_at: Utc::now(),
            },
        );
        ring.current = new_id.clone();
        ring.master_fingerprint = master_fingerprint(new_master_secret.as_bytes());

        Ok(new_id)
    }

    /// Discard the material of a superseded key.
    ///
    /// Callers must first confirm that no persisted envelope references the
    /// key (the re-encryption sweep does this); retirement is never automatic.
    /// Retiring an already-retired key is a no-op.
    ///
    /// # Errors
    /// - `UnknownKey` if the id was never resident
    /// - `Validation` if the key is still active
    pub fn retire_key(&self, key_id: &KeyId) -> Result<()> {
        let mut ring = self.ring.write().unwrap();
        let entry = ring
            .keys
            .get_mut(key_id)
            .ok_or_else(|| Error::UnknownKey(key_id.to_string()))?;

        match entry.state {
            KeyState::Active => Err(Error::Validation(
                "Cannot retire the active key".to_string(),
            )),
            KeyState::Retired => Ok(()),
            KeyState::Rotating => {
                entry.key = None;
                entry.state = KeyState::Retired;
                Ok(())
            }
        }
    }

    /// Compare a candidate secret against the one in effect.
    ///
    /// Constant-time comparison of one-way fingerprints; used only for
    /// administrative confirmation.
    pub fn verify_master_key(&self, candidate: &str) -> bool {
        let candidate_fp = master_fingerprint(candidate.as_bytes());
        let ring = self.ring.read().unwrap();
        bool::from(candidate_fp.ct_eq(&ring.master_fingerprint))
    }

    /// Id of the key used for new encryptions.
    ///
    /// Stable until the next rotation.
    pub fn current_key_id(&self) -> KeyId {
        self.ring.read().unwrap().current.clone()
    }

    /// Lifecycle state of a key, if the id was ever resident.
    pub fn key_state(&self, key_id: &KeyId) -> Option<KeyState> {
        self.ring.read().unwrap().keys.get(key_id).map(|e| e.state)
    }

    /// Ids of all keys ever held by this instance, with creation times.
    pub fn key_inventory(&self) -> Vec<(KeyId, KeyState, DateTime<Utc>)> {
        let ring = self.ring.read().unwrap();
        ring.keys
            .iter()
            .map(|(id, entry)| (id.clone(), entry.state, entry.created_at))
            .collect()
    }
}
