//! Cryptographic core of the credential vault.
//!
//! This module provides:
//! - Key derivation using Argon2id, salted deterministically per key id
//! - Authenticated encryption using XChaCha20-Poly1305
//! - Key lifecycle management (active, rotating, retired) with rotation
//!   and re-encryption
//!
//! # Security Guarantees
//! - Derived key material is automatically zeroized on drop
//! - No plaintext or key material is ever logged or serialized
//! - Constant-time comparison for master-secret verification

pub mod aead;
pub mod envelope;
pub mod kdf;
pub mod keys;
pub mod service;

pub use envelope::{EncryptedEnvelope, ALGORITHM, ENVELOPE_VERSION};
pub use kdf::{derive_key, master_fingerprint, KdfParams};
pub use keys::{DerivedKey, KeyId, KeyState, KEY_LENGTH};
pub use service::EncryptionService;
