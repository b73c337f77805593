//! Authenticated encryption using XChaCha20-Poly1305.
//!
//! XChaCha20-Poly1305 provides both confidentiality and authenticity,
//! with a 24-byte nonce that is safe for random generation. The Poly1305
//! tag is carried separately from the ciphertext so envelopes can expose
//! it as an independent field.

use chacha20poly1305::{
    aead::{generic_array::GenericArray, Aead, AeadCore, KeyInit, OsRng},
    XChaCha20Poly1305,
};

use crate::keys::DerivedKey;
use credvault_common::{Error, Result};

/// Nonce size for XChaCha20-Poly1305 (24 bytes).
pub const IV_SIZE: usize = 24;

/// Authentication tag size (16 bytes, 128-bit).
pub const TAG_SIZE: usize = 16;

/// Encrypt plaintext under a derived key.
///
/// # Postconditions
/// - Returns (ciphertext, iv, tag) with a freshly generated random nonce
/// - The nonce is never reused, even for identical plaintext
///
/// # Errors
/// - Returns error if encryption fails
pub(crate) fn seal(
    key: &DerivedKey,
    plaintext: &[u8],
) -> Result<(Vec<u8>, [u8; IV_SIZE], [u8; TAG_SIZE])> {
    let cipher = XChaCha20Poly1305::new(GenericArray::from_slice(key.as_bytes()));
    let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);

    let mut sealed = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|e| Error::Crypto(format!("Encryption failed: {}", e)))?;

    // The aead crate appends the tag to the ciphertext; split it off.
    let tag_offset = sealed.len() - TAG_SIZE;
    let mut tag = [0u8; TAG_SIZE];
    tag.copy_from_slice(&sealed[tag_offset..]);
    sealed.truncate(tag_offset);

    let mut iv = [0u8; IV_SIZE];
    iv.copy_from_slice(&nonce);

    Ok((sealed, iv, tag))
}

/// Decrypt ciphertext under a derived key, verifying the tag.
///
/// # Postconditions
/// - Returns the original plaintext, or nothing at all: no partial
///   plaintext is ever produced on failure
///
/// # Errors
/// - Returns an integrity error if ciphertext, iv, or tag have been
///   altered in any way
pub(crate) fn open(
    key: &DerivedKey,
    ciphertext: &[u8],
    iv: &[u8; IV_SIZE],
    tag: &[u8; TAG_SIZE],
) -> Result<Vec<u8>> {
    let cipher = XChaCha20Poly1305::new(GenericArray::from_slice(key.as_bytes()));
    let nonce = GenericArray::from_slice(iv);

    let mut sealed = Vec::with_capacity(ciphertext.len() + TAG_SIZE);
    sealed.extend_from_slice(ciphertext);
    sealed.extend_from_slice(tag);

    cipher
        .decrypt(nonce, sealed.as_slice())
        .map_err(|_| Error::Integrity("authentication tag verification failed".to_string()))
}
