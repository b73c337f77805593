//! Common error types for the credential vault.

use thiserror::Error;

/// Top-level error type for vault operations.
///
/// Cryptographic and policy failures are never silently recovered; they
/// propagate as the typed variant so callers can branch on the kind
/// (tamper alarms vs. key-management issues vs. policy violations).
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed input or envelope fields (non-decodable base64, wrong
    /// lengths, unknown format version).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Authentication-tag verification failed during decryption.
    /// Treat as a tamper signal.
    #[error("Integrity check failed: {0}")]
    Integrity(String),

    /// The referenced key id has no resident key material.
    #[error("Unknown key: {0}")]
    UnknownKey(String),

    /// The access policy denied the operation. The payload is the
    /// human-readable denial reason and is safe to display.
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// No credential exists for the given id.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A conflicting rotation is already underway.
    #[error("Rotation in progress: {0}")]
    RotationInProgress(String),

    /// Cryptographic operation failed.
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// Record store operation failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Audit log operation failed.
    #[error("Audit error: {0}")]
    Audit(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Message safe to show to an end user.
    ///
    /// Decryption failures collapse into a generic message so the specific
    /// kind (tamper vs. missing key) stays internal for alerting. Denial
    /// reasons are human-readable by construction.
    pub fn public_message(&self) -> String {
        match self {
            Error::Integrity(_) | Error::UnknownKey(_) => {
                "cannot decrypt credential".to_string()
            }
            other => other.to_string(),
        }
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
