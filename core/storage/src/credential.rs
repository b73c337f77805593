//! Persisted credential records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use credvault_common::{CredentialId, Error, Result};
use credvault_crypto::EncryptedEnvelope;

/// Kind of secret held by a credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CredentialType {
    ApiKey,
    OauthToken,
    Certificate,
    Generic,
}

/// Lifecycle status of a stored credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialStatus {
    Active,
    Expired,
    Revoked,
    Rotating,
}

/// Decrypted secret payload.
///
/// Exists in memory only, for the duration of the call that requested it.
/// Never logged, never persisted except inside an encrypted envelope.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialData(serde_json::Map<String, serde_json::Value>);

impl CredentialData {
    /// Create an empty payload.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, consuming and returning the payload.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Get a field.
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the payload has no fields.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Serialize to the plaintext form that gets encrypted.
    pub fn to_plaintext(&self) -> Result<String> {
        serde_json::to_string(&self.0).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Restore from decrypted plaintext.
    pub fn from_plaintext(plaintext: &str) -> Result<Self> {
        serde_json::from_str(plaintext)
            .map(Self)
            .map_err(|e| Error::Serialization(e.to_string()))
    }
}

impl fmt::Debug for CredentialData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CredentialData([REDACTED; {} fields])", self.0.len())
    }
}

/// Persisted credential record.
///
/// Created by the vault's create operation; mutated on update, rotate, and
/// revoke. Secret material appears only as the encrypted envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultCredential {
    pub id: CredentialId,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: CredentialType,
    pub integration_id: Option<String>,
    pub encrypted_data: EncryptedEnvelope,
    pub allowed_users: Vec<String>,
    pub allowed_roles: Vec<String>,
    pub expires_at: Option<DateTime<Utc>>,
    /// Operator-facing rotation cadence descriptor; interpreted by the
    /// platform's scheduler, opaque to the vault.
    pub rotation_schedule: Option<String>,
    pub last_rotated: Option<DateTime<Utc>>,
    pub rotation_count: u32,
    pub status: CredentialStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: String,
    pub last_accessed_at: Option<DateTime<Utc>>,
    pub last_accessed_by: Option<String>,
}

impl VaultCredential {
    /// Whether the credential's expiry timestamp has passed.
    ///
    /// Independent of `status`: a record can be past expiry while the stored
    /// status still says active.
    pub fn is_past_expiry(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| at <= now).unwrap_or(false)
    }
}
