//! Facade-level input and output types.

use chrono::{DateTime, Utc};

use credvault_common::CredentialId;
use credvault_storage::{CredentialData, CredentialType};

/// Fields required to create a credential.
#[derive(Debug, Clone)]
pub struct CredentialInput {
    pub name: String,
    pub kind: CredentialType,
    pub data: CredentialData,
    pub integration_id: Option<String>,
    pub allowed_users: Vec<String>,
    pub allowed_roles: Vec<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub rotation_schedule: Option<String>,
}

impl CredentialInput {
    /// Create an input with the required fields.
    pub fn new(name: impl Into<String>, kind: CredentialType, data: CredentialData) -> Self {
        Self {
            name: name.into(),
            kind,
            data,
            integration_id: None,
            allowed_users: Vec::new(),
            allowed_roles: Vec::new(),
            expires_at: None,
            rotation_schedule: None,
        }
    }

    /// Set the owning integration.
    pub fn with_integration_id(mut self, integration_id: impl Into<String>) -> Self {
        self.integration_id = Some(integration_id.into());
        self
    }

    /// Allow a user id.
    pub fn allow_user(mut self, user_id: impl Into<String>) -> Self {
        self.allowed_users.push(user_id.into());
        self
    }

    /// Allow a role.
    pub fn allow_role(mut self, role: impl Into<String>) -> Self {
        self.allowed_roles.push(role.into());
        self
    }

    /// Set the expiry timestamp.
    pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Set the rotation cadence descriptor.
    pub fn with_rotation_schedule(mut self, schedule: impl Into<String>) -> Self {
        self.rotation_schedule = Some(schedule.into());
        self
    }
}

/// Partial update applied by the facade's update operation.
///
/// Absent fields are left untouched; secret data is re-encrypted only when
/// `data` is supplied.
#[derive(Debug, Clone, Default)]
pub struct CredentialUpdate {
    pub name: Option<String>,
    pub data: Option<CredentialData>,
    pub allowed_users: Option<Vec<String>>,
    pub allowed_roles: Option<Vec<String>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub rotation_schedule: Option<String>,
}

impl CredentialUpdate {
    /// Create an empty update.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rename the credential.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Replace the secret payload.
    pub fn with_data(mut self, data: CredentialData) -> Self {
        self.data = Some(data);
        self
    }

    /// Replace the user allow-list.
    pub fn with_allowed_users(mut self, users: Vec<String>) -> Self {
        self.allowed_users = Some(users);
        self
    }

    /// Replace the role allow-list.
    pub fn with_allowed_roles(mut self, roles: Vec<String>) -> Self {
        self.allowed_roles = Some(roles);
        self
    }

    /// Move the expiry timestamp.
    pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Change the rotation cadence descriptor.
    pub fn with_rotation_schedule(mut self, schedule: impl Into<String>) -> Self {
        self.rotation_schedule = Some(schedule.into());
        self
    }
}

/// Decrypted credential handed to a caller.
///
/// Ephemeral: exists in memory only, for the single call that requested it.
/// Never logged, never persisted.
#[derive(Debug, Clone)]
pub struct DecryptedCredential {
    pub id: CredentialId,
    pub name: String,
    pub kind: CredentialType,
    pub data: CredentialData,
    pub expires_at: Option<DateTime<Utc>>,
}
