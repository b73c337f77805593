//! Common types used throughout the credential vault.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a stored credential.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialId(String);

impl CredentialId {
    /// Create a CredentialId from an externally supplied string.
    ///
    /// # Errors
    /// - Returns error if the id is empty
    pub fn new(id: impl Into<String>) -> crate::Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(crate::Error::Validation(
                "CredentialId cannot be empty".to_string(),
            ));
        }
        Ok(Self(id))
    }

    /// Generate a fresh unique credential id.
    pub fn generate() -> Self {
        Self(format!("cred_{}", Uuid::new_v4().simple()))
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CredentialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Requester context constructed by the authentication layer per request.
///
/// The vault never persists this; it flows into access decisions and audit
/// entries only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessControlContext {
    /// Authenticated user id.
    pub user_id: String,
    /// Role of the user within the platform.
    pub user_role: String,
    /// Source address of the request, if known.
    pub ip_address: Option<String>,
    /// User agent of the request, if known.
    pub user_agent: Option<String>,
    /// Session identifier assigned by the authentication layer.
    pub session_id: Option<String>,
}

impl AccessControlContext {
    /// Create a context with the required identity fields.
    pub fn new(user_id: impl Into<String>, user_role: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            user_role: user_role.into(),
            ip_address: None,
            user_agent: None,
            session_id: None,
        }
    }

    /// Set the source address.
    pub fn with_ip_address(mut self, ip_address: impl Into<String>) -> Self {
        self.ip_address = Some(ip_address.into());
        self
    }

    /// Set the user agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Set the session identifier.
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}
