//! Audit log domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use credvault_common::CredentialId;

/// Structured metadata attached to an entry.
pub type AuditMetadata = serde_json::Map<String, serde_json::Value>;

/// Default page size for audit queries.
pub const DEFAULT_QUERY_LIMIT: usize = 50;

/// Kind of vault operation an audit entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Retrieve,
    Create,
    Update,
    Rotate,
    Revoke,
    Delete,
    AccessDenied,
}

impl AuditAction {
    /// Wire name of the action.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Retrieve => "retrieve",
            AuditAction::Create => "create",
            AuditAction::Update => "update",
            AuditAction::Rotate => "rotate",
            AuditAction::Revoke => "revoke",
            AuditAction::Delete => "delete",
            AuditAction::AccessDenied => "access_denied",
        }
    }

    /// Parse a wire name back into an action.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "retrieve" => Some(AuditAction::Retrieve),
            "create" => Some(AuditAction::Create),
            "update" => Some(AuditAction::Update),
            "rotate" => Some(AuditAction::Rotate),
            "revoke" => Some(AuditAction::Revoke),
            "delete" => Some(AuditAction::Delete),
            "access_denied" => Some(AuditAction::AccessDenied),
            _ => None,
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single audit record. Immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub credential_id: CredentialId,
    pub user_id: String,
    pub action: AuditAction,
    pub success: bool,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub reason: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub credential_name: Option<String>,
    pub integration_id: Option<String>,
    pub metadata: AuditMetadata,
}

/// Conjunctive filter over the audit log.
///
/// An entry matches when it satisfies every supplied predicate; `limit` and
/// `offset` paginate the matching set after it is sorted newest first.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub credential_id: Option<CredentialId>,
    pub user_id: Option<String>,
    pub action: Option<AuditAction>,
    pub success: Option<bool>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl AuditFilter {
    /// Create an empty filter matching everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to one credential.
    pub fn with_credential_id(mut self, id: CredentialId) -> Self {
        self.credential_id = Some(id);
        self
    }

    /// Restrict to one user.
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Restrict to one action kind.
    pub fn with_action(mut self, action: AuditAction) -> Self {
        self.action = Some(action);
        self
    }

    /// Restrict by outcome.
    pub fn with_success(mut self, success: bool) -> Self {
        self.success = Some(success);
        self
    }

    /// Restrict to entries at or after this instant.
    pub fn with_start_date(mut self, start: DateTime<Utc>) -> Self {
        self.start_date = Some(start);
        self
    }

    /// Restrict to entries at or before this instant.
    pub fn with_end_date(mut self, end: DateTime<Utc>) -> Self {
        self.end_date = Some(end);
        self
    }

    /// Cap the number of returned entries.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skip this many entries from the newest end.
    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// True when the entry satisfies every supplied predicate.
    ///
    /// Pagination fields are not consulted here.
    pub fn matches(&self, entry: &AuditLogEntry) -> bool {
        if let Some(ref id) = self.credential_id {
            if entry.credential_id != *id {
                return false;
            }
        }
        if let Some(ref user_id) = self.user_id {
            if entry.user_id != *user_id {
                return false;
            }
        }
        if let Some(action) = self.action {
            if entry.action != action {
                return false;
            }
        }
        if let Some(success) = self.success {
            if entry.success != success {
                return false;
            }
        }
        if let Some(start) = self.start_date {
            if entry.timestamp < start {
                return false;
            }
        }
        if let Some(end) = self.end_date {
            if entry.timestamp > end {
                return false;
            }
        }
        true
    }
}
