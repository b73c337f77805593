//! Access-control decisions for credential operations.
//!
//! Pure decision logic: no I/O, no side effects. The decision is identical
//! whether the result drives a real operation or a dry run.

use chrono::{DateTime, Utc};
use std::fmt;

use credvault_common::AccessControlContext;
use credvault_storage::{CredentialStatus, VaultCredential};

/// Role whose members may perform status-repairing actions.
pub const ADMIN_ROLE: &str = "admin";

/// Operation requested against a credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaultAction {
    Retrieve,
    Create,
    Update,
    Rotate,
    Revoke,
    Delete,
}

impl VaultAction {
    /// Whether an administrator may perform this action on a credential
    /// that is not active, to repair expired or revoked state.
    pub fn is_status_repairing(&self) -> bool {
        matches!(self, VaultAction::Rotate)
    }
}

/// Why a request was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    NotInAllowList,
    CredentialExpired,
    CredentialRevoked,
    RotationInProgress,
}

impl DenyReason {
    /// Human-readable reason, safe for display and for audit entries.
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::NotInAllowList => "user not in allow list",
            DenyReason::CredentialExpired => "credential expired",
            DenyReason::CredentialRevoked => "credential revoked",
            DenyReason::RotationInProgress => "credential rotation in progress",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of an authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Permit,
    Deny(DenyReason),
}

impl Decision {
    /// Whether the request may proceed.
    pub fn is_permitted(&self) -> bool {
        matches!(self, Decision::Permit)
    }
}

/// Stateless policy evaluator over credential allow-lists.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessControlService;

impl AccessControlService {
    /// Create a new evaluator.
    pub fn new() -> Self {
        Self
    }

    /// Decide whether `context` may perform `action` on `credential`.
    pub fn authorize(
        &self,
        context: &AccessControlContext,
        credential: &VaultCredential,
        action: VaultAction,
    ) -> Decision {
        self.authorize_at(context, credential, action, Utc::now())
    }

    /// Decision at an explicit point in time.
    ///
    /// A request is permitted only if the credential is active (or the
    /// action repairs status and the requester is an administrator) and the
    /// requester appears on one of the allow-lists.
    pub fn authorize_at(
        &self,
        context: &AccessControlContext,
        credential: &VaultCredential,
        action: VaultAction,
        now: DateTime<Utc>,
    ) -> Decision {
        let repairing = action.is_status_repairing() && context.user_role == ADMIN_ROLE;

        if !repairing {
            match credential.status {
                CredentialStatus::Revoked => {
                    return Decision::Deny(DenyReason::CredentialRevoked)
                }
                CredentialStatus::Expired => {
                    return Decision::Deny(DenyReason::CredentialExpired)
                }
                CredentialStatus::Rotating => {
                    return Decision::Deny(DenyReason::RotationInProgress)
                }
                CredentialStatus::Active => {}
            }

            if credential.is_past_expiry(now) {
                return Decision::Deny(DenyReason::CredentialExpired);
            }
        }

        let user_allowed = credential
            .allowed_users
            .iter()
            .any(|u| u == &context.user_id);
        let role_allowed = credential
            .allowed_roles
            .iter()
            .any(|r| r == &context.user_role);

        if user_allowed || role_allowed {
            Decision::Permit
        } else {
            Decision::Deny(DenyReason::NotInAllowList)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use credvault_common::CredentialId;
    use credvault_crypto::{EncryptedEnvelope, KeyId};
    use credvault_storage::CredentialType;

    fn credential() -> VaultCredential {
        use base64::{engine::general_purpose::STANDARD, Engine as _};

        let now = Utc::now();
        VaultCredential {
            id: CredentialId::new("cred-1").unwrap(),
            name: "jira-token".to_string(),
            kind: CredentialType::ApiKey,
            integration_id: None,
            encrypted_data: EncryptedEnvelope {
                ciphertext: STANDARD.encode(b"opaque"),
                iv: STANDARD.encode([0u8; 24]),
                auth_tag: STANDARD.encode([0u8; 16]),
                key_id: KeyId::new("key_test_0001").unwrap(),
                algorithm: credvault_crypto::ALGORITHM.to_string(),
                version: credvault_crypto::ENVELOPE_VERSION,
            },
            allowed_users: vec!["user-1".to_string()],
            allowed_roles: vec!["supervisor".to_string()],
            expires_at: None,
            rotation_schedule: None,
            last_rotated: None,
            rotation_count: 0,
            status: CredentialStatus::Active,
            created_at: now,
            updated_at: now,
            created_by: "user-1".to_string(),
            last_accessed_at: None,
            last_accessed_by: None,
        }
    }

    fn service() -> AccessControlService {
        AccessControlService::new()
    }

    #[test]
    fn test_permit_by_user_id() {
        let decision = service().authorize(
            &AccessControlContext::new("user-1", "analyst"),
            &credential(),
            VaultAction::Retrieve,
        );
        assert_eq!(decision, Decision::Permit);
    }

    #[test]
    fn test_permit_by_role() {
        let decision = service().authorize(
            &AccessControlContext::new("user-9", "supervisor"),
            &credential(),
            VaultAction::Retrieve,
        );
        assert_eq!(decision, Decision::Permit);
    }

    #[test]
    fn test_deny_not_in_allow_list() {
        let decision = service().authorize(
            &AccessControlContext::new("user-9", "analyst"),
            &credential(),
            VaultAction::Retrieve,
        );
        assert_eq!(decision, Decision::Deny(DenyReason::NotInAllowList));
    }

    #[test]
    fn test_deny_revoked() {
        let mut credential = credential();
        credential.status = CredentialStatus::Revoked;

        let decision = service().authorize(
            &AccessControlContext::new("user-1", "analyst"),
            &credential,
            VaultAction::Retrieve,
        );
        assert_eq!(decision, Decision::Deny(DenyReason::CredentialRevoked));
    }

    #[test]
    fn test_deny_past_expiry_even_while_status_active() {
        let mut credential = credential();
        credential.expires_at = Some(Utc::now() - Duration::hours(1));

        let decision = service().authorize(
            &AccessControlContext::new("user-1", "analyst"),
            &credential,
            VaultAction::Retrieve,
        );
        assert_eq!(decision, Decision::Deny(DenyReason::CredentialExpired));
    }

    #[test]
    fn test_deny_while_rotating() {
        let mut credential = credential();
        credential.status = CredentialStatus::Rotating;

        let decision = service().authorize(
            &AccessControlContext::new("user-1", "analyst"),
            &credential,
            VaultAction::Retrieve,
        );
        assert_eq!(decision, Decision::Deny(DenyReason::RotationInProgress));
    }

    #[test]
    fn test_admin_rotate_repairs_revoked() {
        let mut credential = credential();
        credential.status = CredentialStatus::Revoked;
        credential.allowed_roles.push(ADMIN_ROLE.to_string());

        let decision = service().authorize(
            &AccessControlContext::new("admin-1", ADMIN_ROLE),
            &credential,
            VaultAction::Rotate,
        );
        assert_eq!(decision, Decision::Permit);
    }

    #[test]
    fn test_admin_rotate_still_needs_allow_list() {
        let mut credential = credential();
        credential.status = CredentialStatus::Revoked;

        let decision = service().authorize(
            &AccessControlContext::new("admin-1", ADMIN_ROLE),
            &credential,
            VaultAction::Rotate,
        );
        assert_eq!(decision, Decision::Deny(DenyReason::NotInAllowList));
    }

    #[test]
    fn test_non_admin_rotate_cannot_repair() {
        let mut credential = credential();
        credential.status = CredentialStatus::Revoked;

        let decision = service().authorize(
            &AccessControlContext::new("user-1", "analyst"),
            &credential,
            VaultAction::Rotate,
        );
        assert_eq!(decision, Decision::Deny(DenyReason::CredentialRevoked));
    }

    #[test]
    fn test_decision_is_deterministic() {
        let context = AccessControlContext::new("user-1", "analyst");
        let credential = credential();
        let now = Utc::now();

        let first = service().authorize_at(&context, &credential, VaultAction::Update, now);
        let second = service().authorize_at(&context, &credential, VaultAction::Update, now);

        assert_eq!(first, second);
    }
}
