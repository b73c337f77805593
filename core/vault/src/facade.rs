//! Vault facade orchestrating access control, cryptography, and audit.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::access::{AccessControlService, Decision, DenyReason, VaultAction};
use crate::config::VaultConfig;
use crate::input::{CredentialInput, CredentialUpdate, DecryptedCredential};
use credvault_audit::{AuditAction, AuditDetail, AuditFilter, AuditLogEntry, AuditLogger, AuditSink};
use credvault_common::{AccessControlContext, CredentialId, Error, Result};
use credvault_crypto::EncryptionService;
use credvault_storage::{CredentialData, CredentialStatus, CredentialStore, VaultCredential};

/// The credential vault.
///
/// One long-lived instance owns the encryption key ring and a handle to the
/// durable audit sink; pass it explicitly to every consumer. Every public
/// operation evaluates permission, performs the work, and records the
/// outcome in the audit log.
pub struct Vault {
    encryption: Arc<EncryptionService>,
    access: AccessControlService,
    audit: Arc<AuditLogger>,
    store: Arc<dyn CredentialStore>,
}

impl Vault {
    /// Assemble a vault from its collaborators.
    pub fn new(
        encryption: Arc<EncryptionService>,
        store: Arc<dyn CredentialStore>,
        audit: Arc<AuditLogger>,
    ) -> Self {
        Self {
            encryption,
            access: AccessControlService::new(),
            audit,
            store,
        }
    }

    /// Construct a vault from a master secret and configuration.
    ///
    /// Must be called within a Tokio runtime (the audit worker is spawned).
    ///
    /// # Errors
    /// - Returns error if the master secret is empty or key derivation fails
    pub fn open(
        master_secret: &str,
        config: &VaultConfig,
        store: Arc<dyn CredentialStore>,
        sink: Arc<dyn AuditSink>,
    ) -> Result<Self> {
        let encryption = Arc::new(EncryptionService::new(master_secret, config.kdf.clone())?);
        let audit = Arc::new(AuditLogger::with_cache_capacity(
            sink,
            config.audit_cache_capacity,
        ));
        Ok(Self::new(encryption, store, audit))
    }

    /// The encryption service backing this vault.
    pub fn encryption(&self) -> &Arc<EncryptionService> {
        &self.encryption
    }

    /// The audit logger backing this vault.
    pub fn audit(&self) -> &Arc<AuditLogger> {
        &self.audit
    }

    /// The credential store backing this vault.
    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    /// Create a credential, encrypting its secret payload before persisting.
    ///
    /// # Preconditions
    /// - `input.name` must not be empty
    /// - `input.data` must have at least one field
    ///
    /// # Postconditions
    /// - The stored record holds only the encrypted envelope
    /// - One `create` audit entry is recorded
    ///
    /// # Errors
    /// - Validation failure on empty name or payload
    /// - Encryption or storage failure
    pub async fn create(
        &self,
        input: CredentialInput,
        context: &AccessControlContext,
    ) -> Result<VaultCredential> {
        if input.name.is_empty() {
            return Err(Error::Validation(
                "Credential name cannot be empty".to_string(),
            ));
        }
        if input.data.is_empty() {
            return Err(Error::Validation(
                "Credential data cannot be empty".to_string(),
            ));
        }

        debug!(name = %input.name, "Creating credential");

        let envelope = self.encryption.encrypt(&input.data.to_plaintext()?)?;
        let now = Utc::now();

        let credential = VaultCredential {
            id: CredentialId::generate(),
            name: input.name,
            kind: input.kind,
            integration_id: input.integration_id,
            encrypted_data: envelope,
            allowed_users: input.allowed_users,
            allowed_roles: input.allowed_roles,
            expires_at: input.expires_at,
            rotation_schedule: input.rotation_schedule,
            last_rotated: None,
            rotation_count: 0,
            status: CredentialStatus::Active,
            created_at: now,
            updated_at: now,
            created_by: context.user_id.clone(),
            last_accessed_at: None,
            last_accessed_by: None,
        };

        self.store.put(credential.clone()).await?;
        self.audit
            .log_create(context, &credential.id, self.detail_for(&credential));

        info!(credential = %credential.id, "Credential created");
        Ok(credential)
    }

    /// Retrieve and decrypt a credential.
    ///
    /// # Postconditions
    /// - `last_accessed_at` / `last_accessed_by` are stamped on success
    /// - Exactly one audit entry is recorded: `retrieve` on success or
    ///   failure, `access_denied` on denial
    ///
    /// # Errors
    /// - Not found
    /// - Access denied, with the loggable reason
    /// - Decryption failure (validation, unknown key, or integrity)
    pub async fn retrieve(
        &self,
        id: &CredentialId,
        context: &AccessControlContext,
    ) -> Result<DecryptedCredential> {
        let mut credential = self.store.get(id).await?;

        if let Decision::Deny(reason) = self.access.authorize(context, &credential, VaultAction::Retrieve)
        {
            return self.denied(context, &credential, reason);
        }

        let plaintext = match self.encryption.decrypt(&credential.encrypted_data) {
            Ok(plaintext) => plaintext,
            Err(e) => {
                self.audit.log(
                    context,
                    AuditAction::Retrieve,
                    id,
                    false,
                    self.detail_for(&credential).with_reason(e.to_string()),
                );
                return Err(e);
            }
        };
        let data = CredentialData::from_plaintext(&plaintext)?;

        credential.last_accessed_at = Some(Utc::now());
        credential.last_accessed_by = Some(context.user_id.clone());
        self.store.put(credential.clone()).await?;

        self.audit
            .log_retrieve(context, id, self.detail_for(&credential));

        debug!(credential = %id, user = %context.user_id, "Credential retrieved");
        Ok(DecryptedCredential {
            id: credential.id,
            name: credential.name,
            kind: credential.kind,
            data,
            expires_at: credential.expires_at,
        })
    }

    /// Apply a partial update, re-encrypting only if the secret changed.
    ///
    /// # Errors
    /// - Not found
    /// - Access denied
    /// - Encryption or storage failure
    pub async fn update(
        &self,
        id: &CredentialId,
        update: CredentialUpdate,
        context: &AccessControlContext,
    ) -> Result<VaultCredential> {
        let mut credential = self.store.get(id).await?;

        if let Decision::Deny(reason) = self.access.authorize(context, &credential, VaultAction::Update)
        {
            return self.denied(context, &credential, reason);
        }

        if let Some(name) = update.name {
            credential.name = name;
        }
        if let Some(data) = update.data {
            credential.encrypted_data = self.encryption.encrypt(&data.to_plaintext()?)?;
        }
        if let Some(users) = update.allowed_users {
            credential.allowed_users = users;
        }
        if let Some(roles) = update.allowed_roles {
            credential.allowed_roles = roles;
        }
        if let Some(expires_at) = update.expires_at {
            credential.expires_at = Some(expires_at);
        }
        if let Some(schedule) = update.rotation_schedule {
            credential.rotation_schedule = Some(schedule);
        }
        credential.updated_at = Utc::now();

        self.store.put(credential.clone()).await?;
        self.audit
            .log_update(context, id, self.detail_for(&credential));

        info!(credential = %id, "Credential updated");
        Ok(credential)
    }

    /// Re-encrypt a credential's envelope under the current key.
    ///
    /// The record passes through the rotating status while the new envelope
    /// is produced, so a concurrent rotation observes the conflict.
    ///
    /// # Errors
    /// - Not found
    /// - Access denied
    /// - Rotation already in progress
    /// - Decryption failure
    pub async fn rotate(
        &self,
        id: &CredentialId,
        context: &AccessControlContext,
    ) -> Result<VaultCredential> {
        let mut credential = self.store.get(id).await?;

        if let Decision::Deny(reason) = self.access.authorize(context, &credential, VaultAction::Rotate)
        {
            return self.denied(context, &credential, reason);
        }

        if credential.status == CredentialStatus::Rotating {
            let e = Error::RotationInProgress(id.to_string());
            self.audit.log(
                context,
                AuditAction::Rotate,
                id,
                false,
                self.detail_for(&credential)
                    .with_reason(DenyReason::RotationInProgress.as_str()),
            );
            return Err(e);
        }

        let prior_status = credential.status;
        credential.status = CredentialStatus::Rotating;
        credential.updated_at = Utc::now();
        self.store.put(credential.clone()).await?;

        let rotated = match self.encryption.re_encrypt(&credential.encrypted_data) {
            Ok(envelope) => envelope,
            Err(e) => {
                // Put the record back the way we found it; the envelope was
                // never touched, so it is still valid.
                credential.status = prior_status;
                credential.updated_at = Utc::now();
                self.store.put(credential.clone()).await?;
                self.audit.log(
                    context,
                    AuditAction::Rotate,
                    id,
                    false,
                    self.detail_for(&credential).with_reason(e.to_string()),
                );
                return Err(e);
            }
        };

        let now = Utc::now();
        credential.encrypted_data = rotated;
        credential.status = CredentialStatus::Active;
        credential.rotation_count += 1;
        credential.last_rotated = Some(now);
        credential.updated_at = now;
        self.store.put(credential.clone()).await?;

        self.audit
            .log_rotate(context, id, self.detail_for(&credential));

        info!(credential = %id, rotation = credential.rotation_count, "Credential rotated");
        Ok(credential)
    }

    /// Revoke a credential.
    ///
    /// Non-destructive: the record is kept with its status flipped, so the
    /// audit history stays attached to a real credential.
    ///
    /// # Errors
    /// - Not found
    /// - Access denied
    pub async fn revoke(
        &self,
        id: &CredentialId,
        reason: &str,
        context: &AccessControlContext,
    ) -> Result<VaultCredential> {
        let mut credential = self.store.get(id).await?;

        if let Decision::Deny(deny) = self.access.authorize(context, &credential, VaultAction::Revoke)
        {
            return self.denied(context, &credential, deny);
        }

        credential.status = CredentialStatus::Revoked;
        credential.updated_at = Utc::now();

        self.store.put(credential.clone()).await?;
        self.audit
            .log_revoke(context, id, self.detail_for(&credential).with_reason(reason));

        info!(credential = %id, reason, "Credential revoked");
        Ok(credential)
    }

    /// Audit entries matching the filter, for the compliance/admin UI.
    pub async fn list_audit_logs(&self, filter: &AuditFilter) -> Result<Vec<AuditLogEntry>> {
        self.audit.get_logs(filter).await
    }

    fn detail_for(&self, credential: &VaultCredential) -> AuditDetail {
        let mut detail = AuditDetail::new().with_credential_name(&credential.name);
        if let Some(ref integration_id) = credential.integration_id {
            detail = detail.with_integration_id(integration_id);
        }
        detail
    }

    fn denied<T>(
        &self,
        context: &AccessControlContext,
        credential: &VaultCredential,
        reason: DenyReason,
    ) -> Result<T> {
        self.audit.log_access_denied(
            context,
            &credential.id,
            reason.as_str(),
            self.detail_for(credential),
        );
        warn!(
            credential = %credential.id,
            user = %context.user_id,
            reason = %reason,
            "Access denied"
        );
        Err(Error::AccessDenied(reason.as_str().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::ADMIN_ROLE;
    use chrono::Duration;
    use credvault_audit::MemoryAuditSink;
    use credvault_crypto::KdfParams;
    use credvault_storage::{CredentialType, MemoryCredentialStore};

    fn context(user: &str, role: &str) -> AccessControlContext {
        AccessControlContext::new(user, role)
            .with_session_id(format!("sess-{}", user))
            .with_ip_address("10.0.0.1")
    }

    fn vault() -> (Vault, Arc<MemoryCredentialStore>, Arc<MemoryAuditSink>) {
        let store = Arc::new(MemoryCredentialStore::new());
        let sink = Arc::new(MemoryAuditSink::new());
        let config = VaultConfig::default().with_kdf(KdfParams::moderate());
        let vault = Vault::open("test-key", &config, store.clone(), sink.clone()).unwrap();
        (vault, store, sink)
    }

    fn sample_input() -> CredentialInput {
        CredentialInput::new(
            "github-token",
            CredentialType::ApiKey,
            CredentialData::new().with("api_key", "sk-12345"),
        )
        .with_integration_id("github")
        .allow_user("user-1")
        .allow_role("supervisor")
    }

    #[tokio::test]
    async fn test_create_then_retrieve() {
        let (vault, store, _) = vault();
        let ctx = context("user-1", "analyst");

        let created = vault.create(sample_input(), &ctx).await.unwrap();
        assert_eq!(created.status, CredentialStatus::Active);
        assert_eq!(created.created_by, "user-1");
        assert_eq!(store.len(), 1);

        let decrypted = vault.retrieve(&created.id, &ctx).await.unwrap();
        assert_eq!(decrypted.name, "github-token");
        assert_eq!(
            decrypted.data.get("api_key").and_then(|v| v.as_str()),
            Some("sk-12345")
        );

        // Access stamps are persisted.
        let stored = store.get(&created.id).await.unwrap();
        assert_eq!(stored.last_accessed_by.as_deref(), Some("user-1"));
        assert!(stored.last_accessed_at.is_some());
    }

    #[tokio::test]
    async fn test_create_rejects_empty_name() {
        let (vault, _, _) = vault();
        let ctx = context("user-1", "analyst");
        let input = CredentialInput::new(
            "",
            CredentialType::Generic,
            CredentialData::new().with("k", "v"),
        );

        assert!(matches!(
            vault.create(input, &ctx).await,
            Err(Error::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_create_rejects_empty_data() {
        let (vault, _, _) = vault();
        let ctx = context("user-1", "analyst");
        let input = CredentialInput::new("x", CredentialType::Generic, CredentialData::new());

        assert!(matches!(
            vault.create(input, &ctx).await,
            Err(Error::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_retrieve_by_role() {
        let (vault, _, _) = vault();
        let created = vault
            .create(sample_input(), &context("user-1", "analyst"))
            .await
            .unwrap();

        let decrypted = vault
            .retrieve(&created.id, &context("user-7", "supervisor"))
            .await
            .unwrap();
        assert_eq!(decrypted.id, created.id);
    }

    #[tokio::test]
    async fn test_retrieve_denied_is_audited() {
        let (vault, _, _) = vault();
        let created = vault
            .create(sample_input(), &context("user-1", "analyst"))
            .await
            .unwrap();

        let stranger = context("user-9", "analyst");
        let result = vault.retrieve(&created.id, &stranger).await;
        assert!(matches!(result, Err(Error::AccessDenied(_))));

        vault.audit().flush().await;
        let denied = vault
            .audit()
            .get_access_denied_events(None, None)
            .await
            .unwrap();
        assert_eq!(denied.len(), 1);
        assert_eq!(denied[0].user_id, "user-9");
        assert_eq!(denied[0].reason.as_deref(), Some("user not in allow list"));
        assert!(!denied[0].success);
    }

    #[tokio::test]
    async fn test_retrieve_unknown_id_is_not_found() {
        let (vault, _, _) = vault();
        let ghost = CredentialId::new("cred-ghost").unwrap();

        assert!(matches!(
            vault.retrieve(&ghost, &context("user-1", "analyst")).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_data_re_encrypts() {
        let (vault, _, _) = vault();
        let ctx = context("user-1", "analyst");
        let created = vault.create(sample_input(), &ctx).await.unwrap();
        let original_envelope = created.encrypted_data.clone();

        let updated = vault
            .update(
                &created.id,
                CredentialUpdate::new().with_data(CredentialData::new().with("api_key", "sk-rotated")),
                &ctx,
            )
            .await
            .unwrap();

        assert_ne!(updated.encrypted_data.ciphertext, original_envelope.ciphertext);
        assert_ne!(updated.encrypted_data.iv, original_envelope.iv);

        let decrypted = vault.retrieve(&created.id, &ctx).await.unwrap();
        assert_eq!(
            decrypted.data.get("api_key").and_then(|v| v.as_str()),
            Some("sk-rotated")
        );
    }

    #[tokio::test]
    async fn test_update_without_data_keeps_envelope() {
        let (vault, _, _) = vault();
        let ctx = context("user-1", "analyst");
        let created = vault.create(sample_input(), &ctx).await.unwrap();

        let updated = vault
            .update(
                &created.id,
                CredentialUpdate::new().with_name("renamed-token"),
                &ctx,
            )
            .await
            .unwrap();

        assert_eq!(updated.name, "renamed-token");
        assert_eq!(updated.encrypted_data, created.encrypted_data);
    }

    #[tokio::test]
    async fn test_rotate_re_encrypts_and_counts() {
        let (vault, _, _) = vault();
        let ctx = context("user-1", "analyst");
        let created = vault.create(sample_input(), &ctx).await.unwrap();

        let rotated = vault.rotate(&created.id, &ctx).await.unwrap();

        assert_eq!(rotated.status, CredentialStatus::Active);
        assert_eq!(rotated.rotation_count, 1);
        assert!(rotated.last_rotated.is_some());
        assert_ne!(rotated.encrypted_data.iv, created.encrypted_data.iv);

        let decrypted = vault.retrieve(&created.id, &ctx).await.unwrap();
        assert_eq!(
            decrypted.data.get("api_key").and_then(|v| v.as_str()),
            Some("sk-12345")
        );
    }

    #[tokio::test]
    async fn test_rotate_conflict() {
        let (vault, store, _) = vault();
        let ctx = context("user-1", "analyst");
        let input = sample_input().allow_role(ADMIN_ROLE);
        let created = vault.create(input, &ctx).await.unwrap();

        // Simulate a rotation that crashed mid-flight.
        let mut stuck = store.get(&created.id).await.unwrap();
        stuck.status = CredentialStatus::Rotating;
        store.put(stuck).await.unwrap();

        let admin = context("admin-1", ADMIN_ROLE);
        let result = vault.rotate(&created.id, &admin).await;
        assert!(matches!(result, Err(Error::RotationInProgress(_))));
    }

    #[tokio::test]
    async fn test_revoke_then_retrieve_denied() {
        let (vault, _, _) = vault();
        let ctx = context("user-1", "analyst");
        let created = vault.create(sample_input(), &ctx).await.unwrap();

        let revoked = vault
            .revoke(&created.id, "integration offboarded", &ctx)
            .await
            .unwrap();
        assert_eq!(revoked.status, CredentialStatus::Revoked);

        let result = vault.retrieve(&created.id, &ctx).await;
        assert!(matches!(result, Err(Error::AccessDenied(_))));

        vault.audit().flush().await;
        let denied = vault
            .audit()
            .get_access_denied_events(None, None)
            .await
            .unwrap();
        assert_eq!(denied[0].reason.as_deref(), Some("credential revoked"));
    }

    #[tokio::test]
    async fn test_admin_rotate_repairs_revoked() {
        let (vault, _, _) = vault();
        let ctx = context("user-1", "analyst");
        let input = sample_input().allow_role(ADMIN_ROLE);
        let created = vault.create(input, &ctx).await.unwrap();

        vault
            .revoke(&created.id, "suspected leak", &ctx)
            .await
            .unwrap();

        let admin = context("admin-1", ADMIN_ROLE);
        let repaired = vault.rotate(&created.id, &admin).await.unwrap();

        assert_eq!(repaired.status, CredentialStatus::Active);
        assert_eq!(repaired.rotation_count, 1);
    }

    #[tokio::test]
    async fn test_expired_credential_denied() {
        let (vault, _, _) = vault();
        let ctx = context("user-1", "analyst");
        let input = sample_input().with_expires_at(Utc::now() - Duration::hours(1));
        let created = vault.create(input, &ctx).await.unwrap();

        let result = vault.retrieve(&created.id, &ctx).await;
        assert!(matches!(result, Err(Error::AccessDenied(_))));

        vault.audit().flush().await;
        let denied = vault
            .audit()
            .get_access_denied_events(None, None)
            .await
            .unwrap();
        assert_eq!(denied[0].reason.as_deref(), Some("credential expired"));
    }

    #[tokio::test]
    async fn test_every_operation_audited_once() {
        let (vault, _, sink) = vault();
        let ctx = context("user-1", "analyst");

        let created = vault.create(sample_input(), &ctx).await.unwrap();
        vault.retrieve(&created.id, &ctx).await.unwrap();
        vault
            .update(
                &created.id,
                CredentialUpdate::new().with_name("renamed"),
                &ctx,
            )
            .await
            .unwrap();
        vault.rotate(&created.id, &ctx).await.unwrap();
        vault.revoke(&created.id, "done", &ctx).await.unwrap();

        vault.audit().flush().await;
        assert_eq!(sink.len(), 5);

        for action in [
            AuditAction::Create,
            AuditAction::Retrieve,
            AuditAction::Update,
            AuditAction::Rotate,
            AuditAction::Revoke,
        ] {
            let entries = vault
                .list_audit_logs(&AuditFilter::new().with_action(action))
                .await
                .unwrap();
            assert_eq!(entries.len(), 1, "expected one {} entry", action);
            assert_eq!(entries[0].user_id, "user-1");
            assert!(entries[0].success);
            assert_eq!(entries[0].credential_id, created.id);
        }
    }
}
