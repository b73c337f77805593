//! Batch re-encryption sweep for retiring superseded keys.
//!
//! After a master-key rotation, persisted envelopes still reference the old
//! key. The sweep pages over the credential store, re-encrypts each such
//! envelope under the current key, and retires the old key only once a
//! verification scan finds zero remaining references. Each envelope is
//! written back individually, so cancelling between batches leaves every
//! record fully decryptable, and re-running the sweep skips records that
//! already migrated.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use credvault_common::{CredentialId, Result};
use credvault_crypto::{EncryptionService, KeyId};
use credvault_storage::CredentialStore;

/// Progress of one sweep batch.
#[derive(Debug, Clone)]
pub struct SweepBatch {
    /// Records examined in this batch.
    pub examined: usize,
    /// Records whose envelope was migrated.
    pub migrated: usize,
    /// Cursor to resume from; `None` when the scan reached the end.
    pub next_cursor: Option<CredentialId>,
}

/// Summary of a completed sweep.
#[derive(Debug, Clone)]
pub struct SweepReport {
    pub examined: usize,
    pub migrated: usize,
    /// Whether the superseded key's material was discarded.
    pub key_retired: bool,
}

/// Resumable migration of envelopes off a retiring key.
pub struct ReEncryptionSweep {
    encryption: Arc<EncryptionService>,
    store: Arc<dyn CredentialStore>,
    batch_size: usize,
}

impl ReEncryptionSweep {
    /// Create a sweep over a store.
    pub fn new(
        encryption: Arc<EncryptionService>,
        store: Arc<dyn CredentialStore>,
        batch_size: usize,
    ) -> Self {
        Self {
            encryption,
            store,
            batch_size: batch_size.max(1),
        }
    }

    /// Migrate one page of records.
    ///
    /// # Postconditions
    /// - Every migrated record was written back individually and is
    ///   decryptable under the current key
    /// - Records not referencing `old_key` are left untouched
    ///
    /// # Errors
    /// - Storage failure
    /// - Decryption failure on a record still under `old_key`
    pub async fn run_batch(
        &self,
        old_key: &KeyId,
        cursor: Option<&CredentialId>,
    ) -> Result<SweepBatch> {
        let page = self.store.list_page(cursor, self.batch_size).await?;
        let examined = page.records.len();
        let mut migrated = 0;

        for mut credential in page.records {
            if credential.encrypted_data.key_id != *old_key {
                continue;
            }

            credential.encrypted_data = self.encryption.re_encrypt(&credential.encrypted_data)?;
            credential.updated_at = Utc::now();
            self.store.put(credential).await?;
            migrated += 1;
        }

        debug!(key = %old_key, examined, migrated, "Sweep batch complete");
        Ok(SweepBatch {
            examined,
            migrated,
            next_cursor: page.next_cursor,
        })
    }

    /// Run batches to completion, then retire the key.
    ///
    /// The key is retired only after a verification scan confirms that no
    /// envelope references it; if references remain (for example a record
    /// written under the old key while the sweep was running), the key stays
    /// resident and the sweep can be re-run.
    pub async fn run_to_completion(&self, old_key: &KeyId) -> Result<SweepReport> {
        let mut examined = 0;
        let mut migrated = 0;
        let mut cursor: Option<CredentialId> = None;

        loop {
            let batch = self.run_batch(old_key, cursor.as_ref()).await?;
            examined += batch.examined;
            migrated += batch.migrated;

            match batch.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        let remaining = self.count_references(old_key).await?;
        let key_retired = if remaining == 0 {
            self.encryption.retire_key(old_key)?;
            true
        } else {
            false
        };

        info!(
            key = %old_key,
            examined,
            migrated,
            key_retired,
            "Re-encryption sweep finished"
        );
        Ok(SweepReport {
            examined,
            migrated,
            key_retired,
        })
    }

    /// Count envelopes still referencing `key`.
    pub async fn count_references(&self, key: &KeyId) -> Result<usize> {
        let mut count = 0;
        let mut cursor: Option<CredentialId> = None;

        loop {
            let page = self.store.list_page(cursor.as_ref(), self.batch_size).await?;
            count += page
                .records
                .iter()
                .filter(|c| c.encrypted_data.key_id == *key)
                .count();

            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VaultConfig;
    use crate::facade::Vault;
    use crate::input::CredentialInput;
    use credvault_audit::MemoryAuditSink;
    use credvault_common::AccessControlContext;
    use credvault_crypto::{KdfParams, KeyState};
    use credvault_storage::{CredentialData, CredentialType, MemoryCredentialStore};

    async fn vault_with_credentials(count: usize) -> (Vault, Arc<MemoryCredentialStore>) {
        let store = Arc::new(MemoryCredentialStore::new());
        let sink = Arc::new(MemoryAuditSink::new());
        let config = VaultConfig::default().with_kdf(KdfParams::moderate());
        let vault = Vault::open("test-key", &config, store.clone(), sink).unwrap();

        let ctx = AccessControlContext::new("user-1", "analyst");
        for i in 0..count {
            let input = CredentialInput::new(
                format!("credential-{}", i),
                CredentialType::Generic,
                CredentialData::new().with("token", format!("value-{}", i)),
            )
            .allow_user("user-1");
            vault.create(input, &ctx).await.unwrap();
        }

        (vault, store)
    }

    #[tokio::test]
    async fn test_sweep_migrates_and_retires() {
        let (vault, store) = vault_with_credentials(5).await;
        let encryption = vault.encryption().clone();

        let old_key = encryption.current_key_id();
        let new_key = encryption.rotate_key("new-master-key").unwrap();

        let sweep = ReEncryptionSweep::new(encryption.clone(), store.clone(), 2);
        let report = sweep.run_to_completion(&old_key).await.unwrap();

        assert_eq!(report.migrated, 5);
        assert!(report.key_retired);
        assert_eq!(encryption.key_state(&old_key), Some(KeyState::Retired));

        // Every envelope now references the new key and still decrypts.
        let ctx = AccessControlContext::new("user-1", "analyst");
        let page = store.list_page(None, 10).await.unwrap();
        assert_eq!(page.records.len(), 5);
        for credential in page.records {
            assert_eq!(credential.encrypted_data.key_id, new_key);
            let decrypted = vault.retrieve(&credential.id, &ctx).await.unwrap();
            assert!(decrypted.data.get("token").is_some());
        }
    }

    #[tokio::test]
    async fn test_sweep_is_idempotent() {
        let (vault, store) = vault_with_credentials(3).await;
        let encryption = vault.encryption().clone();

        let old_key = encryption.current_key_id();
        encryption.rotate_key("new-master-key").unwrap();

        let sweep = ReEncryptionSweep::new(encryption.clone(), store.clone(), 10);
        let first = sweep.run_to_completion(&old_key).await.unwrap();
        assert_eq!(first.migrated, 3);

        // A second pass finds nothing left to do.
        let second = sweep.run_to_completion(&old_key).await.unwrap();
        assert_eq!(second.migrated, 0);
        assert!(second.key_retired);
    }

    #[tokio::test]
    async fn test_sweep_resumes_from_cursor() {
        let (vault, store) = vault_with_credentials(5).await;
        let encryption = vault.encryption().clone();

        let old_key = encryption.current_key_id();
        encryption.rotate_key("new-master-key").unwrap();

        let sweep = ReEncryptionSweep::new(encryption.clone(), store.clone(), 2);

        // First batch, then resume from its cursor as a fresh sweep would.
        let batch1 = sweep.run_batch(&old_key, None).await.unwrap();
        assert_eq!(batch1.migrated, 2);
        let cursor = batch1.next_cursor.clone().unwrap();

        let batch2 = sweep.run_batch(&old_key, Some(&cursor)).await.unwrap();
        assert_eq!(batch2.migrated, 2);

        // The interrupted state is fully valid: nothing is half-written.
        assert_eq!(sweep.count_references(&old_key).await.unwrap(), 1);

        let report = sweep.run_to_completion(&old_key).await.unwrap();
        assert_eq!(report.migrated, 1);
        assert!(report.key_retired);
    }

    #[tokio::test]
    async fn test_sweep_skips_unrelated_keys() {
        let (vault, store) = vault_with_credentials(2).await;
        let encryption = vault.encryption().clone();

        let k1 = encryption.current_key_id();
        encryption.rotate_key("second-master").unwrap();

        // New credential under the second key.
        let ctx = AccessControlContext::new("user-1", "analyst");
        vault
            .create(
                CredentialInput::new(
                    "late-arrival",
                    CredentialType::Generic,
                    CredentialData::new().with("token", "late"),
                )
                .allow_user("user-1"),
                &ctx,
            )
            .await
            .unwrap();

        let sweep = ReEncryptionSweep::new(encryption.clone(), store.clone(), 10);
        let report = sweep.run_to_completion(&k1).await.unwrap();

        // Only the two originals referenced the first key.
        assert_eq!(report.examined, 3);
        assert_eq!(report.migrated, 2);
        assert!(report.key_retired);
    }
}
