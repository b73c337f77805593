//! In-memory credential store for testing and development.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::RwLock;

use crate::credential::VaultCredential;
use crate::store::{CredentialPage, CredentialStore};
use credvault_common::{CredentialId, Error, Result};

/// In-memory credential store.
///
/// Records are held in an ordered map so scan cursors are stable. All data
/// is lost on drop.
pub struct MemoryCredentialStore {
    records: RwLock<BTreeMap<CredentialId, VaultCredential>>,
}

impl MemoryCredentialStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            records: RwLock::new(BTreeMap::new()),
        }
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.read().unwrap().len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.records.read().unwrap().is_empty()
    }
}

impl Default for MemoryCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self, id: &CredentialId) -> Result<VaultCredential> {
        self.records
            .read()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Credential not found: {}", id)))
    }

    async fn put(&self, credential: VaultCredential) -> Result<()> {
        self.records
            .write()
            .unwrap()
            .insert(credential.id.clone(), credential);
        Ok(())
    }

    async fn delete(&self, id: &CredentialId) -> Result<()> {
        self.records
            .write()
            .unwrap()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(format!("Credential not found: {}", id)))
    }

    async fn list_page(
        &self,
        cursor: Option<&CredentialId>,
        limit: usize,
    ) -> Result<CredentialPage> {
        let records = self.records.read().unwrap();

        let range = match cursor {
            Some(after) => records.range((Bound::Excluded(after.clone()), Bound::Unbounded)),
            None => records.range::<CredentialId, _>(..),
        };

        let page: Vec<VaultCredential> = range.map(|(_, v)| v.clone()).take(limit).collect();

        // A full page may have more behind it; a short page is the end.
        let next_cursor = if page.len() == limit {
            page.last().map(|c| c.id.clone())
        } else {
            None
        };

        Ok(CredentialPage {
            records: page,
            next_cursor,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::{CredentialStatus, CredentialType};
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use chrono::Utc;
    use credvault_crypto::{EncryptedEnvelope, KeyId};

    fn credential(id: &str) -> VaultCredential {
        let now = Utc::now();
        VaultCredential {
            id: CredentialId::new(id).unwrap(),
            name: format!("{}-name", id),
            kind: CredentialType::Generic,
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
            allowed_roles: Vec::new(),
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

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let store = MemoryCredentialStore::new();
        let credential = credential("cred-a");

        store.put(credential.clone()).await.unwrap();
        let fetched = store.get(&credential.id).await.unwrap();

        assert_eq!(fetched.id, credential.id);
        assert_eq!(fetched.name, credential.name);
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let store = MemoryCredentialStore::new();
        let id = CredentialId::new("cred-missing").unwrap();

        assert!(matches!(
            store.get(&id).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_put_replaces() {
        let store = MemoryCredentialStore::new();
        let mut credential = credential("cred-a");

        store.put(credential.clone()).await.unwrap();
        credential.name = "renamed".to_string();
        store.put(credential.clone()).await.unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&credential.id).await.unwrap().name, "renamed");
    }

    #[tokio::test]
    async fn test_delete() {
        let store = MemoryCredentialStore::new();
        let credential = credential("cred-a");

        store.put(credential.clone()).await.unwrap();
        store.delete(&credential.id).await.unwrap();

        assert!(store.is_empty());
        assert!(store.delete(&credential.id).await.is_err());
    }

    #[tokio::test]
    async fn test_pagination() {
        let store = MemoryCredentialStore::new();
        for i in 0..5 {
            store.put(credential(&format!("cred-{}", i))).await.unwrap();
        }

        let page1 = store.list_page(None, 2).await.unwrap();
        assert_eq!(page1.records.len(), 2);
        let cursor1 = page1.next_cursor.clone().unwrap();

        let page2 = store.list_page(Some(&cursor1), 2).await.unwrap();
        assert_eq!(page2.records.len(), 2);
        let cursor2 = page2.next_cursor.clone().unwrap();

        let page3 = store.list_page(Some(&cursor2), 2).await.unwrap();
        assert_eq!(page3.records.len(), 1);
        assert!(page3.next_cursor.is_none());

        let mut seen: Vec<String> = page1
            .records
            .iter()
            .chain(&page2.records)
            .chain(&page3.records)
            .map(|c| c.id.to_string())
            .collect();
        seen.dedup();
        assert_eq!(seen.len(), 5);
    }

    #[tokio::test]
    async fn test_pagination_empty_store() {
        let store = MemoryCredentialStore::new();
        let page = store.list_page(None, 10).await.unwrap();

        assert!(page.records.is_empty());
        assert!(page.next_cursor.is_none());
    }
}
