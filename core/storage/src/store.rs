//! Credential store trait definition.

use async_trait::async_trait;

use crate::credential::VaultCredential;
use credvault_common::{CredentialId, Result};

/// One page of a credential scan.
#[derive(Debug, Clone)]
pub struct CredentialPage {
    /// Records in stable id order.
    pub records: Vec<VaultCredential>,
    /// Cursor for the next `list_page` call; `None` when the scan is done.
    pub next_cursor: Option<CredentialId>,
}

/// Transactional record store holding credential records.
///
/// Implemented by the platform's durable store. The vault assumes atomicity
/// of a single credential's read-modify-write but does not itself provide
/// multi-record transactions.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Fetch a credential by id.
    ///
    /// # Errors
    /// - Not found
    /// - Storage failure
    async fn get(&self, id: &CredentialId) -> Result<VaultCredential>;

    /// Create or replace a credential record.
    ///
    /// # Postconditions
    /// - The record is durably stored under its id
    async fn put(&self, credential: VaultCredential) -> Result<()>;

    /// Remove a record outright.
    ///
    /// Administrative purges only; vault operations revoke instead of
    /// deleting so audit continuity is preserved.
    ///
    /// # Errors
    /// - Not found
    async fn delete(&self, id: &CredentialId) -> Result<()>;

    /// Scan records in stable id order, starting after `cursor`.
    ///
    /// Used by batch sweeps over potentially large credential sets.
    async fn list_page(
        &self,
        cursor: Option<&CredentialId>,
        limit: usize,
    ) -> Result<CredentialPage>;
}
