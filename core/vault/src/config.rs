//! Vault configuration.

use credvault_crypto::KdfParams;

/// Tunables for a vault instance.
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// Cost parameters for deriving keys from the master secret.
    pub kdf: KdfParams,
    /// Entries held in the audit logger's in-memory cache.
    pub audit_cache_capacity: usize,
    /// Credentials fetched per batch during a re-encryption sweep.
    pub sweep_batch_size: usize,
}

impl VaultConfig {
    /// Set KDF parameters.
    pub fn with_kdf(mut self, kdf: KdfParams) -> Self {
        self.kdf = kdf;
        self
    }

    /// Set the audit cache capacity.
    pub fn with_audit_cache_capacity(mut self, capacity: usize) -> Self {
        self.audit_cache_capacity = capacity;
        self
    }

    /// Set the sweep batch size.
    pub fn with_sweep_batch_size(mut self, batch_size: usize) -> Self {
        self.sweep_batch_size = batch_size;
        self
    }
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            kdf: KdfParams::default(),
            audit_cache_capacity: 1000,
            sweep_batch_size: 100,
        }
    }
}
