//! Credential record model and store abstraction.
//!
//! This module provides the persisted `VaultCredential` record, a trait-based
//! interface to the platform's transactional record store, and an in-memory
//! store for tests and development.
//!
//! # Design Principles
//! - The vault assumes atomicity of a single credential's read-modify-write
//!   and nothing more; multi-record transactions are not offered
//! - Records are never hard-deleted by vault operations: revocation is a
//!   status transition, preserving audit continuity
//! - Scans are paginated with stable cursors so batch sweeps can resume

pub mod credential;
pub mod memory;
pub mod store;

pub use credential::{CredentialData, CredentialStatus, CredentialType, VaultCredential};
pub use memory::MemoryCredentialStore;
pub use store::{CredentialPage, CredentialStore};
