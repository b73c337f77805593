//! Credential vault facade.
//!
//! This module provides:
//! - Access-control decisions over credential allow-lists
//! - The `Vault` facade orchestrating authorization, cryptography, storage,
//!   and audit for every public operation
//! - The resumable re-encryption sweep that migrates envelopes off retiring
//!   keys
//!
//! # Architecture
//! The facade is the only component exposed to external collaborators. Each
//! operation evaluates permission, performs the store and crypto work, and
//! records the outcome in the audit log unconditionally.

pub mod access;
pub mod config;
pub mod facade;
pub mod input;
pub mod sweep;

pub use access::{AccessControlService, Decision, DenyReason, VaultAction, ADMIN_ROLE};
pub use config::VaultConfig;
pub use facade::Vault;
pub use input::{CredentialInput, CredentialUpdate, DecryptedCredential};
pub use sweep::{ReEncryptionSweep, SweepBatch, SweepReport};
