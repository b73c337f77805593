//! Audit trail for the credential vault.
//!
//! This module provides:
//! - An append-only audit entry model with filtered queries
//! - A durable sink abstraction with in-memory and SQLite implementations
//! - A logger that decouples appends from the cryptographic hot path, so a
//!   slow or failing audit sink never delays or fails a vault operation
//! - Aggregate reporting for compliance review
//!
//! # Design Principles
//! - Entries are immutable once written; queries return newest first
//! - The logger's in-memory buffer is a write-through cache in front of the
//!   durable log, never the log itself

pub mod entry;
pub mod logger;
pub mod sink;
pub mod sqlite;

pub use entry::{
    AuditAction, AuditFilter, AuditLogEntry, AuditMetadata, DEFAULT_QUERY_LIMIT,
};
pub use logger::{AuditDetail, AuditLogger, AuditReport};
pub use sink::{AuditSink, MemoryAuditSink};
pub use sqlite::SqliteAuditSink;
