//! Durable audit sink abstraction.

use async_trait::async_trait;
use std::sync::RwLock;

use crate::entry::{AuditFilter, AuditLogEntry, DEFAULT_QUERY_LIMIT};
use credvault_common::Result;

/// Append-only destination for audit entries.
///
/// Implementations must preserve every appended entry; eviction or
/// truncation is never a sink's decision.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Append one entry to the durable log.
    async fn append(&self, entry: &AuditLogEntry) -> Result<()>;

    /// Return matching entries, newest first, paginated per the filter.
    async fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditLogEntry>>;
}

/// In-memory sink for tests and development.
pub struct MemoryAuditSink {
    entries: RwLock<Vec<AuditLogEntry>>,
}

impl MemoryAuditSink {
    /// Create a new empty sink.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Total number of appended entries.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    /// Check if the sink is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().unwrap().is_empty()
    }
}

impl Default for MemoryAuditSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn append(&self, entry: &AuditLogEntry) -> Result<()> {
        self.entries.write().unwrap().push(entry.clone());
        Ok(())
    }

    async fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditLogEntry>> {
        let entries = self.entries.read().unwrap();

        // Reverse insertion order first so the stable sort keeps ties
        // newest-first.
        let mut matched: Vec<AuditLogEntry> = entries
            .iter()
            .rev()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        let offset = filter.offset.unwrap_or(0);
        let limit = filter.limit.unwrap_or(DEFAULT_QUERY_LIMIT);

        Ok(matched.into_iter().skip(offset).take(limit).collect())
    }
}
