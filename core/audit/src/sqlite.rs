//! SQLite-backed audit sink.
//!
//! The durable append-only log behind the logger's in-memory cache, indexed
//! for the two dominant query shapes: by credential and by user.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Connection;
use std::path::Path;
use std::sync::Mutex;

use crate::entry::{AuditAction, AuditFilter, AuditLogEntry, AuditMetadata, DEFAULT_QUERY_LIMIT};
use crate::sink::AuditSink;
use credvault_common::{CredentialId, Error, Result};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS audit_log (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    credential_id   TEXT NOT NULL,
    user_id         TEXT NOT NULL,
    action          TEXT NOT NULL,
    success         INTEGER NOT NULL,
    ip_address      TEXT,
    user_agent      TEXT,
    reason          TEXT,
    credential_name TEXT,
    integration_id  TEXT,
    metadata        TEXT NOT NULL,
    timestamp       TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_audit_credential ON audit_log (credential_id, timestamp);
CREATE INDEX IF NOT EXISTS idx_audit_user ON audit_log (user_id, timestamp);
";

/// SQLite-backed audit sink.
pub struct SqliteAuditSink {
    conn: Mutex<Connection>,
}

impl SqliteAuditSink {
    /// Open (or create) the audit database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .map_err(|e| Error::Audit(format!("open audit database: {}", e)))?;
        Self::with_connection(conn)
    }

    /// Open a transient in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Audit(format!("open audit database: {}", e)))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| Error::Audit(format!("initialize audit schema: {}", e)))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

// Fixed-width timestamps so lexicographic order in SQL matches
// chronological order.
fn encode_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Audit(format!("parse stored timestamp: {}", e)))
}

#[async_trait]
impl AuditSink for SqliteAuditSink {
    async fn append(&self, entry: &AuditLogEntry) -> Result<()> {
        let metadata = serde_json::to_string(&entry.metadata)
            .map_err(|e| Error::Serialization(e.to_string()))?;

        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO audit_log (credential_id, user_id, action, success, ip_address,
                                    user_agent, reason, credential_name, integration_id,
                                    metadata, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            rusqlite::params![
                entry.credential_id.as_str(),
                entry.user_id,
                entry.action.as_str(),
                entry.success as i64,
                entry.ip_address,
                entry.user_agent,
                entry.reason,
                entry.credential_name,
                entry.integration_id,
                metadata,
                encode_timestamp(entry.timestamp),
            ],
        )
        .map_err(|e| Error::Audit(format!("append audit entry: {}", e)))?;

        Ok(())
    }

    async fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditLogEntry>> {
        let mut clauses: Vec<&str> = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(ref id) = filter.credential_id {
            clauses.push("credential_id = ?");
            params.push(Box::new(id.as_str().to_string()));
        }
        if let Some(ref user_id) = filter.user_id {
            clauses.push("user_id = ?");
            params.push(Box::new(user_id.clone()));
        }
        if let Some(action) = filter.action {
            clauses.push("action = ?");
            params.push(Box::new(action.as_str()));
        }
        if let Some(success) = filter.success {
            clauses.push("success = ?");
            params.push(Box::new(success as i64));
        }
        if let Some(start) = filter.start_date {
            clauses.push("timestamp >= ?");
            params.push(Box::new(encode_timestamp(start)));
        }
        if let Some(end) = filter.end_date {
            clauses.push("timestamp <= ?");
            params.push(Box::new(encode_timestamp(end)));
        }

        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };

        let limit = filter.limit.unwrap_or(DEFAULT_QUERY_LIMIT);
        let offset = filter.offset.unwrap_or(0);
        params.push(Box::new(i64::try_from(limit).unwrap_or(i64::MAX)));
        params.push(Box::new(i64::try_from(offset).unwrap_or(i64::MAX)));

        let sql = format!(
            "SELECT credential_id, user_id, action, success, ip_address, user_agent,
                    reason, credential_name, integration_id, metadata, timestamp
             FROM audit_log{}
             ORDER BY timestamp DESC, id DESC
             LIMIT ? OFFSET ?",
            where_sql
        );

        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| Error::Audit(format!("prepare audit query: {}", e)))?;

        let params_refs: Vec<&dyn rusqlite::types::ToSql> =
            params.iter().map(|p| &**p).collect();

        let rows = stmt
            .query_map(params_refs.as_slice(), |row| {
                let credential_id: String = row.get(0)?;
                let action: String = row.get(2)?;
                let success: i64 = row.get(3)?;
                let metadata: String = row.get(9)?;
                let timestamp: String = row.get(10)?;

                Ok((
                    credential_id,
                    row.get::<_, String>(1)?,
                    action,
                    success != 0,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, Option<String>>(6)?,
                    row.get::<_, Option<String>>(7)?,
                    row.get::<_, Option<String>>(8)?,
                    metadata,
                    timestamp,
                ))
            })
            .map_err(|e| Error::Audit(format!("run audit query: {}", e)))?;

        let mut entries = Vec::new();
        for row in rows {
            let (
                credential_id,
                user_id,
                action,
                success,
                ip_address,
                user_agent,
                reason,
                credential_name,
                integration_id,
                metadata,
                timestamp,
            ) = row.map_err(|e| Error::Audit(format!("read audit row: {}", e)))?;

            entries.push(AuditLogEntry {
                credential_id: CredentialId::new(credential_id)?,
                user_id,
                action: AuditAction::parse(&action)
                    .ok_or_else(|| Error::Audit(format!("unknown stored action: {}", action)))?,
                success,
                ip_address,
                user_agent,
                reason,
                timestamp: decode_timestamp(&timestamp)?,
                credential_name,
                integration_id,
                metadata: serde_json::from_str::<AuditMetadata>(&metadata)
                    .map_err(|e| Error::Serialization(e.to_string()))?,
            });
        }

        Ok(entries)
    }
}
