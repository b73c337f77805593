//! Audit logger: a non-blocking append pipeline over a durable sink.
//!
//! `log` hands the entry to a background worker over a channel and returns
//! immediately, so the cryptographic hot path never waits on the sink. A
//! failed append is reported to operational monitoring and dropped; it must
//! not fail the vault operation it accompanies.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

use crate::entry::{AuditAction, AuditFilter, AuditLogEntry, AuditMetadata};
use crate::sink::AuditSink;
use credvault_common::{AccessControlContext, CredentialId, Result};

enum Command {
    Append(AuditLogEntry),
    Flush(oneshot::Sender<()>),
}

/// Optional fields accompanying one audit entry.
#[derive(Debug, Clone, Default)]
pub struct AuditDetail {
    pub credential_name: Option<String>,
    pub integration_id: Option<String>,
    pub reason: Option<String>,
    pub metadata: AuditMetadata,
}

impl AuditDetail {
    /// Create an empty detail bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the credential's display name.
    pub fn with_credential_name(mut self, name: impl Into<String>) -> Self {
        self.credential_name = Some(name.into());
        self
    }

    /// Attach the integration the credential belongs to.
    pub fn with_integration_id(mut self, integration_id: impl Into<String>) -> Self {
        self.integration_id = Some(integration_id.into());
        self
    }

    /// Attach a reason (denial or failure cause).
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attach one metadata field.
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Aggregate view over a time window of the audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    pub total_operations: u64,
    pub by_action: HashMap<String, u64>,
    pub by_user: HashMap<String, u64>,
    /// Percentage of successful operations; 100 for an empty window.
    pub success_rate: f64,
    pub access_denied_count: u64,
    pub unique_credentials_accessed: u64,
    pub unique_users: u64,
}

/// Records every vault operation and answers filtered and aggregate queries.
pub struct AuditLogger {
    sink: Arc<dyn AuditSink>,
    tx: mpsc::UnboundedSender<Command>,
    recent: Arc<RwLock<VecDeque<AuditLogEntry>>>,
}

impl AuditLogger {
    /// Entries held in the in-memory cache by default.
    pub const DEFAULT_CACHE_CAPACITY: usize = 1000;

    /// Create a logger over a durable sink.
    ///
    /// Must be called within a Tokio runtime; the append worker is spawned
    /// immediately.
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self::with_cache_capacity(sink, Self::DEFAULT_CACHE_CAPACITY)
    }

    /// Create a logger with an explicit cache capacity.
    pub fn with_cache_capacity(sink: Arc<dyn AuditSink>, cache_capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Command>();
        let recent = Arc::new(RwLock::new(VecDeque::with_capacity(cache_capacity)));

        let worker_sink = sink.clone();
        let worker_recent = recent.clone();
        tokio::spawn(async move {
            while let Some(command) = rx.recv().await {
                match command {
                    Command::Append(entry) => {
                        match worker_sink.append(&entry).await {
                            Ok(()) => {
                                // Cache only after the durable append succeeds;
                                // evict oldest-first.
                                let mut cache = worker_recent.write().unwrap();
                                while cache.len() >= cache_capacity.max(1) {
                                    cache.pop_front();
                                }
                                cache.push_back(entry);
                            }
                            Err(e) => {
                                error!(error = %e, "Audit sink append failed; entry dropped");
                            }
                        }
                    }
                    Command::Flush(ack) => {
                        let _ = ack.send(());
                    }
                }
            }
        });

        Self { sink, tx, recent }
    }

    /// Record one vault operation.
    ///
    /// Non-blocking and infallible from the caller's perspective. The entry's
    /// metadata always carries the requester's session id and role in
    /// addition to caller-supplied fields.
    pub fn log(
        &self,
        context: &AccessControlContext,
        action: AuditAction,
        credential_id: &CredentialId,
        success: bool,
        detail: AuditDetail,
    ) {
        let mut metadata = detail.metadata;
        metadata.insert(
            "sessionId".to_string(),
            context
                .session_id
                .clone()
                .map(Value::String)
                .unwrap_or(Value::Null),
        );
        metadata.insert(
            "userRole".to_string(),
            Value::String(context.user_role.clone()),
        );

        let entry = AuditLogEntry {
            credential_id: credential_id.clone(),
            user_id: context.user_id.clone(),
            action,
            success,
            ip_address: context.ip_address.clone(),
            user_agent: context.user_agent.clone(),
            reason: detail.reason,
            timestamp: Utc::now(),
            credential_name: detail.credential_name,
            integration_id: detail.integration_id,
            metadata,
        };

        debug!(action = %action, credential = %credential_id, success, "Audit entry queued");

        if self.tx.send(Command::Append(entry)).is_err() {
            error!("Audit worker is gone; entry dropped");
        }
    }

    /// Record a successful retrieval.
    pub fn log_retrieve(
        &self,
        context: &AccessControlContext,
        credential_id: &CredentialId,
        detail: AuditDetail,
    ) {
        self.log(context, AuditAction::Retrieve, credential_id, true, detail);
    }

    /// Record a successful creation.
    pub fn log_create(
        &self,
        context: &AccessControlContext,
        credential_id: &CredentialId,
        detail: AuditDetail,
    ) {
        self.log(context, AuditAction::Create, credential_id, true, detail);
    }

    /// Record a successful update.
    pub fn log_update(
        &self,
        context: &AccessControlContext,
        credential_id: &CredentialId,
        detail: AuditDetail,
    ) {
        self.log(context, AuditAction::Update, credential_id, true, detail);
    }

    /// Record a successful rotation.
    pub fn log_rotate(
        &self,
        context: &AccessControlContext,
        credential_id: &CredentialId,
        detail: AuditDetail,
    ) {
        self.log(context, AuditAction::Rotate, credential_id, true, detail);
    }

    /// Record a successful revocation.
    pub fn log_revoke(
        &self,
        context: &AccessControlContext,
        credential_id: &CredentialId,
        detail: AuditDetail,
    ) {
        self.log(context, AuditAction::Revoke, credential_id, true, detail);
    }

    /// Record a successful administrative deletion.
    pub fn log_delete(
        &self,
        context: &AccessControlContext,
        credential_id: &CredentialId,
        detail: AuditDetail,
    ) {
        self.log(context, AuditAction::Delete, credential_id, true, detail);
    }

    /// Record a denied request with its reason.
    pub fn log_access_denied(
        &self,
        context: &AccessControlContext,
        credential_id: &CredentialId,
        reason: impl Into<String>,
        detail: AuditDetail,
    ) {
        self.log(
            context,
            AuditAction::AccessDenied,
            credential_id,
            false,
            detail.with_reason(reason),
        );
    }

    /// Wait until every previously queued entry has been processed.
    pub async fn flush(&self) {
        let (ack, done) = oneshot::channel();
        if self.tx.send(Command::Flush(ack)).is_ok() {
            let _ = done.await;
        }
    }

    /// Entries matching the filter, newest first.
    pub async fn get_logs(&self, filter: &AuditFilter) -> Result<Vec<AuditLogEntry>> {
        self.sink.query(filter).await
    }

    /// History of one credential.
    pub async fn get_credential_logs(
        &self,
        credential_id: &CredentialId,
        limit: Option<usize>,
    ) -> Result<Vec<AuditLogEntry>> {
        let mut filter = AuditFilter::new().with_credential_id(credential_id.clone());
        filter.limit = limit;
        self.get_logs(&filter).await
    }

    /// History of one user.
    pub async fn get_user_logs(
        &self,
        user_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<AuditLogEntry>> {
        let mut filter = AuditFilter::new().with_user_id(user_id);
        filter.limit = limit;
        self.get_logs(&filter).await
    }

    /// Failed operations of any kind.
    pub async fn get_failed_attempts(
        &self,
        start_date: Option<DateTime<Utc>>,
        limit: Option<usize>,
    ) -> Result<Vec<AuditLogEntry>> {
        let mut filter = AuditFilter::new().with_success(false);
        filter.start_date = start_date;
        filter.limit = limit;
        self.get_logs(&filter).await
    }

    /// Policy denials.
    pub async fn get_access_denied_events(
        &self,
        start_date: Option<DateTime<Utc>>,
        limit: Option<usize>,
    ) -> Result<Vec<AuditLogEntry>> {
        let mut filter = AuditFilter::new().with_action(AuditAction::AccessDenied);
        filter.start_date = start_date;
        filter.limit = limit;
        self.get_logs(&filter).await
    }

    /// Aggregate all entries whose timestamp falls in `[start, end]`.
    ///
    /// An empty window is not an error state: the report is all zeros with a
    /// success rate of 100.
    pub async fn generate_report(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<AuditReport> {
        let filter = AuditFilter::new()
            .with_start_date(start)
            .with_end_date(end)
            .with_limit(usize::MAX);
        let entries = self.get_logs(&filter).await?;

        let total = entries.len() as u64;
        let mut by_action: HashMap<String, u64> = HashMap::new();
        let mut by_user: HashMap<String, u64> = HashMap::new();
        let mut credentials: HashSet<&str> = HashSet::new();
        let mut users: HashSet<&str> = HashSet::new();
        let mut successes = 0u64;
        let mut denied = 0u64;

        for entry in &entries {
            *by_action.entry(entry.action.as_str().to_string()).or_insert(0) += 1;
            *by_user.entry(entry.user_id.clone()).or_insert(0) += 1;
            credentials.insert(entry.credential_id.as_str());
            users.insert(entry.user_id.as_str());
            if entry.success {
                successes += 1;
            }
            if entry.action == AuditAction::AccessDenied {
                denied += 1;
            }
        }

        let success_rate = if total == 0 {
            100.0
        } else {
            successes as f64 * 100.0 / total as f64
        };

        Ok(AuditReport {
            total_operations: total,
            by_action,
            by_user,
            success_rate,
            access_denied_count: denied,
            unique_credentials_accessed: credentials.len() as u64,
            unique_users: users.len() as u64,
        })
    }

    /// Snapshot of the most recently persisted entries, newest last.
    pub fn recent(&self) -> Vec<AuditLogEntry> {
        self.recent.read().unwrap().iter().cloned().collect()
    }
}
