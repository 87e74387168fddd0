//! Audit logging for administrative actions
//!
//! Every command that changes watchdog or node state leaves a JSON line
//! behind, written to an optional file and/or stdout. Credentials are never
//! part of an entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

/// Audit log event types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    FailoverRequested,
    SentinelsReset,
    PodRemoved,
    SentinelsValidated,
    AuthChecked,
    TopologyConflict,
    CredentialRotated,
    CredentialRolledBack,
}

/// Whether the action fully succeeded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditOutcome {
    Success,
    Partial,
    Failure,
}

/// Audit log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    #[serde(with = "chrono::serde::ts_seconds")]
    pub timestamp: DateTime<Utc>,
    pub event: AuditEventType,
    pub pod: String,
    pub outcome: AuditOutcome,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

/// Audit logger
#[derive(Debug, Default)]
pub struct AuditLogger {
    file: Option<Mutex<File>>,
    to_stderr: bool,
}

impl AuditLogger {
    /// Logger that appends to `path` (if it can be opened) and optionally echoes to stderr.
    ///
    /// Stdout is left to command output so `--json` stays parseable.
    pub fn new(path: Option<&Path>, to_stderr: bool) -> Self {
        let file = path.and_then(|p| {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(p)
                .map_err(|e| tracing::warn!("Cannot open audit log {}: {}", p.display(), e))
                .ok()
                .map(Mutex::new)
        });
        Self { file, to_stderr }
    }

    /// Logger that drops every entry
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Log an audit entry
    pub fn log(&self, entry: AuditEntry) {
        let line = serde_json::to_string(&entry).unwrap_or_else(|_| "{}".to_string());
        if let Some(file) = &self.file {
            if let Ok(mut f) = file.lock() {
                let _ = writeln!(f, "{}", line);
            }
        }
        if self.to_stderr {
            eprintln!("[AUDIT] {}", line);
        }
    }

    /// Convenience for logging an event
    pub fn log_event(
        &self,
        event: AuditEventType,
        pod: impl Into<String>,
        outcome: AuditOutcome,
        message: impl Into<String>,
        meta: Option<serde_json::Value>,
    ) {
        let entry = AuditEntry {
            timestamp: Utc::now(),
            event,
            pod: pod.into(),
            outcome,
            message: message.into(),
            meta,
        };
        self.log(entry);
    }
}
