//! Append-only audit trail of merge decisions and their outcomes.
//!
//! One JSON object per line, one line per retirement candidate, written in both modes. The file is
//! never truncated, so it accumulates the history of every run while the report only describes the
//! latest one.

use crate::error::{DedupError, DedupResult};
use crate::safety::{Disposition, SafetyPolicy};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use uuid::Uuid;

/// Dry-run or execute.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunMode {
    DryRun,
    Execute,
}

impl RunMode {
    pub fn as_str(self) -> &'static str {
        match self {
            RunMode::DryRun => "dry-run",
            RunMode::Execute => "execute",
        }
    }
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of one engine run, shared by every audit event and the report.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunContext {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub mode: RunMode,
    pub policy: SafetyPolicy,
}

impl RunContext {
    pub fn new(mode: RunMode, policy: SafetyPolicy) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            mode,
            policy,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub run_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub mode: RunMode,
    pub policy: SafetyPolicy,
    pub cluster_key: String,
    pub master_id: String,
    pub record_id: String,
    pub disposition: Disposition,
    pub outcome: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct AuditLog {
    writer: Box<dyn Write>,
}

impl AuditLog {
    /// Open `path` for appending, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns `DedupError::AuditWrite` if the file cannot be opened.
    pub fn open(path: &Path) -> DedupResult<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(DedupError::AuditWrite)?;
        Ok(Self::from_writer(Box::new(file)))
    }

    pub fn from_writer(writer: Box<dyn Write>) -> Self {
        Self { writer }
    }

    /// Discards every event.
    pub fn discard() -> Self {
        Self::from_writer(Box::new(std::io::sink()))
    }

    /// Append one event and flush it.
    pub fn record(&mut self, event: &AuditEvent) -> DedupResult<()> {
        let line = serde_json::to_string(event).map_err(DedupError::AuditSerialization)?;
        writeln!(self.writer, "{}", line).map_err(DedupError::AuditWrite)?;
        self.writer.flush().map_err(DedupError::AuditWrite)
    }
}

impl std::fmt::Debug for AuditLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLog").finish_non_exhaustive()
    }
}
