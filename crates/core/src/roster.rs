//! Roster sources.
//!
//! The roster is a flat snapshot of every patient identity, read once per run. It is never
//! mutated by the engine.

use crate::error::{DedupError, DedupResult};
use crate::record::CandidateRecord;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

pub trait RosterSource {
    /// Fetch the full roster snapshot, in roster order.
    fn fetch_roster(&self) -> DedupResult<Vec<CandidateRecord>>;
}

/// One roster entry as exported to JSON.
#[derive(Debug, Deserialize)]
struct RosterEntry {
    id: String,
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    dob: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<RosterEntry> for CandidateRecord {
    fn from(entry: RosterEntry) -> Self {
        CandidateRecord::new(
            entry.id,
            entry.first_name,
            entry.last_name,
            entry.email,
            entry.dob,
            entry.created_at,
        )
    }
}

/// Reads a JSON array export of the roster from disk.
#[derive(Clone, Debug)]
pub struct JsonRosterSource {
    path: PathBuf,
}

impl JsonRosterSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse a roster export held in memory.
    pub fn parse(contents: &str) -> DedupResult<Vec<CandidateRecord>> {
        let entries: Vec<RosterEntry> =
            serde_json::from_str(contents).map_err(DedupError::RosterParse)?;
        let roster: Vec<CandidateRecord> = entries.into_iter().map(CandidateRecord::from).collect();
        ensure_unique_ids(&roster)?;
        Ok(roster)
    }
}

impl RosterSource for JsonRosterSource {
    fn fetch_roster(&self) -> DedupResult<Vec<CandidateRecord>> {
        let contents = fs::read_to_string(&self.path).map_err(DedupError::RosterRead)?;
        let roster = Self::parse(&contents)?;
        tracing::info!(
            "Loaded {} roster records from {}",
            roster.len(),
            self.path.display()
        );
        Ok(roster)
    }
}

/// A roster held in memory.
#[derive(Clone, Debug, Default)]
pub struct InMemoryRosterSource {
    records: Vec<CandidateRecord>,
}

impl InMemoryRosterSource {
    pub fn new(records: Vec<CandidateRecord>) -> Self {
        Self { records }
    }
}

impl RosterSource for InMemoryRosterSource {
    fn fetch_roster(&self) -> DedupResult<Vec<CandidateRecord>> {
        ensure_unique_ids(&self.records)?;
        Ok(self.records.clone())
    }
}

/// External identifiers must be unique within one snapshot.
fn ensure_unique_ids(roster: &[CandidateRecord]) -> DedupResult<()> {
    let mut seen = HashSet::with_capacity(roster.len());
    for record in roster {
        if record.id().is_empty() {
            return Err(DedupError::InvalidInput(
                "roster record with an empty identifier".into(),
            ));
        }
        if !seen.insert(record.id()) {
            return Err(DedupError::DuplicateRosterId(record.id().to_string()));
        }
    }
    Ok(())
}
