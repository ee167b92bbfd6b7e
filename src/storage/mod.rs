//! Storage module for persisting athletes and their results
//!
//! This module handles all database operations for the sync, including:
//! - SQLite database initialization and schema management
//! - Batched athlete upserts and event inserts
//! - The derived-field rollup onto athlete rows
//! - Run tracking for the summary ledger

mod rollup;
mod schema;
mod sqlite;
mod traits;

pub use rollup::{format_event_line, RollupOutcome};
pub use sqlite::{init_database, SqliteStorage};
pub use traits::{Storage, StorageError, StorageResult};

use crate::{AthleteId, SyncError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Initializes or opens a storage database
pub fn open_storage(path: &Path) -> Result<SqliteStorage, SyncError> {
    SqliteStorage::new(path)
}

/// Medal classes tracked in an athlete's Olympic Games tally
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MedalClass {
    Gold,
    Silver,
    Bronze,
    Total,
}

impl MedalClass {
    /// Matches a tally row label, ignoring case and surrounding whitespace
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "gold" => Some(Self::Gold),
            "silver" => Some(Self::Silver),
            "bronze" => Some(Self::Bronze),
            "total" => Some(Self::Total),
            _ => None,
        }
    }
}

/// Medal class → count, stored as a JSON object in `athletes.medals_og`
pub type MedalTally = BTreeMap<MedalClass, u32>;

/// One athlete's biography and medal tally as scraped from the source
///
/// Text fields are free text and empty when the profile omits them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AthleteRecord {
    pub athlete_id: AthleteId,
    pub used_name: String,
    pub full_name: String,
    pub sex: String,
    pub born: String,
    pub died: String,
    pub nationality: String,
    pub roles: String,
    pub affiliations: String,
    pub medals_og: MedalTally,
}

/// One Games appearance of an athlete
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    pub athlete_id: AthleteId,
    pub games: String,
    pub discipline: String,
    pub team: Option<String>,
    pub pos: Option<String>,
    pub medal: Option<String>,
    pub used_as: Option<String>,
}

/// An athlete row as read back from the store, derived fields included
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAthlete {
    pub record: AthleteRecord,
    pub disciplines: Option<String>,
    pub events: Option<String>,
}

/// Per-pass counters recorded on the run row
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunCounts {
    /// Distinct athlete IDs discovered on edition pages
    pub discovered: u64,
    /// IDs skipped because the store already had them
    pub skipped_known: u64,
    /// Profiles fetched and parsed successfully
    pub fetched: u64,
    /// Profiles that failed to fetch or parse
    pub failed: u64,
    /// Athlete rows written
    pub persisted: u64,
}

/// Represents a sync run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
    pub counts: RunCounts,
}

/// Status of a sync run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Aborted,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Aborted => "aborted",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "aborted" => Some(Self::Aborted),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_status_roundtrip() {
        for status in &[RunStatus::Running, RunStatus::Completed, RunStatus::Aborted] {
            let db_str = status.to_db_string();
            assert_eq!(Some(*status), RunStatus::from_db_string(db_str));
        }
        assert_eq!(RunStatus::from_db_string("invalid"), None);
    }

    #[test]
    fn test_medal_class_from_label() {
        assert_eq!(MedalClass::from_label("Gold"), Some(MedalClass::Gold));
        assert_eq!(MedalClass::from_label(" SILVER "), Some(MedalClass::Silver));
        assert_eq!(MedalClass::from_label("bronze"), Some(MedalClass::Bronze));
        assert_eq!(MedalClass::from_label("Total"), Some(MedalClass::Total));
        assert_eq!(MedalClass::from_label("Diploma"), None);
    }

    #[test]
    fn test_medal_tally_json_shape() {
        let mut tally = MedalTally::new();
        tally.insert(MedalClass::Total, 2);
        tally.insert(MedalClass::Silver, 1);
        tally.insert(MedalClass::Bronze, 1);

        let json = serde_json::to_string(&tally).unwrap();
        assert_eq!(json, r#"{"Silver":1,"Bronze":1,"Total":2}"#);

        let back: MedalTally = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tally);
    }
}
