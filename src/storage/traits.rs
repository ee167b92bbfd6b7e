//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::storage::{
    AthleteRecord, EventRecord, RollupOutcome, RunCounts, RunRecord, RunStatus, StoredAthlete,
};
use crate::AthleteId;
use std::collections::HashSet;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON column error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Run not found: {0}")]
    RunNotFound(i64),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Persistence gateway used by the sync coordinator
///
/// Every write method runs in its own transaction: a failed call leaves
/// earlier calls committed and itself fully rolled back.
pub trait Storage {
    // ===== Run Management =====

    /// Creates a new sync run in the `running` state
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Records the final status and counters of a run
    fn finish_run(&mut self, run_id: i64, status: RunStatus, counts: &RunCounts)
        -> StorageResult<()>;

    // ===== Athletes & Events =====

    /// Returns every athlete ID already in the store
    fn known_athlete_ids(&self) -> StorageResult<HashSet<AthleteId>>;

    /// Inserts athletes, overwriting every non-key column on ID conflict
    ///
    /// Derived rollup fields are left untouched.
    ///
    /// # Returns
    ///
    /// The number of athlete rows written
    fn upsert_athletes(&mut self, athletes: &[AthleteRecord]) -> StorageResult<u64>;

    /// Inserts events, ignoring appearances that are already stored
    ///
    /// # Returns
    ///
    /// The number of event rows actually inserted
    fn insert_events(&mut self, events: &[EventRecord]) -> StorageResult<u64>;

    /// Persists one batch atomically: athletes are written first, then their events
    ///
    /// Either the whole batch commits or none of it does, so an athlete never
    /// lands in the store without the events parsed alongside it.
    ///
    /// # Returns
    ///
    /// `(athletes_written, events_inserted)`
    fn persist_batch(
        &mut self,
        athletes: &[AthleteRecord],
        events: &[EventRecord],
    ) -> StorageResult<(u64, u64)>;

    /// Recomputes `disciplines` / `events` on every athlete row
    fn run_rollup(&mut self) -> StorageResult<RollupOutcome>;

    /// Gets an athlete by ID
    fn get_athlete(&self, athlete_id: AthleteId) -> StorageResult<Option<StoredAthlete>>;

    /// Gets an athlete's events in insertion order
    fn get_events(&self, athlete_id: AthleteId) -> StorageResult<Vec<EventRecord>>;

    // ===== Statistics =====

    /// Counts athlete rows
    fn count_athletes(&self) -> StorageResult<u64>;

    /// Counts event rows
    fn count_events(&self) -> StorageResult<u64>;

    /// Counts athletes with at least one event
    fn count_athletes_with_events(&self) -> StorageResult<u64>;

    /// Counts athletes whose tally records at least one medal
    fn count_medalists(&self) -> StorageResult<u64>;
}
