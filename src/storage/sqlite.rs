//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::storage::rollup::AthleteRollup;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{
    AthleteRecord, EventRecord, MedalTally, RollupOutcome, RunCounts, RunRecord, RunStatus,
    StoredAthlete,
};
use crate::{AthleteId, SyncError};
use chrono::Utc;
use rusqlite::types::Value;
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, Transaction};
use std::collections::HashSet;
use std::path::Path;

const ATHLETE_COLUMNS: usize = 10;
const EVENT_COLUMNS: usize = 7;

/// Rows per multi-row statement; keeps bound parameters well under SQLite's limit
const ROWS_PER_STATEMENT: usize = 500;

const RUN_COLUMNS: &str = "id, started_at, finished_at, config_hash, status,
     discovered, skipped_known, fetched, failed, persisted";

const ATHLETE_SELECT: &str = "SELECT athlete_id, used_name, full_name, sex, born, died,
     nationality, roles, affiliations, medals_og, disciplines, events
     FROM athletes WHERE athlete_id = ?1";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(SyncError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, SyncError> {
        let conn = init_database(path)?;
        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, SyncError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

/// Builds `(?, ?, ...), (?, ?, ...)` for a multi-row VALUES clause
fn placeholders(rows: usize, columns: usize) -> String {
    let row = format!("({})", vec!["?"; columns].join(", "));
    vec![row; rows].join(", ")
}

fn text_or_null(value: &Option<String>) -> Value {
    match value {
        Some(text) => Value::Text(text.clone()),
        None => Value::Null,
    }
}

fn athlete_values(athlete: &AthleteRecord) -> StorageResult<[Value; ATHLETE_COLUMNS]> {
    Ok([
        Value::Integer(i64::from(athlete.athlete_id)),
        Value::Text(athlete.used_name.clone()),
        Value::Text(athlete.full_name.clone()),
        Value::Text(athlete.sex.clone()),
        Value::Text(athlete.born.clone()),
        Value::Text(athlete.died.clone()),
        Value::Text(athlete.nationality.clone()),
        Value::Text(athlete.roles.clone()),
        Value::Text(athlete.affiliations.clone()),
        Value::Text(serde_json::to_string(&athlete.medals_og)?),
    ])
}

fn event_values(event: &EventRecord) -> [Value; EVENT_COLUMNS] {
    [
        Value::Integer(i64::from(event.athlete_id)),
        Value::Text(event.games.clone()),
        Value::Text(event.discipline.clone()),
        text_or_null(&event.team),
        text_or_null(&event.pos),
        text_or_null(&event.medal),
        text_or_null(&event.used_as),
    ]
}

fn write_athletes(tx: &Transaction<'_>, athletes: &[AthleteRecord]) -> StorageResult<u64> {
    let mut written = 0u64;
    for chunk in athletes.chunks(ROWS_PER_STATEMENT) {
        let sql = format!(
            "INSERT INTO athletes
             (athlete_id, used_name, full_name, sex, born, died,
              nationality, roles, affiliations, medals_og)
             VALUES {}
             ON CONFLICT(athlete_id) DO UPDATE SET
                used_name = excluded.used_name,
                full_name = excluded.full_name,
                sex = excluded.sex,
                born = excluded.born,
                died = excluded.died,
                nationality = excluded.nationality,
                roles = excluded.roles,
                affiliations = excluded.affiliations,
                medals_og = excluded.medals_og",
            placeholders(chunk.len(), ATHLETE_COLUMNS)
        );

        let mut values = Vec::with_capacity(chunk.len() * ATHLETE_COLUMNS);
        for athlete in chunk {
            values.extend(athlete_values(athlete)?);
        }
        written += tx.execute(&sql, params_from_iter(values.iter()))? as u64;
    }
    Ok(written)
}

fn write_events(tx: &Transaction<'_>, events: &[EventRecord]) -> StorageResult<u64> {
    let mut inserted = 0u64;
    for chunk in events.chunks(ROWS_PER_STATEMENT) {
        let sql = format!(
            "INSERT INTO events
             (athlete_id, games, discipline, team, pos, medal, used_as)
             VALUES {}
             ON CONFLICT DO NOTHING",
            placeholders(chunk.len(), EVENT_COLUMNS)
        );

        let values: Vec<Value> = chunk.iter().flat_map(event_values).collect();
        inserted += tx.execute(&sql, params_from_iter(values.iter()))? as u64;
    }
    Ok(inserted)
}

fn run_status(status: String) -> rusqlite::Result<RunStatus> {
    RunStatus::from_db_string(&status).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            Type::Text,
            format!("unknown run status '{}'", status).into(),
        )
    })
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: run_status(row.get(4)?)?,
        counts: RunCounts {
            discovered: row.get::<_, i64>(5)? as u64,
            skipped_known: row.get::<_, i64>(6)? as u64,
            fetched: row.get::<_, i64>(7)? as u64,
            failed: row.get::<_, i64>(8)? as u64,
            persisted: row.get::<_, i64>(9)? as u64,
        },
    })
}

fn count(conn: &Connection, sql: &str) -> StorageResult<u64> {
    let count: i64 = conn.query_row(sql, [], |row| row.get(0))?;
    Ok(count as u64)
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS),
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                &format!("SELECT {} FROM runs ORDER BY id DESC LIMIT 1", RUN_COLUMNS),
                [],
                run_from_row,
            )
            .optional()?;
        Ok(run)
    }

    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        counts: &RunCounts,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, discovered = ?3, skipped_known = ?4,
             fetched = ?5, failed = ?6, persisted = ?7 WHERE id = ?8",
            params![
                status.to_db_string(),
                now,
                counts.discovered as i64,
                counts.skipped_known as i64,
                counts.fetched as i64,
                counts.failed as i64,
                counts.persisted as i64,
                run_id
            ],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    // ===== Athletes & Events =====

    fn known_athlete_ids(&self) -> StorageResult<HashSet<AthleteId>> {
        let mut stmt = self.conn.prepare("SELECT athlete_id FROM athletes")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<HashSet<_>, _>>()?;
        Ok(ids)
    }

    fn upsert_athletes(&mut self, athletes: &[AthleteRecord]) -> StorageResult<u64> {
        let tx = self.conn.transaction()?;
        let written = write_athletes(&tx, athletes)?;
        tx.commit()?;
        Ok(written)
    }

    fn insert_events(&mut self, events: &[EventRecord]) -> StorageResult<u64> {
        let tx = self.conn.transaction()?;
        let inserted = write_events(&tx, events)?;
        tx.commit()?;
        Ok(inserted)
    }

    fn persist_batch(
        &mut self,
        athletes: &[AthleteRecord],
        events: &[EventRecord],
    ) -> StorageResult<(u64, u64)> {
        // Foreign keys are checked per statement, so the athlete rows written
        // first are visible to the event insert inside the same transaction.
        let tx = self.conn.transaction()?;
        let written = write_athletes(&tx, athletes)?;
        let inserted = write_events(&tx, events)?;
        tx.commit()?;
        Ok((written, inserted))
    }

    fn run_rollup(&mut self) -> StorageResult<RollupOutcome> {
        let tx = self.conn.transaction()?;
        let mut outcome = RollupOutcome::default();

        {
            let mut select = tx.prepare(
                "SELECT athlete_id, games, discipline, pos, medal FROM events
                 ORDER BY athlete_id, games, discipline, pos NULLS LAST, medal NULLS LAST",
            )?;
            let mut update = tx.prepare(
                "UPDATE athletes SET disciplines = ?1, events = ?2 WHERE athlete_id = ?3",
            )?;

            let mut current: Option<(AthleteId, AthleteRollup)> = None;
            let mut rows = select.query([])?;
            while let Some(row) = rows.next()? {
                let athlete_id: AthleteId = row.get(0)?;
                let games: String = row.get(1)?;
                let discipline: String = row.get(2)?;
                let pos: Option<String> = row.get(3)?;
                let medal: Option<String> = row.get(4)?;

                let same_athlete = matches!(&current, Some((id, _)) if *id == athlete_id);
                if !same_athlete {
                    if let Some((id, rollup)) = current.take() {
                        let (disciplines, events) = rollup.finish();
                        update.execute(params![disciplines, events, id])?;
                        outcome.rolled_up += 1;
                    }
                    current = Some((athlete_id, AthleteRollup::default()));
                }
                if let Some((_, rollup)) = current.as_mut() {
                    rollup.push(&games, &discipline, pos.as_deref(), medal.as_deref());
                }
            }
            if let Some((id, rollup)) = current.take() {
                let (disciplines, events) = rollup.finish();
                update.execute(params![disciplines, events, id])?;
                outcome.rolled_up += 1;
            }

            outcome.cleared = tx.execute(
                "UPDATE athletes SET disciplines = NULL, events = NULL
                 WHERE (disciplines IS NOT NULL OR events IS NOT NULL)
                   AND NOT EXISTS (SELECT 1 FROM events e WHERE e.athlete_id = athletes.athlete_id)",
                [],
            )? as u64;
        }

        tx.commit()?;
        Ok(outcome)
    }

    fn get_athlete(&self, athlete_id: AthleteId) -> StorageResult<Option<StoredAthlete>> {
        let row = self
            .conn
            .query_row(ATHLETE_SELECT, params![athlete_id], |row| {
                let record = AthleteRecord {
                    athlete_id: row.get(0)?,
                    used_name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                    full_name: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                    sex: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                    born: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
                    died: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
                    nationality: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
                    roles: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
                    affiliations: row.get::<_, Option<String>>(8)?.unwrap_or_default(),
                    medals_og: MedalTally::new(),
                };
                let medals_json: Option<String> = row.get(9)?;
                let disciplines: Option<String> = row.get(10)?;
                let events: Option<String> = row.get(11)?;
                Ok((record, medals_json, disciplines, events))
            })
            .optional()?;

        let Some((mut record, medals_json, disciplines, events)) = row else {
            return Ok(None);
        };
        if let Some(json) = medals_json {
            record.medals_og = serde_json::from_str(&json)?;
        }

        Ok(Some(StoredAthlete {
            record,
            disciplines,
            events,
        }))
    }

    fn get_events(&self, athlete_id: AthleteId) -> StorageResult<Vec<EventRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT athlete_id, games, discipline, team, pos, medal, used_as
             FROM events WHERE athlete_id = ?1 ORDER BY event_id",
        )?;

        let events = stmt
            .query_map(params![athlete_id], |row| {
                Ok(EventRecord {
                    athlete_id: row.get(0)?,
                    games: row.get(1)?,
                    discipline: row.get(2)?,
                    team: row.get(3)?,
                    pos: row.get(4)?,
                    medal: row.get(5)?,
                    used_as: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(events)
    }

    // ===== Statistics =====

    fn count_athletes(&self) -> StorageResult<u64> {
        count(&self.conn, "SELECT COUNT(*) FROM athletes")
    }

    fn count_events(&self) -> StorageResult<u64> {
        count(&self.conn, "SELECT COUNT(*) FROM events")
    }

    fn count_athletes_with_events(&self) -> StorageResult<u64> {
        count(&self.conn, "SELECT COUNT(DISTINCT athlete_id) FROM events")
    }

    fn count_medalists(&self) -> StorageResult<u64> {
        count(
            &self.conn,
            "SELECT COUNT(*) FROM athletes a
             WHERE EXISTS (
                SELECT 1 FROM json_each(a.medals_og)
                WHERE key IN ('Gold', 'Silver', 'Bronze') AND value > 0
             )",
        )
    }
}

/// Opens a database at the given path, configures it, and applies the schema
pub fn init_database(path: &Path) -> Result<Connection, rusqlite::Error> {
    let conn = Connection::open(path)?;

    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        PRAGMA temp_store = MEMORY;
    ",
    )?;

    initialize_schema(&conn)?;

    Ok(conn)
}
