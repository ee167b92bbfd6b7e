//! Database schema definitions
//!
//! `athletes` and `events` mirror the relational layout the sync has always
//! written; `runs` is the ledger of sync passes.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track sync runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    discovered INTEGER NOT NULL DEFAULT 0,
    skipped_known INTEGER NOT NULL DEFAULT 0,
    fetched INTEGER NOT NULL DEFAULT 0,
    failed INTEGER NOT NULL DEFAULT 0,
    persisted INTEGER NOT NULL DEFAULT 0
);

-- One row per athlete, keyed by the source-assigned ID
CREATE TABLE IF NOT EXISTS athletes (
    athlete_id INTEGER PRIMARY KEY,
    used_name TEXT,
    full_name TEXT,
    sex TEXT,
    born TEXT,
    died TEXT,
    nationality TEXT,
    roles TEXT,
    affiliations TEXT,
    medals_og TEXT CHECK (medals_og IS NULL OR json_valid(medals_og)),
    disciplines TEXT,
    events TEXT
);

-- One row per Games appearance
CREATE TABLE IF NOT EXISTS events (
    event_id INTEGER PRIMARY KEY AUTOINCREMENT,
    athlete_id INTEGER NOT NULL
        REFERENCES athletes(athlete_id)
        ON DELETE CASCADE,
    games TEXT NOT NULL,
    discipline TEXT NOT NULL,
    team TEXT,
    pos TEXT,
    medal TEXT,
    used_as TEXT
);

CREATE INDEX IF NOT EXISTS idx_events_athlete ON events(athlete_id);

-- A re-scraped athlete never gets the same appearance twice
CREATE UNIQUE INDEX IF NOT EXISTS idx_events_appearance
    ON events(athlete_id, games, discipline, COALESCE(pos, ''));
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        initialize_schema(&conn).unwrap();
        assert!(initialize_schema(&conn).is_ok());
    }

    #[test]
    fn test_tables_exist_after_init() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        for table in ["runs", "athletes", "events"] {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "Table {} should exist", table);
        }
    }

    #[test]
    fn test_medals_column_rejects_invalid_json() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        let result = conn.execute(
            "INSERT INTO athletes (athlete_id, medals_og) VALUES (1, 'not json')",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_events_cascade_with_athlete() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        initialize_schema(&conn).unwrap();

        conn.execute("INSERT INTO athletes (athlete_id) VALUES (7)", [])
            .unwrap();
        conn.execute(
            "INSERT INTO events (athlete_id, games, discipline) VALUES (7, '2016 Summer', 'Athletics')",
            [],
        )
        .unwrap();
        conn.execute("DELETE FROM athletes WHERE athlete_id = 7", [])
            .unwrap();

        let remaining: i64 = conn
            .query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))
            .unwrap();
        assert_eq!(remaining, 0);
    }

    #[test]
    fn test_events_require_existing_athlete() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        initialize_schema(&conn).unwrap();

        let result = conn.execute(
            "INSERT INTO events (athlete_id, games, discipline) VALUES (99, '2016 Summer', 'Athletics')",
            [],
        );
        assert!(result.is_err());
    }
}
