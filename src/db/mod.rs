use crate::errors::{JournalError, JournalResult};
use crate::models::{DayRecord, DayStatus, NoteRecord, StoreChange};
use chrono::{Duration, LocalResult, NaiveDate, NaiveTime, TimeZone};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::broadcast;

const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Bumped whenever the table layout changes. A database written under any
/// other non-zero version is wiped and recreated on open.
pub const SCHEMA_VERSION: i64 = 3;

const CHANGE_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug)]
pub struct Database {
    conn: Mutex<Connection>,
    db_path: PathBuf,
    changes: broadcast::Sender<StoreChange>,
}

impl Database {
    pub fn new(path: &Path) -> JournalResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| JournalError::Io(err.to_string()))?;
        }
        let conn = Connection::open(path).map_err(JournalError::from)?;
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);

        let db = Self {
            conn: Mutex::new(conn),
            db_path: path.to_path_buf(),
            changes,
        };

        db.ensure_schema_version()?;
        tracing::info!(path = %db.db_path.display(), version = SCHEMA_VERSION, "journal database ready");

        Ok(db)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    pub fn subscribe_changes(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }

    pub fn upsert_status(&self, date: NaiveDate, status: DayStatus) -> JournalResult<()> {
        {
            let conn = self.conn()?;
            write_status(&conn, date, status)?;
        }
        tracing::debug!(%date, status = status.as_str(), "day status written");
        self.publish(StoreChange::Status { date });
        Ok(())
    }

    /// Advances `date` to its next status in one transaction and returns it.
    pub fn cycle_status(&self, date: NaiveDate) -> JournalResult<DayStatus> {
        let next = {
            let mut conn = self.conn()?;
            let tx = conn.transaction()?;
            let next = read_status(&tx, date)?.next();
            write_status(&tx, date, next)?;
            tx.commit()?;
            next
        };
        tracing::debug!(%date, status = next.as_str(), "day status cycled");
        self.publish(StoreChange::Status { date });
        Ok(next)
    }

    pub fn get_status(&self, date: NaiveDate) -> JournalResult<DayStatus> {
        let conn = self.conn()?;
        read_status(&conn, date)
    }

    pub fn statuses_in_range(&self, start: NaiveDate, end: NaiveDate) -> JournalResult<Vec<DayRecord>> {
        let conn = self.conn()?;
        let mut statement = conn.prepare(
            "SELECT date, status FROM toy_days WHERE date BETWEEN ?1 AND ?2",
        )?;
        let records = statement
            .query_map(
                params![date_to_millis(start), date_to_millis(end)],
                parse_day_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    pub fn all_statuses(&self) -> JournalResult<Vec<DayRecord>> {
        let conn = self.conn()?;
        let mut statement = conn.prepare("SELECT date, status FROM toy_days")?;
        let records = statement
            .query_map([], parse_day_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    pub fn add_note(&self, date: NaiveDate, text: &str) -> JournalResult<i64> {
        let text = text.trim();
        if text.is_empty() {
            return Err(JournalError::Validation("Note cannot be empty".to_string()));
        }

        let id = {
            let conn = self.conn()?;
            conn.execute(
                "INSERT INTO notes (date, text) VALUES (?1, ?2)",
                params![date_to_millis(date), text],
            )?;
            conn.last_insert_rowid()
        };
        tracing::debug!(%date, note_id = id, "note added");
        self.publish(StoreChange::Note { date });
        Ok(id)
    }

    /// Returns whether a row was removed. Deleting an unknown id is not an error.
    pub fn delete_note(&self, id: i64) -> JournalResult<bool> {
        let removed_date = {
            let conn = self.conn()?;
            let date = conn
                .query_row("SELECT date FROM notes WHERE id = ?1", params![id], |row| {
                    millis_to_date(row.get(0)?)
                })
                .optional()?;
            if date.is_some() {
                conn.execute("DELETE FROM notes WHERE id = ?1", params![id])?;
            }
            date
        };

        match removed_date {
            Some(date) => {
                tracing::debug!(%date, note_id = id, "note deleted");
                self.publish(StoreChange::Note { date });
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn notes_for_date(&self, date: NaiveDate) -> JournalResult<Vec<NoteRecord>> {
        let conn = self.conn()?;
        let mut statement = conn.prepare(
            "SELECT id, date, text FROM notes WHERE date = ?1 ORDER BY id ASC",
        )?;
        let notes = statement
            .query_map(params![date_to_millis(date)], parse_note_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(notes)
    }

    /// Newest date first; notes on the same date newest first.
    pub fn all_notes(&self) -> JournalResult<Vec<NoteRecord>> {
        let conn = self.conn()?;
        let mut statement = conn.prepare(
            "SELECT id, date, text FROM notes ORDER BY date DESC, id DESC",
        )?;
        let notes = statement
            .query_map([], parse_note_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(notes)
    }

    pub fn note_dates_in_range(&self, start: NaiveDate, end: NaiveDate) -> JournalResult<BTreeSet<NaiveDate>> {
        let conn = self.conn()?;
        let mut statement = conn.prepare(
            "SELECT DISTINCT date FROM notes WHERE date BETWEEN ?1 AND ?2",
        )?;
        let dates = statement
            .query_map(
                params![date_to_millis(start), date_to_millis(end)],
                |row| millis_to_date(row.get(0)?),
            )?
            .collect::<Result<BTreeSet<_>, _>>()?;
        Ok(dates)
    }

    fn conn(&self) -> JournalResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| JournalError::Internal("database mutex poisoned".to_string()))
    }

    fn publish(&self, change: StoreChange) {
        // No receivers is the normal idle state.
        let _ = self.changes.send(change);
    }

    fn ensure_schema_version(&self) -> JournalResult<()> {
        let conn = self.conn()?;
        let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

        // Version 0 with a notes table keyed by date is the single-note layout.
        let legacy_notes = version == 0
            && table_exists(&conn, "notes")?
            && !column_exists(&conn, "notes", "id")?;

        if (version != 0 && version != SCHEMA_VERSION) || legacy_notes {
            tracing::warn!(
                found = version,
                expected = SCHEMA_VERSION,
                "schema version mismatch, dropping journal tables"
            );
            conn.execute_batch(
                "DROP TABLE IF EXISTS toy_days;
                 DROP TABLE IF EXISTS notes;",
            )?;
        }

        conn.execute_batch(SCHEMA_SQL)?;
        conn.execute_batch(&format!("PRAGMA user_version = {};", SCHEMA_VERSION))?;
        Ok(())
    }
}

/// Local midnight of `date` as milliseconds since the epoch.
pub fn date_to_millis(date: NaiveDate) -> i64 {
    let midnight = date.and_time(NaiveTime::MIN);
    match chrono::Local.from_local_datetime(&midnight) {
        LocalResult::Single(dt) => dt.timestamp_millis(),
        LocalResult::Ambiguous(earliest, _) => earliest.timestamp_millis(),
        // Midnight skipped by a DST jump: the day starts an hour later.
        LocalResult::None => chrono::Local
            .from_local_datetime(&(midnight + Duration::hours(1)))
            .earliest()
            .map(|dt| dt.timestamp_millis())
            .unwrap_or_else(|| midnight.and_utc().timestamp_millis()),
    }
}

pub fn millis_to_date(millis: i64) -> rusqlite::Result<NaiveDate> {
    chrono::Local
        .timestamp_millis_opt(millis)
        .single()
        .map(|dt| dt.date_naive())
        .ok_or_else(|| conversion_error(format!("Invalid timestamp '{}'", millis)))
}

fn read_status(conn: &Connection, date: NaiveDate) -> JournalResult<DayStatus> {
    let status = conn
        .query_row(
            "SELECT status FROM toy_days WHERE date = ?1",
            params![date_to_millis(date)],
            |row| parse_status(&row.get::<_, String>(0)?),
        )
        .optional()?;
    Ok(status.unwrap_or_default())
}

fn write_status(conn: &Connection, date: NaiveDate, status: DayStatus) -> JournalResult<()> {
    let key = date_to_millis(date);
    if status.is_none() {
        conn.execute("DELETE FROM toy_days WHERE date = ?1", params![key])?;
    } else {
        conn.execute(
            "INSERT INTO toy_days (date, status) VALUES (?1, ?2)
             ON CONFLICT(date) DO UPDATE SET status = excluded.status",
            params![key, status.as_str()],
        )?;
    }
    Ok(())
}

fn parse_day_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DayRecord> {
    Ok(DayRecord {
        date: millis_to_date(row.get(0)?)?,
        status: parse_status(&row.get::<_, String>(1)?)?,
    })
}

fn parse_note_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<NoteRecord> {
    Ok(NoteRecord {
        id: row.get(0)?,
        date: millis_to_date(row.get(1)?)?,
        text: row.get(2)?,
    })
}

fn parse_status(raw: &str) -> rusqlite::Result<DayStatus> {
    DayStatus::parse(raw).ok_or_else(|| conversion_error(format!("Unknown day status '{}'", raw)))
}

fn conversion_error(message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        0,
        rusqlite::types::Type::Text,
        Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, message)),
    )
}

fn table_exists(conn: &Connection, table: &str) -> JournalResult<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(1) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn column_exists(conn: &Connection, table: &str, column: &str) -> JournalResult<bool> {
    let pragma = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&pragma)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}
