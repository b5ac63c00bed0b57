//! Local note store.
//!
//! This module provides the device-resident record set of notes using SQLite.
//! Every mutation is durable before the call returns: file databases run in WAL
//! mode with `synchronous=FULL`, and each write is a single statement or a
//! single transaction, so a crash never leaves a half-written record.
//!
//! Tags are stored as a sorted JSON array; timestamps as Unix seconds.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::{NoteError, NoteResult};
use crate::models::Note;

/// Current schema version, stored in `PRAGMA user_version`
pub const SCHEMA_VERSION: i64 = 1;

const NOTE_COLUMNS: &str = "local_id, remote_id, title, tags, created_at, \
     pending_create, pending_edit, pending_delete, sync_error";

const UPSERT_NOTE: &str = r#"
    INSERT INTO notes (
        local_id, remote_id, title, tags, created_at,
        pending_create, pending_edit, pending_delete, sync_error
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
    ON CONFLICT(local_id) DO UPDATE SET
        remote_id = excluded.remote_id,
        title = excluded.title,
        tags = excluded.tags,
        pending_create = excluded.pending_create,
        pending_edit = excluded.pending_edit,
        pending_delete = excluded.pending_delete,
        sync_error = excluded.sync_error
"#;

/// Database wrapper for SQLite operations
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the note store at `db_path`
    pub fn new<P: AsRef<Path>>(db_path: P) -> NoteResult<Self> {
        let conn = Connection::open(db_path)?;

        // WAL keeps readers unblocked; FULL fsyncs each commit so an
        // acknowledged write survives power loss.
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch("PRAGMA synchronous=FULL;")?;

        let mut db = Self { conn };
        db.init_database()?;
        Ok(db)
    }

    /// Create an in-memory database (for testing)
    pub fn new_in_memory() -> NoteResult<Self> {
        let conn = Connection::open_in_memory()?;
        let mut db = Self { conn };
        db.init_database()?;
        Ok(db)
    }

    /// Initialize database schema
    pub fn init_database(&mut self) -> NoteResult<()> {
        let version: i64 = self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))?;

        if version > SCHEMA_VERSION {
            return Err(NoteError::database_op(format!(
                "note store schema version {} is newer than supported version {}",
                version, SCHEMA_VERSION
            )));
        }

        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS notes (
                local_id TEXT PRIMARY KEY,
                remote_id TEXT UNIQUE,
                title TEXT NOT NULL,
                tags TEXT NOT NULL DEFAULT '[]',
                created_at INTEGER NOT NULL,
                pending_create INTEGER NOT NULL DEFAULT 0,
                pending_edit INTEGER NOT NULL DEFAULT 0,
                pending_delete INTEGER NOT NULL DEFAULT 0,
                sync_error TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_notes_created_at ON notes (created_at, local_id);
            "#,
        )?;

        if version < SCHEMA_VERSION {
            self.conn
                .execute_batch(&format!("PRAGMA user_version = {};", SCHEMA_VERSION))?;
            tracing::info!(from = version, to = SCHEMA_VERSION, "Note store schema initialized");
        }

        Ok(())
    }

    /// Get the underlying connection (for advanced operations)
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Snapshot of every note, oldest first
    pub fn get_all(&self) -> NoteResult<Vec<Note>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM notes ORDER BY created_at ASC, local_id ASC",
            NOTE_COLUMNS
        ))?;

        let notes = stmt
            .query_map([], row_to_note)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(notes)
    }

    /// Get a note by its local ID
    pub fn get(&self, local_id: &str) -> NoteResult<Option<Note>> {
        let note = self
            .conn
            .query_row(
                &format!("SELECT {} FROM notes WHERE local_id = ?", NOTE_COLUMNS),
                [local_id],
                row_to_note,
            )
            .optional()?;
        Ok(note)
    }

    /// Get the local note mirroring a remote note
    pub fn find_by_remote_id(&self, remote_id: &str) -> NoteResult<Option<Note>> {
        let note = self
            .conn
            .query_row(
                &format!("SELECT {} FROM notes WHERE remote_id = ?", NOTE_COLUMNS),
                [remote_id],
                row_to_note,
            )
            .optional()?;
        Ok(note)
    }

    /// Insert or fully replace a note, keyed by `local_id`.
    ///
    /// `created_at` of an existing record is never overwritten.
    pub fn put(&self, note: &Note) -> NoteResult<()> {
        note.check_invariants()?;
        upsert(&self.conn, note)
    }

    /// Delete a note unconditionally. Returns true if a record was removed.
    pub fn remove(&self, local_id: &str) -> NoteResult<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM notes WHERE local_id = ?", [local_id])?;
        Ok(removed > 0)
    }

    /// Apply a set of upserts and removals atomically.
    ///
    /// Either every change lands or none does.
    pub fn apply_batch(&mut self, upserts: &[Note], removals: &[String]) -> NoteResult<()> {
        for note in upserts {
            note.check_invariants()?;
        }

        let tx = self.conn.transaction()?;
        for note in upserts {
            upsert(&tx, note)?;
        }
        for local_id in removals {
            tx.execute("DELETE FROM notes WHERE local_id = ?", [local_id])?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Number of notes in the store, including those pending delete
    pub fn count(&self) -> NoteResult<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM notes", [], |row| row.get(0))?;
        Ok(count)
    }
}

/// Lock a shared store, turning lock poisoning into a store error
pub fn lock_database(db: &Mutex<Database>) -> NoteResult<MutexGuard<'_, Database>> {
    db.lock()
        .map_err(|_| NoteError::database_op("note store lock poisoned"))
}

fn upsert(conn: &Connection, note: &Note) -> NoteResult<()> {
    let tags = serde_json::to_string(&note.tags)?;
    conn.execute(
        UPSERT_NOTE,
        params![
            note.local_id,
            note.remote_id,
            note.title,
            tags,
            note.created_at.timestamp(),
            note.pending_create,
            note.pending_edit,
            note.pending_delete,
            note.sync_error,
        ],
    )?;
    Ok(())
}

fn row_to_note(row: &Row) -> rusqlite::Result<Note> {
    let tags_json: String = row.get(3)?;
    let tags: BTreeSet<String> = serde_json::from_str(&tags_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?;

    let created_at_secs: i64 = row.get(4)?;
    let created_at: DateTime<Utc> = DateTime::from_timestamp(created_at_secs, 0)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(4, created_at_secs))?;

    Ok(Note {
        local_id: row.get(0)?,
        remote_id: row.get(1)?,
        title: row.get(2)?,
        tags,
        created_at,
        pending_create: row.get(5)?,
        pending_edit: row.get(6)?,
        pending_delete: row.get(7)?,
        sync_error: row.get(8)?,
    })
}
