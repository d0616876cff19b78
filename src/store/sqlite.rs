//! SQLite-based recording store implementation.
//!
//! One row per recording, snapshot and transcript inline. Fine for a
//! single-node service; a deployment serving many users would move the
//! snapshot blobs out of the database.

use super::{NewRecording, Recording, RecordingStore};
use crate::error::{OpptakError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// SQLite-based recording store.
pub struct SqliteRecordingStore {
    conn: Mutex<Connection>,
}

impl SqliteRecordingStore {
    /// Open (or create) the recording store at `path`.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // Enable WAL mode for better concurrent performance
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS recordings (
                id TEXT PRIMARY KEY,
                original_name TEXT NOT NULL,
                mime_type TEXT NOT NULL,
                size_bytes INTEGER NOT NULL,
                snapshot TEXT,
                transcription TEXT,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_recordings_created_at ON recordings(created_at);
            "#,
        )?;

        info!("Initialized recording store at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory recording store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS recordings (
                id TEXT PRIMARY KEY,
                original_name TEXT NOT NULL,
                mime_type TEXT NOT NULL,
                size_bytes INTEGER NOT NULL,
                snapshot TEXT,
                transcription TEXT,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_recordings_created_at ON recordings(created_at);
            "#,
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

/// Map one row of the recordings table, columns in schema order.
fn read_recording(row: &rusqlite::Row<'_>) -> rusqlite::Result<Recording> {
    let created_at_str: String = row.get(6)?;

    Ok(Recording {
        id: row.get(0)?,
        original_name: row.get(1)?,
        mime_type: row.get(2)?,
        size: row.get::<_, i64>(3)? as u64,
        snapshot: row.get(4)?,
        transcription: row.get(5)?,
        created_at: DateTime::parse_from_rfc3339(&created_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}

#[async_trait]
impl RecordingStore for SqliteRecordingStore {
    #[instrument(skip(self, rec))]
    async fn insert(&self, rec: NewRecording) -> Result<String> {
        let conn = self.conn.lock().map_err(|e| {
            OpptakError::Store(format!("Failed to acquire lock: {}", e))
        })?;

        let id = Uuid::new_v4().to_string();

        // Timestamps never decrease in insertion order, even if the wall
        // clock steps backwards between runs.
        let newest: Option<String> =
            conn.query_row("SELECT MAX(created_at) FROM recordings", [], |row| row.get(0))?;

        let mut created_at = Utc::now();
        if let Some(prev) = newest.and_then(|s| DateTime::parse_from_rfc3339(&s).ok()) {
            let prev = prev.with_timezone(&Utc);
            if prev > created_at {
                created_at = prev;
            }
        }

        conn.execute(
            r#"
            INSERT INTO recordings
            (id, original_name, mime_type, size_bytes, snapshot, transcription, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                id,
                rec.original_name,
                rec.mime_type,
                rec.size as i64,
                rec.snapshot,
                rec.transcription,
                created_at.to_rfc3339(),
            ],
        )?;

        debug!("Inserted recording {}", id);
        Ok(id)
    }

    #[instrument(skip(self))]
    async fn list_all(&self) -> Result<Vec<Recording>> {
        let conn = self.conn.lock().map_err(|e| {
            OpptakError::Store(format!("Failed to acquire lock: {}", e))
        })?;

        let mut stmt = conn.prepare(
            r#"
            SELECT id, original_name, mime_type, size_bytes, snapshot, transcription, created_at
            FROM recordings
            ORDER BY created_at DESC, rowid DESC
            "#,
        )?;

        let rows = stmt.query_map([], read_recording)?;
        let result: Vec<Recording> = rows.filter_map(|r| r.ok()).collect();

        debug!("Listed {} recordings", result.len());
        Ok(result)
    }

    #[instrument(skip(self))]
    async fn get(&self, id: &str) -> Result<Option<Recording>> {
        let conn = self.conn.lock().map_err(|e| {
            OpptakError::Store(format!("Failed to acquire lock: {}", e))
        })?;

        let result = conn.query_row(
            r#"
            SELECT id, original_name, mime_type, size_bytes, snapshot, transcription, created_at
            FROM recordings
            WHERE id = ?1
            "#,
            params![id],
            read_recording,
        );

        match result {
            Ok(rec) => Ok(Some(rec)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock().map_err(|e| {
            OpptakError::Store(format!("Failed to acquire lock: {}", e))
        })?;

        let deleted = conn.execute("DELETE FROM recordings WHERE id = ?1", params![id])?;

        if deleted > 0 {
            info!("Deleted recording {}", id);
        }
        Ok(deleted > 0)
    }
}
