//! Recording store abstraction for Opptak.
//!
//! Provides a trait-based interface for recording persistence backends.

mod memory;
mod sqlite;

pub use memory::MemoryRecordingStore;
pub use sqlite::SqliteRecordingStore;

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted recording: the durable result of one ingestion run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recording {
    /// Unique recording ID, assigned by the store at insert.
    pub id: String,
    /// Caller-supplied display name. Not unique; two uploads of the same
    /// file are two recordings.
    pub original_name: String,
    /// Video container type of the original upload.
    pub mime_type: String,
    /// Byte length of the original upload.
    pub size: u64,
    /// Base64-encoded midpoint still frame (JPEG).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<String>,
    /// Recognized speech. `None` when the recognizer found nothing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcription: Option<String>,
    /// Server-assigned insertion timestamp.
    pub created_at: DateTime<Utc>,
}

/// Recording fields supplied by the pipeline. Identity and timestamp are
/// the store's to assign.
#[derive(Debug, Clone)]
pub struct NewRecording {
    pub original_name: String,
    pub mime_type: String,
    pub size: u64,
    pub snapshot: Option<String>,
    pub transcription: Option<String>,
}

/// Trait for recording store implementations.
#[async_trait]
pub trait RecordingStore: Send + Sync {
    /// Persist a completed recording and return its new ID.
    async fn insert(&self, rec: NewRecording) -> Result<String>;

    /// List every recording, most recently created first. Records sharing
    /// a timestamp come back in reverse insertion order.
    async fn list_all(&self) -> Result<Vec<Recording>>;

    /// Look up one recording. Unknown and malformed IDs both yield `None`.
    async fn get(&self, id: &str) -> Result<Option<Recording>>;

    /// Delete by ID. Returns whether a record was actually removed;
    /// deleting an unknown ID is a quiet no-op.
    async fn delete(&self, id: &str) -> Result<bool>;
}
