//! In-memory recording store implementation.
//!
//! Useful for testing and throwaway deployments; contents vanish with the
//! process.

use super::{NewRecording, Recording, RecordingStore};
use crate::error::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::RwLock;
use uuid::Uuid;

/// In-memory recording store.
pub struct MemoryRecordingStore {
    /// Recordings in insertion order; the newest lives at the back.
    recordings: RwLock<Vec<Recording>>,
}

impl MemoryRecordingStore {
    /// Create a new in-memory recording store.
    pub fn new() -> Self {
        Self {
            recordings: RwLock::new(Vec::new()),
        }
    }
}

impl Default for MemoryRecordingStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordingStore for MemoryRecordingStore {
    async fn insert(&self, rec: NewRecording) -> Result<String> {
        let mut recordings = self.recordings.write().unwrap();

        // Same clamp as the SQLite store: timestamps never decrease in
        // insertion order.
        let mut created_at = Utc::now();
        if let Some(prev) = recordings.last().map(|r| r.created_at) {
            if prev > created_at {
                created_at = prev;
            }
        }

        let id = Uuid::new_v4().to_string();
        recordings.push(Recording {
            id: id.clone(),
            original_name: rec.original_name,
            mime_type: rec.mime_type,
            size: rec.size,
            snapshot: rec.snapshot,
            transcription: rec.transcription,
            created_at,
        });

        Ok(id)
    }

    async fn list_all(&self) -> Result<Vec<Recording>> {
        let recordings = self.recordings.read().unwrap();

        // Insertion keeps created_at non-decreasing, so newest-first is
        // exactly reverse insertion order, ties included.
        let mut result: Vec<Recording> = recordings.clone();
        result.reverse();
        Ok(result)
    }

    async fn get(&self, id: &str) -> Result<Option<Recording>> {
        let recordings = self.recordings.read().unwrap();
        Ok(recordings.iter().find(|r| r.id == id).cloned())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let mut recordings = self.recordings.write().unwrap();
        let initial_len = recordings.len();
        recordings.retain(|r| r.id != id);
        Ok(recordings.len() < initial_len)
    }
}
