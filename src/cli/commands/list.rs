//! List command implementation.

use crate::cli::{format_size, Output};
use crate::config::Settings;
use crate::store::{RecordingStore, SqliteRecordingStore};
use anyhow::Result;

/// Run the list command.
pub async fn run_list(settings: Settings) -> Result<()> {
    let store = SqliteRecordingStore::new(&settings.store_path())?;

    match store.list_all().await {
        Ok(recordings) => {
            if recordings.is_empty() {
                Output::info("No recordings yet. Use 'opptak ingest <file>' or POST to the server.");
            } else {
                Output::header(&format!("Recordings ({})", recordings.len()));
                println!();

                for rec in &recordings {
                    Output::recording_info(
                        &rec.original_name,
                        &rec.id,
                        rec.size,
                        &rec.created_at.format("%Y-%m-%d %H:%M").to_string(),
                        rec.transcription.is_some(),
                    );
                }

                let total_bytes: u64 = recordings.iter().map(|r| r.size).sum();
                println!();
                Output::kv("Total size", &format_size(total_bytes));
            }
        }
        Err(e) => {
            Output::error(&format!("Failed to list recordings: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
