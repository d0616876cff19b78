//! Show command implementation.

use crate::cli::{format_size, Output};
use crate::config::Settings;
use crate::store::{RecordingStore, SqliteRecordingStore};
use anyhow::Result;

/// Run the show command.
pub async fn run_show(id: &str, settings: Settings) -> Result<()> {
    let store = SqliteRecordingStore::new(&settings.store_path())?;

    match store.get(id).await? {
        Some(rec) => {
            Output::header(&rec.original_name);
            println!();
            Output::kv("Id", &rec.id);
            Output::kv("Type", &rec.mime_type);
            Output::kv("Size", &format_size(rec.size));
            Output::kv("Created", &rec.created_at.format("%Y-%m-%d %H:%M:%S UTC").to_string());
            match &rec.snapshot {
                Some(data) => Output::kv("Snapshot", &format!("{} base64 chars", data.len())),
                None => Output::kv("Snapshot", "none"),
            }
            println!();
            match &rec.transcription {
                Some(text) => {
                    Output::header("Transcript");
                    println!("{}", text);
                }
                None => {
                    Output::info("No transcript for this recording.");
                }
            }
            Ok(())
        }
        None => {
            Output::error(&format!("Recording not found: {}", id));
            Err(anyhow::anyhow!("Recording not found: {}", id))
        }
    }
}
