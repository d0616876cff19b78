//! Delete command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::store::{RecordingStore, SqliteRecordingStore};
use anyhow::Result;

/// Run the delete command.
pub async fn run_delete(id: &str, settings: Settings) -> Result<()> {
    let store = SqliteRecordingStore::new(&settings.store_path())?;

    if store.delete(id).await? {
        Output::success(&format!("Deleted recording {}", id));
    } else {
        Output::warning(&format!("No recording with id {} (nothing to delete)", id));
    }

    Ok(())
}
