//! Per-run temporary workspace management.
//!
//! Every ingestion run gets three private scratch paths under the upload
//! directory; `release` reclaims whatever the run actually produced.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// Scratch file locations for a single ingestion run.
///
/// Paths embed a fresh UUID, so concurrent runs never collide. Allocation
/// derives names only; no files exist until the pipeline writes them.
#[derive(Debug)]
pub struct RunWorkspace {
    /// Run identifier embedded in every path.
    pub run_id: Uuid,
    /// Where the uploaded bytes are materialized.
    pub source_path: PathBuf,
    /// Midpoint still frame written by the extractor.
    pub snapshot_path: PathBuf,
    /// Extracted audio track.
    pub audio_path: PathBuf,
}

impl RunWorkspace {
    /// Allocate scratch paths for one run. `source_ext` is the container
    /// extension matching the upload's media type.
    pub fn allocate(dir: &Path, source_ext: &str) -> Self {
        let run_id = Uuid::new_v4();
        Self {
            run_id,
            source_path: dir.join(format!("{}.source.{}", run_id, source_ext)),
            snapshot_path: dir.join(format!("{}.frame.jpg", run_id)),
            audio_path: dir.join(format!("{}.audio.mp3", run_id)),
        }
    }

    /// Delete every artifact this run left behind.
    ///
    /// Missing files are normal (failed runs stop partway through); any
    /// other removal error is logged and swallowed so cleanup never masks
    /// the run's own outcome.
    pub async fn release(&self) {
        for path in [&self.source_path, &self.snapshot_path, &self.audio_path] {
            match tokio::fs::remove_file(path).await {
                Ok(()) => debug!("Removed scratch file {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to clean up {}: {}", path.display(), e),
            }
        }
    }
}
