//! Media extraction for Opptak.
//!
//! Wraps the external transcoding engine behind a narrow capability
//! interface so the pipeline never talks to a process directly.

mod ffmpeg;

pub use ffmpeg::FfmpegExtractor;

use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// Probed container and stream facts about a source file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaProbe {
    /// Container duration in seconds, if the container reports one.
    pub duration_seconds: Option<f64>,
    /// Whether the source carries at least one video stream.
    pub has_video: bool,
    /// Whether the source carries at least one audio stream.
    pub has_audio: bool,
}

/// Trait for media extraction backends.
#[async_trait]
pub trait MediaExtractor: Send + Sync {
    /// Capture a single still frame from the temporal midpoint of the
    /// source, scaled to 320x240, and write it as JPEG to `out`.
    async fn snapshot(&self, source: &Path, out: &Path) -> Result<()>;

    /// Extract the source's audio track to a compressed audio file at
    /// `out`.
    async fn extract_audio(&self, source: &Path, out: &Path) -> Result<()>;
}
