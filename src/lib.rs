//! Opptak - Video Ingestion with Snapshots and Transcripts
//!
//! A self-hosted service for ingesting screen and camera recordings.
//!
//! The name "Opptak" comes from the Norwegian word for "recording."
//!
//! # Overview
//!
//! Opptak allows you to:
//! - Accept video uploads over HTTP or from local files
//! - Capture a midpoint preview frame from each video
//! - Extract the audio track and transcribe it with Whisper
//! - Browse, inspect, and delete stored recordings
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `config` - Configuration management
//! - `workspace` - Per-run scratch file management
//! - `media` - Frame and audio extraction via ffmpeg
//! - `transcription` - Speech-to-text transcription
//! - `store` - Recording metadata persistence
//! - `pipeline` - Ingestion pipeline coordination
//!
//! # Example
//!
//! ```rust,no_run
//! use opptak::config::Settings;
//! use opptak::pipeline::{IngestPipeline, UploadMeta};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let pipeline = IngestPipeline::new(&settings)?;
//!
//!     let data = tokio::fs::read("capture.webm").await?;
//!     let meta = UploadMeta {
//!         original_name: "capture.webm".to_string(),
//!         mime_type: "video/webm".to_string(),
//!         size: data.len() as u64,
//!     };
//!
//!     let receipt = pipeline.ingest(data, meta).await?;
//!     println!("Stored recording {}", receipt.id);
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod media;
pub mod pipeline;
pub mod store;
pub mod transcription;
pub mod workspace;

pub use error::{OpptakError, Result};
