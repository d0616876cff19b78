//! Transcription module for Opptak.
//!
//! Turns the extracted audio track into plain text through a hosted
//! speech-to-text backend.

mod whisper;

pub use whisper::{is_api_key_configured, WhisperTranscriber};

use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// Trait for transcription services.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe an audio file and return the recognized text as a single
    /// string. Silence is not an error; the recognizer may return an empty
    /// or whitespace-only result.
    async fn transcribe(&self, audio_path: &Path) -> Result<String>;
}
