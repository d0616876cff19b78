//! Error types for Opptak.

use thiserror::Error;

/// Library-level error type for Opptak operations.
#[derive(Error, Debug)]
pub enum OpptakError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid upload: {0}")]
    Validation(String),

    #[error("Media extraction failed: {0}")]
    Extraction(String),

    #[error("Transcription failed: {0}")]
    Transcription(String),

    #[error("Recording store error: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Ingestion task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("External tool not found: {0}. Please install it and ensure it's in your PATH.")]
    ToolNotFound(String),
}

/// Result type alias for Opptak operations.
pub type Result<T> = std::result::Result<T, OpptakError>;
