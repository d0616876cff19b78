//! Configuration settings for Opptak.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub ingest: IngestSettings,
    pub extraction: ExtractionSettings,
    pub transcription: TranscriptionSettings,
    pub store: StoreSettings,
}


/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data.
    pub data_dir: String,
    /// Directory for per-run scratch files (uploads, frames, audio).
    pub upload_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.opptak".to_string(),
            upload_dir: "/tmp/opptak/uploads".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Upload acceptance settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestSettings {
    /// Maximum accepted upload size in bytes.
    pub max_upload_bytes: u64,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            max_upload_bytes: 100 * 1024 * 1024, // 100 MiB
        }
    }
}

/// Media extraction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionSettings {
    /// Path or name of the ffmpeg binary.
    pub ffmpeg_path: String,
    /// Path or name of the ffprobe binary.
    pub ffprobe_path: String,
    /// Deadline for a single engine invocation, in seconds.
    pub stage_timeout_secs: u64,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            stage_timeout_secs: 120,
        }
    }
}

/// Transcription service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionSettings {
    /// Speech-to-text model to use.
    pub model: String,
    /// HTTP timeout for a single transcription request, in seconds.
    pub request_timeout_secs: u64,
    /// Optional language hint for the recognizer (ISO 639-1 code).
    pub language: Option<String>,
}

impl Default for TranscriptionSettings {
    fn default() -> Self {
        Self {
            model: "whisper-1".to_string(),
            request_timeout_secs: 300,
            language: None,
        }
    }
}

/// Recording store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Path to the SQLite database file.
    pub path: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            path: "~/.opptak/recordings.db".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> crate::error::Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::OpptakError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("opptak")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded upload directory path.
    pub fn upload_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.upload_dir)
    }

    /// Get the expanded recording database path.
    pub fn store_path(&self) -> PathBuf {
        Self::expand_path(&self.store.path)
    }
}
