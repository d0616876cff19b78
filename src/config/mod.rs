//! Configuration module for Opptak.
//!
//! Handles loading and managing application settings.

mod settings;

pub use settings::{
    ExtractionSettings, GeneralSettings, IngestSettings, Settings, StoreSettings,
    TranscriptionSettings,
};
