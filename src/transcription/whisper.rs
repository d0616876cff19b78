//! OpenAI Whisper transcription implementation.

use super::Transcriber;
use crate::config::TranscriptionSettings;
use crate::error::{OpptakError, Result};
use async_openai::types::{AudioResponseFormat, CreateTranscriptionRequestArgs};
use async_openai::{config::OpenAIConfig, Client};
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, instrument};

/// OpenAI Whisper-based transcriber.
pub struct WhisperTranscriber {
    client: Client<OpenAIConfig>,
    model: String,
    language: Option<String>,
}

impl WhisperTranscriber {
    /// Create a transcriber from transcription settings.
    ///
    /// The request timeout lives on the HTTP client, so a stalled backend
    /// surfaces as an error instead of hanging the run.
    pub fn new(settings: &TranscriptionSettings) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()?;

        let client = Client::with_config(OpenAIConfig::default()).with_http_client(http_client);

        Ok(Self {
            client,
            model: settings.model.clone(),
            language: settings.language.clone(),
        })
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    #[instrument(skip(self), fields(audio_path = %audio_path.display()))]
    async fn transcribe(&self, audio_path: &Path) -> Result<String> {
        debug!("Transcribing audio file");

        let file_bytes = tokio::fs::read(audio_path).await?;

        let mut request_builder = CreateTranscriptionRequestArgs::default();
        request_builder
            .file(async_openai::types::AudioInput::from_vec_u8(
                audio_path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("audio.mp3")
                    .to_string(),
                file_bytes,
            ))
            .model(&self.model)
            .response_format(AudioResponseFormat::Json);

        if let Some(lang) = &self.language {
            request_builder.language(lang);
        }

        let request = request_builder
            .build()
            .map_err(|e| OpptakError::Transcription(format!("Failed to build request: {}", e)))?;

        let response = self
            .client
            .audio()
            .transcribe(request)
            .await
            .map_err(|e| OpptakError::Transcription(format!("Whisper API error: {}", e)))?;

        debug!("Received {} characters of transcript", response.text.len());
        Ok(response.text)
    }
}

/// Check if the OpenAI API key is configured.
pub fn is_api_key_configured() -> bool {
    std::env::var("OPENAI_API_KEY").is_ok()
}
