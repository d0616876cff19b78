//! Ingest command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::pipeline::{mime_for_extension, IngestPipeline, UploadMeta};
use anyhow::Result;
use std::path::Path;

/// Run the ingest command on a local video file.
pub async fn run_ingest(file: &str, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Ingest, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'opptak doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let path = Path::new(file);
    if !path.exists() {
        Output::error(&format!("File not found: {}", file));
        return Err(anyhow::anyhow!("File not found: {}", file));
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    let mime_type = match mime_for_extension(extension) {
        Some(mime) => mime,
        None => {
            Output::error(&format!("Unsupported video container: .{}", extension));
            Output::info("Supported: mp4, webm, m4v, avi, flv, mkv");
            return Err(anyhow::anyhow!("Unsupported video container"));
        }
    };

    let original_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("recording")
        .to_string();

    Output::info(&format!("Processing: {}", file));

    let data = tokio::fs::read(path).await?;
    let meta = UploadMeta {
        original_name,
        mime_type: mime_type.to_string(),
        size: data.len() as u64,
    };

    let pipeline = IngestPipeline::new(&settings)?;

    let spinner = Output::spinner("Extracting and transcribing...");
    let result = pipeline.ingest(data, meta).await;
    spinner.finish_and_clear();

    match result {
        Ok(receipt) => {
            Output::success(&format!("Ingested as recording {}", receipt.id));
            match receipt.transcription {
                Some(text) => {
                    println!();
                    Output::header("Transcript");
                    println!("{}", text);
                }
                None => {
                    Output::warning("No speech was recognized in the audio track.");
                }
            }
            Ok(())
        }
        Err(e) => {
            Output::error(&format!("Ingestion failed: {}", e));
            Err(e.into())
        }
    }
}
