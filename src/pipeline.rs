//! Ingestion pipeline for Opptak.
//!
//! Sequences one upload through validation, snapshot capture, audio
//! extraction, transcription, and persistence. Scratch files are reclaimed
//! on every exit path; the store only ever sees completed runs.

use crate::config::Settings;
use crate::error::{OpptakError, Result};
use crate::media::{FfmpegExtractor, MediaExtractor};
use crate::store::{NewRecording, RecordingStore, SqliteRecordingStore};
use crate::transcription::{Transcriber, WhisperTranscriber};
use crate::workspace::RunWorkspace;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Video container types accepted for ingestion.
pub const ALLOWED_VIDEO_TYPES: &[&str] = &[
    "video/mp4",
    "video/webm",
    "video/x-m4v",
    "video/x-msvideo",
    "video/x-flv",
    "video/x-matroska",
];

/// Map an accepted media type to the container extension used for the
/// materialized source file.
pub fn extension_for(mime_type: &str) -> &'static str {
    match mime_type.to_ascii_lowercase().as_str() {
        "video/mp4" => "mp4",
        "video/webm" => "webm",
        "video/x-m4v" => "m4v",
        "video/x-msvideo" => "avi",
        "video/x-flv" => "flv",
        "video/x-matroska" => "mkv",
        _ => "bin",
    }
}

/// Guess the media type of a local file from its extension. Returns `None`
/// for containers outside the accepted set.
pub fn mime_for_extension(ext: &str) -> Option<&'static str> {
    match ext.to_ascii_lowercase().as_str() {
        "mp4" => Some("video/mp4"),
        "webm" => Some("video/webm"),
        "m4v" => Some("video/x-m4v"),
        "avi" => Some("video/x-msvideo"),
        "flv" => Some("video/x-flv"),
        "mkv" => Some("video/x-matroska"),
        _ => None,
    }
}

/// Pipeline stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Received,
    SourceWritten,
    SnapshotExtracted,
    AudioExtracted,
    Transcribed,
    Persisted,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Received => "received",
            Stage::SourceWritten => "source_written",
            Stage::SnapshotExtracted => "snapshot_extracted",
            Stage::AudioExtracted => "audio_extracted",
            Stage::Transcribed => "transcribed",
            Stage::Persisted => "persisted",
        };
        write!(f, "{}", name)
    }
}

/// Transient state for one run: its workspace plus the last stage that
/// completed. Owned by the pipeline and gone when `ingest` returns.
struct PipelineRun {
    workspace: RunWorkspace,
    completed: Stage,
}

/// Caller-supplied metadata accompanying the uploaded bytes.
#[derive(Debug, Clone)]
pub struct UploadMeta {
    /// Display name of the upload.
    pub original_name: String,
    /// Declared container type; must be one of `ALLOWED_VIDEO_TYPES`.
    pub mime_type: String,
    /// Byte length of the upload.
    pub size: u64,
}

/// What a successful ingestion hands back to the caller.
#[derive(Debug, Clone)]
pub struct IngestReceipt {
    /// ID of the stored recording.
    pub id: String,
    /// Recognized speech, if the audio carried any.
    pub transcription: Option<String>,
}

/// The main ingestion pipeline. Cloning is cheap; clones share the same
/// components and store.
#[derive(Clone)]
pub struct IngestPipeline {
    extractor: Arc<dyn MediaExtractor>,
    transcriber: Arc<dyn Transcriber>,
    store: Arc<dyn RecordingStore>,
    upload_dir: PathBuf,
    max_upload_bytes: u64,
}

impl IngestPipeline {
    /// Create a pipeline with the default component wiring.
    pub fn new(settings: &Settings) -> Result<Self> {
        let extractor: Arc<dyn MediaExtractor> =
            Arc::new(FfmpegExtractor::new(&settings.extraction));
        let transcriber: Arc<dyn Transcriber> =
            Arc::new(WhisperTranscriber::new(&settings.transcription)?);
        let store: Arc<dyn RecordingStore> =
            Arc::new(SqliteRecordingStore::new(&settings.store_path())?);

        Self::with_components(settings, extractor, transcriber, store)
    }

    /// Create a pipeline with custom components.
    pub fn with_components(
        settings: &Settings,
        extractor: Arc<dyn MediaExtractor>,
        transcriber: Arc<dyn Transcriber>,
        store: Arc<dyn RecordingStore>,
    ) -> Result<Self> {
        let upload_dir = settings.upload_dir();
        std::fs::create_dir_all(&upload_dir)?;

        Ok(Self {
            extractor,
            transcriber,
            store,
            upload_dir,
            max_upload_bytes: settings.ingest.max_upload_bytes,
        })
    }

    /// Get a reference to the recording store.
    pub fn store(&self) -> Arc<dyn RecordingStore> {
        self.store.clone()
    }

    /// Ingest one uploaded video: validate, snapshot, extract audio,
    /// transcribe, persist.
    ///
    /// On success the receipt names the stored recording. On failure the
    /// store is untouched. Either way the run's scratch files are gone
    /// before this returns. The run executes on its own task, so a caller
    /// that stops polling (an upload connection dropped mid-run) detaches
    /// from the run instead of cancelling it: the run still completes and
    /// still cleans up after itself.
    #[instrument(skip(self, bytes), fields(name = %meta.original_name, size = meta.size))]
    pub async fn ingest(&self, bytes: Vec<u8>, meta: UploadMeta) -> Result<IngestReceipt> {
        // Rejects happen before any file I/O.
        self.validate(&meta, bytes.len() as u64)?;

        let workspace = RunWorkspace::allocate(&self.upload_dir, extension_for(&meta.mime_type));

        let pipeline = self.clone();
        let task = tokio::spawn(async move {
            let mut run = PipelineRun {
                workspace,
                completed: Stage::Received,
            };

            let result = pipeline.execute(&mut run, bytes, &meta).await;

            if let Err(e) = &result {
                warn!("Run {} failed after stage {}: {}", run.workspace.run_id, run.completed, e);
            }

            // Exactly one release per run, success or failure.
            run.workspace.release().await;

            result
        });

        task.await?
    }

    /// Check the declared metadata against the acceptance rules. The
    /// declared size must agree with the payload actually handed over, so
    /// the limit checks below hold for the real bytes, not the claim.
    fn validate(&self, meta: &UploadMeta, payload_len: u64) -> Result<()> {
        let accepted = ALLOWED_VIDEO_TYPES
            .iter()
            .any(|t| t.eq_ignore_ascii_case(&meta.mime_type));
        if !accepted {
            return Err(OpptakError::Validation(format!(
                "unsupported media type: {}",
                meta.mime_type
            )));
        }

        if meta.size != payload_len {
            return Err(OpptakError::Validation(format!(
                "declared size {} does not match the {} byte payload",
                meta.size, payload_len
            )));
        }

        if meta.size == 0 {
            return Err(OpptakError::Validation("upload is empty".to_string()));
        }

        if meta.size > self.max_upload_bytes {
            return Err(OpptakError::Validation(format!(
                "upload of {} bytes exceeds the {} byte limit",
                meta.size, self.max_upload_bytes
            )));
        }

        Ok(())
    }

    /// Run the staged part of the pipeline. Cleanup is the caller's job so
    /// that it happens exactly once on every path.
    async fn execute(
        &self,
        run: &mut PipelineRun,
        bytes: Vec<u8>,
        meta: &UploadMeta,
    ) -> Result<IngestReceipt> {
        let ws = &run.workspace;

        tokio::fs::write(&ws.source_path, &bytes).await?;
        run.completed = Stage::SourceWritten;

        self.extractor
            .snapshot(&ws.source_path, &ws.snapshot_path)
            .await?;
        run.completed = Stage::SnapshotExtracted;

        self.extractor
            .extract_audio(&ws.source_path, &ws.audio_path)
            .await?;
        run.completed = Stage::AudioExtracted;

        let text = self.transcriber.transcribe(&ws.audio_path).await?;
        run.completed = Stage::Transcribed;

        // A snapshot that cannot be read back degrades the record, it does
        // not fail the run.
        let snapshot = match tokio::fs::read(&ws.snapshot_path).await {
            Ok(frame) => Some(BASE64.encode(frame)),
            Err(e) => {
                warn!("Snapshot unreadable, storing recording without it: {}", e);
                None
            }
        };

        let transcription = match text.trim() {
            "" => None,
            trimmed => Some(trimmed.to_string()),
        };

        let id = self
            .store
            .insert(NewRecording {
                original_name: meta.original_name.clone(),
                mime_type: meta.mime_type.clone(),
                size: meta.size,
                snapshot,
                transcription: transcription.clone(),
            })
            .await?;
        run.completed = Stage::Persisted;

        info!("Ingested '{}' as recording {}", meta.original_name, id);

        Ok(IngestReceipt { id, transcription })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryRecordingStore, Recording};
    use async_trait::async_trait;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::sync::Notify;

    /// Extractor that writes placeholder artifacts, optionally failing a
    /// chosen stage.
    struct FakeExtractor {
        fail_snapshot: bool,
        fail_audio: bool,
    }

    impl FakeExtractor {
        fn ok() -> Self {
            Self {
                fail_snapshot: false,
                fail_audio: false,
            }
        }
    }

    #[async_trait]
    impl MediaExtractor for FakeExtractor {
        async fn snapshot(&self, _source: &Path, out: &Path) -> Result<()> {
            if self.fail_snapshot {
                return Err(OpptakError::Extraction(
                    "source has no decodable video stream".into(),
                ));
            }
            tokio::fs::write(out, b"jpegbytes").await?;
            Ok(())
        }

        async fn extract_audio(&self, _source: &Path, out: &Path) -> Result<()> {
            if self.fail_audio {
                return Err(OpptakError::Extraction("source has no audio stream".into()));
            }
            tokio::fs::write(out, b"mp3bytes").await?;
            Ok(())
        }
    }

    /// Extractor whose snapshot stage blocks until the test opens the gate.
    struct GatedExtractor {
        gate: Arc<Notify>,
    }

    #[async_trait]
    impl MediaExtractor for GatedExtractor {
        async fn snapshot(&self, _source: &Path, out: &Path) -> Result<()> {
            self.gate.notified().await;
            tokio::fs::write(out, b"jpegbytes").await?;
            Ok(())
        }

        async fn extract_audio(&self, _source: &Path, out: &Path) -> Result<()> {
            tokio::fs::write(out, b"mp3bytes").await?;
            Ok(())
        }
    }

    struct FakeTranscriber {
        text: String,
        fail: bool,
    }

    impl FakeTranscriber {
        fn saying(text: &str) -> Self {
            Self {
                text: text.to_string(),
                fail: false,
            }
        }
    }

    #[async_trait]
    impl Transcriber for FakeTranscriber {
        async fn transcribe(&self, _audio_path: &Path) -> Result<String> {
            if self.fail {
                return Err(OpptakError::Transcription("backend unreachable".into()));
            }
            Ok(self.text.clone())
        }
    }

    /// Store whose writes always fail.
    struct FailingStore;

    #[async_trait]
    impl RecordingStore for FailingStore {
        async fn insert(&self, _rec: NewRecording) -> Result<String> {
            Err(OpptakError::Store("disk full".into()))
        }
        async fn list_all(&self) -> Result<Vec<Recording>> {
            Ok(vec![])
        }
        async fn get(&self, _id: &str) -> Result<Option<Recording>> {
            Ok(None)
        }
        async fn delete(&self, _id: &str) -> Result<bool> {
            Ok(false)
        }
    }

    fn test_settings(upload_dir: &Path) -> Settings {
        let mut settings = Settings::default();
        settings.general.upload_dir = upload_dir.to_string_lossy().into_owned();
        settings
    }

    fn build_pipeline(
        dir: &TempDir,
        extractor: FakeExtractor,
        transcriber: FakeTranscriber,
    ) -> (IngestPipeline, Arc<MemoryRecordingStore>) {
        let store = Arc::new(MemoryRecordingStore::new());
        let pipeline = IngestPipeline::with_components(
            &test_settings(dir.path()),
            Arc::new(extractor),
            Arc::new(transcriber),
            store.clone(),
        )
        .unwrap();
        (pipeline, store)
    }

    fn webm_meta(size: u64) -> UploadMeta {
        UploadMeta {
            original_name: "clip.webm".to_string(),
            mime_type: "video/webm".to_string(),
            size,
        }
    }

    fn scratch_file_count(dir: &TempDir) -> usize {
        std::fs::read_dir(dir.path()).unwrap().count()
    }

    #[tokio::test]
    async fn test_successful_ingest_persists_and_cleans_up() {
        let dir = TempDir::new().unwrap();
        let (pipeline, store) =
            build_pipeline(&dir, FakeExtractor::ok(), FakeTranscriber::saying("hello world"));

        let receipt = pipeline
            .ingest(b"videobytes".to_vec(), webm_meta(10))
            .await
            .unwrap();

        assert_eq!(receipt.transcription.as_deref(), Some("hello world"));

        let listed = store.list_all().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, receipt.id);
        assert_eq!(listed[0].original_name, "clip.webm");
        assert_eq!(listed[0].mime_type, "video/webm");
        assert_eq!(listed[0].size, 10);
        assert_eq!(listed[0].snapshot.as_deref(), Some(BASE64.encode(b"jpegbytes").as_str()));
        assert_eq!(listed[0].transcription.as_deref(), Some("hello world"));

        // All scratch files are gone.
        assert_eq!(scratch_file_count(&dir), 0);
    }

    #[tokio::test]
    async fn test_rejects_unsupported_media_type() {
        let dir = TempDir::new().unwrap();
        let (pipeline, store) =
            build_pipeline(&dir, FakeExtractor::ok(), FakeTranscriber::saying("x"));

        let err = pipeline
            .ingest(
                b"pdfbytes".to_vec(),
                UploadMeta {
                    original_name: "doc.pdf".to_string(),
                    mime_type: "application/pdf".to_string(),
                    size: 8,
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, OpptakError::Validation(_)));
        assert!(store.list_all().await.unwrap().is_empty());
        // Validation rejects before anything touches the disk.
        assert_eq!(scratch_file_count(&dir), 0);
    }

    #[tokio::test]
    async fn test_accepts_media_type_case_insensitively() {
        let dir = TempDir::new().unwrap();
        let (pipeline, _store) =
            build_pipeline(&dir, FakeExtractor::ok(), FakeTranscriber::saying("ok"));

        let receipt = pipeline
            .ingest(
                b"bytes".to_vec(),
                UploadMeta {
                    original_name: "shout.mp4".to_string(),
                    mime_type: "VIDEO/MP4".to_string(),
                    size: 5,
                },
            )
            .await
            .unwrap();

        assert!(!receipt.id.is_empty());
    }

    #[tokio::test]
    async fn test_rejects_empty_and_oversized_uploads() {
        let dir = TempDir::new().unwrap();
        let mut settings = test_settings(dir.path());
        settings.ingest.max_upload_bytes = 16;
        let pipeline = IngestPipeline::with_components(
            &settings,
            Arc::new(FakeExtractor::ok()),
            Arc::new(FakeTranscriber::saying("x")),
            Arc::new(MemoryRecordingStore::new()),
        )
        .unwrap();

        let err = pipeline.ingest(Vec::new(), webm_meta(0)).await.unwrap_err();
        assert!(matches!(err, OpptakError::Validation(_)));

        let err = pipeline
            .ingest(vec![0u8; 32], webm_meta(32))
            .await
            .unwrap_err();
        assert!(matches!(err, OpptakError::Validation(_)));
        assert!(err.to_string().contains("byte limit"));
    }

    #[tokio::test]
    async fn test_rejects_payload_disagreeing_with_declared_size() {
        let dir = TempDir::new().unwrap();
        let (pipeline, store) =
            build_pipeline(&dir, FakeExtractor::ok(), FakeTranscriber::saying("x"));

        // A small declared size must not smuggle a larger payload past the cap.
        let err = pipeline
            .ingest(vec![0u8; 64], webm_meta(10))
            .await
            .unwrap_err();

        assert!(matches!(err, OpptakError::Validation(_)));
        assert!(err.to_string().contains("does not match"));
        assert!(store.list_all().await.unwrap().is_empty());
        assert_eq!(scratch_file_count(&dir), 0);
    }

    #[tokio::test]
    async fn test_snapshot_failure_cleans_up_and_persists_nothing() {
        let dir = TempDir::new().unwrap();
        let (pipeline, store) = build_pipeline(
            &dir,
            FakeExtractor {
                fail_snapshot: true,
                fail_audio: false,
            },
            FakeTranscriber::saying("unreached"),
        );

        let err = pipeline
            .ingest(b"videobytes".to_vec(), webm_meta(10))
            .await
            .unwrap_err();

        assert!(matches!(err, OpptakError::Extraction(_)));
        assert!(store.list_all().await.unwrap().is_empty());
        assert_eq!(scratch_file_count(&dir), 0);
    }

    #[tokio::test]
    async fn test_audioless_source_fails_and_cleans_up() {
        let dir = TempDir::new().unwrap();
        let (pipeline, store) = build_pipeline(
            &dir,
            FakeExtractor {
                fail_snapshot: false,
                fail_audio: true,
            },
            FakeTranscriber::saying("unreached"),
        );

        let err = pipeline
            .ingest(b"videobytes".to_vec(), webm_meta(10))
            .await
            .unwrap_err();

        assert!(matches!(err, OpptakError::Extraction(_)));
        assert!(store.list_all().await.unwrap().is_empty());
        assert_eq!(scratch_file_count(&dir), 0);
    }

    #[tokio::test]
    async fn test_transcription_failure_cleans_up_and_persists_nothing() {
        let dir = TempDir::new().unwrap();
        let (pipeline, store) = build_pipeline(
            &dir,
            FakeExtractor::ok(),
            FakeTranscriber {
                text: String::new(),
                fail: true,
            },
        );

        let err = pipeline
            .ingest(b"videobytes".to_vec(), webm_meta(10))
            .await
            .unwrap_err();

        assert!(matches!(err, OpptakError::Transcription(_)));
        assert!(store.list_all().await.unwrap().is_empty());
        assert_eq!(scratch_file_count(&dir), 0);
    }

    #[tokio::test]
    async fn test_store_failure_still_cleans_up() {
        let dir = TempDir::new().unwrap();
        let pipeline = IngestPipeline::with_components(
            &test_settings(dir.path()),
            Arc::new(FakeExtractor::ok()),
            Arc::new(FakeTranscriber::saying("lost words")),
            Arc::new(FailingStore),
        )
        .unwrap();

        let err = pipeline
            .ingest(b"videobytes".to_vec(), webm_meta(10))
            .await
            .unwrap_err();

        assert!(matches!(err, OpptakError::Store(_)));
        assert_eq!(scratch_file_count(&dir), 0);
    }

    #[tokio::test]
    async fn test_blank_transcript_is_stored_as_none() {
        let dir = TempDir::new().unwrap();
        let (pipeline, store) =
            build_pipeline(&dir, FakeExtractor::ok(), FakeTranscriber::saying("   \n  "));

        let receipt = pipeline
            .ingest(b"videobytes".to_vec(), webm_meta(10))
            .await
            .unwrap();

        assert!(receipt.transcription.is_none());

        let rec = store.get(&receipt.id).await.unwrap().unwrap();
        assert!(rec.transcription.is_none());
        // The snapshot is still there; silence only affects the transcript.
        assert!(rec.snapshot.is_some());
    }

    #[tokio::test]
    async fn test_concurrent_ingests_do_not_interfere() {
        let dir = TempDir::new().unwrap();
        let (pipeline, store) =
            build_pipeline(&dir, FakeExtractor::ok(), FakeTranscriber::saying("busy"));

        let (a, b) = tokio::join!(
            pipeline.ingest(b"first".to_vec(), webm_meta(5)),
            pipeline.ingest(b"second".to_vec(), webm_meta(6)),
        );

        let a = a.unwrap();
        let b = b.unwrap();
        assert_ne!(a.id, b.id);

        assert_eq!(store.list_all().await.unwrap().len(), 2);
        assert_eq!(scratch_file_count(&dir), 0);
    }

    #[tokio::test]
    async fn test_abandoned_caller_does_not_cancel_run() {
        let dir = TempDir::new().unwrap();
        let gate = Arc::new(Notify::new());
        let store = Arc::new(MemoryRecordingStore::new());
        let pipeline = IngestPipeline::with_components(
            &test_settings(dir.path()),
            Arc::new(GatedExtractor { gate: gate.clone() }),
            Arc::new(FakeTranscriber::saying("still here")),
            store.clone(),
        )
        .unwrap();

        // An upload client that disconnects stops polling its request
        // future. Dropping the ingest future mid-run does the same thing.
        let abandoned = tokio::time::timeout(
            Duration::from_millis(20),
            pipeline.ingest(b"videobytes".to_vec(), webm_meta(10)),
        )
        .await;
        assert!(abandoned.is_err());

        // The run is stalled at the snapshot gate, not cancelled. Open the
        // gate and it must still finish, persist, and clean up on its own.
        gate.notify_one();

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let listed = store.list_all().await.unwrap();
            if listed.len() == 1 && scratch_file_count(&dir) == 0 {
                assert_eq!(listed[0].transcription.as_deref(), Some("still here"));
                break;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "run never reached a terminal state after the caller went away"
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[test]
    fn test_extension_mapping_covers_accepted_types() {
        for mime in ALLOWED_VIDEO_TYPES {
            let ext = extension_for(mime);
            assert_ne!(ext, "bin", "no extension mapped for {}", mime);
            assert_eq!(mime_for_extension(ext), Some(*mime));
        }

        assert_eq!(extension_for("video/x-matroska"), "mkv");
        assert_eq!(mime_for_extension("MKV"), Some("video/x-matroska"));
        assert_eq!(mime_for_extension("mov"), None);
    }
}
