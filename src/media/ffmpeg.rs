//! FFmpeg-backed media extraction.
//!
//! Drives ffprobe and ffmpeg as external processes. Completion is the
//! child's exit event, never output-file polling, and every invocation is
//! bounded by the configured stage deadline.

use super::{MediaExtractor, MediaProbe};
use crate::config::ExtractionSettings;
use crate::error::{OpptakError, Result};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, instrument};

/// Snapshot output dimensions. Fixed; thumbnails are for previews, not
/// playback.
const SNAPSHOT_WIDTH: u32 = 320;
const SNAPSHOT_HEIGHT: u32 = 240;

/// FFmpeg and ffprobe behind the `MediaExtractor` interface.
pub struct FfmpegExtractor {
    ffmpeg: String,
    ffprobe: String,
    stage_timeout: Duration,
}

impl FfmpegExtractor {
    pub fn new(settings: &ExtractionSettings) -> Self {
        Self {
            ffmpeg: settings.ffmpeg_path.clone(),
            ffprobe: settings.ffprobe_path.clone(),
            stage_timeout: Duration::from_secs(settings.stage_timeout_secs),
        }
    }

    /// Probe container and stream facts with a single ffprobe call.
    #[instrument(skip_all, fields(source = %source.display()))]
    pub async fn probe(&self, source: &Path) -> Result<MediaProbe> {
        let output = self.run_engine(&self.ffprobe, &probe_args(source)).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OpptakError::Extraction(format!(
                "ffprobe could not read source: {}",
                stderr.trim()
            )));
        }

        parse_probe(&String::from_utf8_lossy(&output.stdout))
    }

    /// Run one engine invocation to completion, bounded by the stage
    /// deadline. A child that outlives the deadline is killed on drop.
    async fn run_engine(&self, program: &str, args: &[String]) -> Result<std::process::Output> {
        debug!("Running {} {}", program, args.join(" "));

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        match tokio::time::timeout(self.stage_timeout, cmd.output()).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(OpptakError::ToolNotFound(program.to_string()))
            }
            Ok(Err(e)) => Err(OpptakError::Extraction(format!(
                "{} execution failed: {}",
                program, e
            ))),
            Err(_) => Err(OpptakError::Extraction(format!(
                "{} did not finish within {}s",
                program,
                self.stage_timeout.as_secs()
            ))),
        }
    }
}

#[async_trait]
impl MediaExtractor for FfmpegExtractor {
    #[instrument(skip_all, fields(source = %source.display()))]
    async fn snapshot(&self, source: &Path, out: &Path) -> Result<()> {
        let probe = self.probe(source).await?;
        let midpoint = frame_instant(&probe)?;
        debug!("Capturing frame at {:.3}s", midpoint);

        let output = self
            .run_engine(&self.ffmpeg, &snapshot_args(source, out, midpoint))
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OpptakError::Extraction(format!(
                "frame capture failed: {}",
                stderr.trim()
            )));
        }

        Ok(())
    }

    #[instrument(skip_all, fields(source = %source.display()))]
    async fn extract_audio(&self, source: &Path, out: &Path) -> Result<()> {
        let probe = self.probe(source).await?;

        if !probe.has_audio {
            return Err(OpptakError::Extraction("source has no audio stream".into()));
        }

        let output = self
            .run_engine(&self.ffmpeg, &audio_args(source, out))
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OpptakError::Extraction(format!(
                "audio extraction failed: {}",
                stderr.trim()
            )));
        }

        Ok(())
    }
}

/// ffprobe arguments for a combined format and stream probe.
fn probe_args(source: &Path) -> Vec<String> {
    vec![
        "-v".into(),
        "quiet".into(),
        "-print_format".into(),
        "json".into(),
        "-show_format".into(),
        "-show_streams".into(),
        source.to_string_lossy().into_owned(),
    ]
}

/// Pick the instant to grab the preview frame from: the temporal midpoint
/// of the source. Requires a decodable video stream and a positive
/// duration.
fn frame_instant(probe: &MediaProbe) -> Result<f64> {
    if !probe.has_video {
        return Err(OpptakError::Extraction(
            "source has no decodable video stream".into(),
        ));
    }

    let duration = probe.duration_seconds.unwrap_or(0.0);
    if duration <= 0.0 {
        return Err(OpptakError::Extraction("source has zero duration".into()));
    }

    Ok(duration / 2.0)
}

/// ffmpeg arguments for a single scaled frame at `seek_seconds`.
///
/// `-ss` before `-i` seeks on the demuxer, so a midpoint grab does not
/// decode the first half of the file.
fn snapshot_args(source: &Path, out: &Path, seek_seconds: f64) -> Vec<String> {
    vec![
        "-ss".into(),
        format!("{:.3}", seek_seconds),
        "-i".into(),
        source.to_string_lossy().into_owned(),
        "-frames:v".into(),
        "1".into(),
        "-vf".into(),
        format!("scale={}:{}", SNAPSHOT_WIDTH, SNAPSHOT_HEIGHT),
        "-y".into(),
        "-loglevel".into(),
        "error".into(),
        out.to_string_lossy().into_owned(),
    ]
}

/// ffmpeg arguments for dropping the video track and encoding audio to MP3.
fn audio_args(source: &Path, out: &Path) -> Vec<String> {
    vec![
        "-i".into(),
        source.to_string_lossy().into_owned(),
        "-vn".into(),
        "-codec:a".into(),
        "libmp3lame".into(),
        "-qscale:a".into(),
        "2".into(),
        "-y".into(),
        "-loglevel".into(),
        "error".into(),
        out.to_string_lossy().into_owned(),
    ]
}

/// Parse ffprobe's JSON report into stream facts.
fn parse_probe(json_str: &str) -> Result<MediaProbe> {
    let parsed: serde_json::Value = serde_json::from_str(json_str)
        .map_err(|_| OpptakError::Extraction("Invalid ffprobe output".into()))?;

    let duration_seconds = parsed["format"]["duration"]
        .as_str()
        .and_then(|s| s.parse::<f64>().ok());

    let streams = parsed["streams"].as_array();
    let has_stream = |kind: &str| {
        streams
            .map(|list| {
                list.iter()
                    .any(|stream| stream["codec_type"].as_str() == Some(kind))
            })
            .unwrap_or(false)
    };

    Ok(MediaProbe {
        duration_seconds,
        has_video: has_stream("video"),
        has_audio: has_stream("audio"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_parse_probe_full() {
        let json = r#"{
            "streams": [
                {"codec_type": "video", "codec_name": "h264"},
                {"codec_type": "audio", "codec_name": "aac"}
            ],
            "format": {"duration": "10.500000"}
        }"#;

        let probe = parse_probe(json).unwrap();
        assert!(probe.has_video);
        assert!(probe.has_audio);
        assert_eq!(probe.duration_seconds, Some(10.5));
    }

    #[test]
    fn test_parse_probe_video_only() {
        let json = r#"{
            "streams": [{"codec_type": "video"}],
            "format": {"duration": "4.0"}
        }"#;

        let probe = parse_probe(json).unwrap();
        assert!(probe.has_video);
        assert!(!probe.has_audio);
    }

    #[test]
    fn test_parse_probe_missing_fields() {
        let probe = parse_probe("{}").unwrap();
        assert!(!probe.has_video);
        assert!(!probe.has_audio);
        assert_eq!(probe.duration_seconds, None);
    }

    #[test]
    fn test_parse_probe_rejects_garbage() {
        assert!(parse_probe("not json at all").is_err());
    }

    #[test]
    fn test_frame_instant_is_the_midpoint() {
        let probe = MediaProbe {
            duration_seconds: Some(10.5),
            has_video: true,
            has_audio: true,
        };

        assert_eq!(frame_instant(&probe).unwrap(), 5.25);
    }

    #[test]
    fn test_frame_instant_rejects_videoless_source() {
        let probe = MediaProbe {
            duration_seconds: Some(4.0),
            has_video: false,
            has_audio: true,
        };

        let err = frame_instant(&probe).unwrap_err();
        assert!(matches!(err, OpptakError::Extraction(_)));
        assert!(err.to_string().contains("no decodable video stream"));
    }

    #[test]
    fn test_frame_instant_rejects_zero_duration() {
        // A missing duration counts as zero.
        for duration_seconds in [None, Some(0.0)] {
            let probe = MediaProbe {
                duration_seconds,
                has_video: true,
                has_audio: false,
            };

            let err = frame_instant(&probe).unwrap_err();
            assert!(matches!(err, OpptakError::Extraction(_)));
            assert!(err.to_string().contains("zero duration"));
        }
    }

    #[test]
    fn test_snapshot_args_midpoint_and_scale() {
        let args = snapshot_args(
            &PathBuf::from("/tmp/in.mp4"),
            &PathBuf::from("/tmp/out.jpg"),
            5.25,
        );

        let seek_pos = args.iter().position(|a| a == "-ss").unwrap();
        assert_eq!(args[seek_pos + 1], "5.250");

        // Seek must come before the input for demuxer-level seeking.
        let input_pos = args.iter().position(|a| a == "-i").unwrap();
        assert!(seek_pos < input_pos);

        assert!(args.contains(&"scale=320:240".to_string()));
        assert!(args.contains(&"-frames:v".to_string()));
        assert_eq!(args.last().unwrap(), "/tmp/out.jpg");
    }

    #[test]
    fn test_audio_args_drop_video_encode_mp3() {
        let args = audio_args(&PathBuf::from("/tmp/in.webm"), &PathBuf::from("/tmp/out.mp3"));

        assert!(args.contains(&"-vn".to_string()));
        assert!(args.contains(&"libmp3lame".to_string()));
        assert_eq!(args.last().unwrap(), "/tmp/out.mp3");
    }

    #[tokio::test]
    async fn test_missing_engine_reports_tool_not_found() {
        let extractor = FfmpegExtractor::new(&ExtractionSettings {
            ffmpeg_path: "definitely-not-ffmpeg-xyz".to_string(),
            ffprobe_path: "definitely-not-ffprobe-xyz".to_string(),
            stage_timeout_secs: 5,
        });

        let err = extractor.probe(Path::new("/tmp/nope.mp4")).await.unwrap_err();
        assert!(matches!(err, OpptakError::ToolNotFound(_)));
    }
}
