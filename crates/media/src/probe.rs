//! ffprobe-backed [`MediaProbe`].
//!
//! Runs `ffprobe -v error -select_streams v:0 -show_entries
//! stream=width,height,bit_rate -show_entries format=duration,bit_rate -of json`
//! and maps the first video stream into [`MediaMetrics`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use pipeline::{CollaboratorError, MediaMetrics, MediaProbe};
use serde::Deserialize;

use crate::command::{resolve_tool, ToolCommand, DEFAULT_TIMEOUT};

/// A probe backed by the `ffprobe` CLI.
///
/// If no ffprobe binary is available, or the file does not exist, every
/// field is reported as unknown (zero) rather than failing.
#[derive(Debug, Clone)]
pub struct FfprobeProbe {
    ffprobe_path: Option<PathBuf>,
    timeout: Duration,
}

impl FfprobeProbe {
    pub fn new(ffprobe_path: Option<PathBuf>) -> Self {
        Self {
            ffprobe_path,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Uses `explicit` if given, otherwise looks ffprobe up on `PATH`.
    pub fn resolve(explicit: Option<&Path>) -> Self {
        Self::new(resolve_tool(explicit, "ffprobe"))
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn is_available(&self) -> bool {
        self.ffprobe_path.is_some()
    }
}

#[async_trait]
impl MediaProbe for FfprobeProbe {
    async fn probe(&self, media_path: &Path) -> Result<MediaMetrics, CollaboratorError> {
        let Some(ffprobe) = &self.ffprobe_path else {
            tracing::debug!("ffprobe not found; media metrics unknown");
            return Ok(MediaMetrics::default());
        };
        if !tokio::fs::try_exists(media_path).await.unwrap_or(false) {
            tracing::debug!(path = %media_path.display(), "media missing; metrics unknown");
            return Ok(MediaMetrics::default());
        }

        let output = ToolCommand::new(ffprobe)
            .args(["-v", "error", "-select_streams", "v:0"])
            .args(["-show_entries", "stream=width,height,bit_rate"])
            .args(["-show_entries", "format=duration,bit_rate"])
            .args(["-of", "json"])
            .path_arg(media_path)
            .timeout(self.timeout)
            .execute()
            .await?;

        parse_ffprobe_json(&output.stdout)
    }
}

// ---------------------------------------------------------------------------
// JSON structures
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
    #[serde(default)]
    format: FfprobeFormat,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeStream {
    width: Option<u32>,
    height: Option<u32>,
    bit_rate: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    bit_rate: Option<String>,
}

/// Maps ffprobe's JSON output into [`MediaMetrics`].
///
/// Missing fields become zero; malformed JSON is an error. ffprobe reports
/// numbers as strings, and unparsable ones are treated as missing.
pub fn parse_ffprobe_json(raw: &str) -> Result<MediaMetrics, CollaboratorError> {
    let out: FfprobeOutput =
        serde_json::from_str(raw).map_err(|e| CollaboratorError::InvalidResponse {
            collaborator: "ffprobe".into(),
            message: format!("JSON parse error: {e}"),
        })?;

    let stream = out.streams.into_iter().next().unwrap_or_default();
    let parse_u64 = |s: Option<String>| s.and_then(|v| v.trim().parse::<u64>().ok());
    let bitrate = parse_u64(stream.bit_rate)
        .or_else(|| parse_u64(out.format.bit_rate))
        .unwrap_or(0);
    let duration_seconds = out
        .format
        .duration
        .and_then(|d| d.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0)
        .unwrap_or(0.0);

    Ok(MediaMetrics {
        width: stream.width.unwrap_or(0),
        height: stream.height.unwrap_or(0),
        duration_seconds,
        bitrate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_portrait_clip() {
        let raw = r#"{
            "programs": [],
            "streams": [{"width": 1080, "height": 1920, "bit_rate": "2500000"}],
            "format": {"duration": "29.966667", "bit_rate": "2620000"}
        }"#;
        let m = parse_ffprobe_json(raw).unwrap();
        assert_eq!((m.width, m.height), (1080, 1920));
        assert_eq!(m.bitrate, 2_500_000);
        assert!((m.duration_seconds - 29.966667).abs() < 1e-9);
    }

    #[test]
    fn falls_back_to_container_bitrate() {
        let raw = r#"{"streams": [{"width": 720, "height": 1280}], "format": {"bit_rate": "900000"}}"#;
        let m = parse_ffprobe_json(raw).unwrap();
        assert_eq!(m.bitrate, 900_000);
        assert_eq!(m.duration_seconds, 0.0);
    }

    #[test]
    fn no_streams_means_unknown_metrics() {
        let m = parse_ffprobe_json("{}").unwrap();
        assert!(m.is_unknown());
    }

    #[test]
    fn malformed_output_is_an_error() {
        let err = parse_ffprobe_json("not json").unwrap_err();
        assert!(matches!(err, CollaboratorError::InvalidResponse { .. }));
    }

    #[tokio::test]
    async fn missing_binary_reports_unknown_metrics() {
        let tmp = tempfile::tempdir().unwrap();
        let clip = tmp.path().join("clip.mp4");
        tokio::fs::write(&clip, b"x").await.unwrap();
        let m = FfprobeProbe::new(None).probe(&clip).await.unwrap();
        assert!(m.is_unknown());
    }

    #[tokio::test]
    async fn missing_file_reports_unknown_metrics() {
        let probe = FfprobeProbe::new(Some(PathBuf::from("/nonexistent/ffprobe")));
        let m = probe.probe(Path::new("/nonexistent/clip.mp4")).await.unwrap();
        assert!(m.is_unknown());
    }
}
