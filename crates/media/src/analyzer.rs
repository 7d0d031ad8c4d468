//! Best-effort [`ContentAnalyzer`] built from external media tools.
//!
//! Each sub-feature degrades independently: without ffprobe there are no
//! scenes, without ffmpeg there are no keyframes or transcript, without an
//! ASR command there is no transcript, without a captioner there are no
//! vision tags.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use pipeline::{
    AnalysisRequest, CollaboratorError, ContentAnalyzer, ContentSignals, FrameCaption, MediaProbe,
    Scene,
};

use crate::command::{resolve_tool, ToolCommand, DEFAULT_TIMEOUT};
use crate::probe::FfprobeProbe;
use crate::scenes::{
    detect_cuts, extract_scenes, fixed_segments, scenes_from_cuts, MAX_SCENES, SEGMENT_SECONDS,
};
use crate::tags::{aggregate_tags, tags_from_caption};
use crate::transcript::transcribe_to_srt;

/// Locations of the external tools, resolved once at start-up.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaTools {
    pub ffprobe: Option<PathBuf>,
    pub ffmpeg: Option<PathBuf>,
    /// Speech-recognition command; transcription is skipped when absent.
    pub asr_command: Option<PathBuf>,
    /// Image-captioning command, invoked as `<cmd> <image>`, printing one
    /// caption on stdout. Vision tags are skipped when absent.
    pub captioner_command: Option<PathBuf>,
}

impl MediaTools {
    /// Fills ffprobe and ffmpeg from `PATH` where not given explicitly.
    pub fn resolve(
        ffprobe: Option<&Path>,
        ffmpeg: Option<&Path>,
        asr_command: Option<PathBuf>,
        captioner_command: Option<PathBuf>,
    ) -> Self {
        Self {
            ffprobe: resolve_tool(ffprobe, "ffprobe"),
            ffmpeg: resolve_tool(ffmpeg, "ffmpeg"),
            asr_command,
            captioner_command,
        }
    }
}

/// Scene, transcript and vision-tag extraction.
#[derive(Debug, Clone)]
pub struct MediaAnalyzer {
    tools: MediaTools,
    timeout: Duration,
}

impl MediaAnalyzer {
    pub fn new(tools: MediaTools) -> Self {
        Self {
            tools,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn scenes(&self, media_path: &Path, results_dir: &Path) -> Vec<Scene> {
        let probe = FfprobeProbe::new(self.tools.ffprobe.clone()).with_timeout(self.timeout);
        let duration = match probe.probe(media_path).await {
            Ok(m) => m.duration_seconds,
            Err(e) => {
                tracing::warn!(error = %e, "cannot read media duration; no scenes");
                0.0
            }
        };
        let cuts = match &self.tools.ffmpeg {
            Some(ffmpeg) => detect_cuts(ffmpeg, media_path, self.timeout)
                .await
                .inspect_err(|e| tracing::warn!(error = %e, "scene detection failed"))
                .unwrap_or_default(),
            None => Vec::new(),
        };
        let mut segments = scenes_from_cuts(&cuts, duration, MAX_SCENES);
        if segments.is_empty() {
            tracing::debug!(duration, "no scene cuts; using fixed segments");
            segments = fixed_segments(duration, SEGMENT_SECONDS, MAX_SCENES);
        }
        extract_scenes(
            self.tools.ffmpeg.as_deref(),
            media_path,
            &segments,
            &results_dir.join("frames"),
            self.timeout,
        )
        .await
    }

    async fn transcript(&self, request: &AnalysisRequest, results_dir: &Path) -> Option<PathBuf> {
        let (Some(ffmpeg), Some(asr)) = (&self.tools.ffmpeg, &self.tools.asr_command) else {
            tracing::debug!("transcription not configured");
            return None;
        };
        match transcribe_to_srt(
            ffmpeg,
            asr,
            &request.media_path,
            results_dir,
            &request.asr_model_hint,
            &request.language_hint,
            self.timeout,
        )
        .await
        {
            Ok(srt) => Some(srt),
            Err(e) => {
                tracing::warn!(error = %e, "transcription failed");
                None
            }
        }
    }

    /// Captions each keyframe. Frames the captioner fails on are skipped.
    async fn caption_frames(&self, scenes: &[Scene]) -> Vec<FrameCaption> {
        let Some(captioner) = &self.tools.captioner_command else {
            return Vec::new();
        };
        let mut captions = Vec::new();
        for frame in scenes.iter().filter_map(|s| s.keyframe.as_deref()).take(MAX_SCENES) {
            match ToolCommand::new(captioner)
                .path_arg(frame)
                .timeout(self.timeout)
                .execute()
                .await
            {
                Ok(out) => {
                    let caption = out.stdout.trim().to_string();
                    captions.push(FrameCaption {
                        frame: frame.to_path_buf(),
                        tags: tags_from_caption(&caption),
                        caption,
                    });
                }
                Err(e) => tracing::debug!(error = %e, frame = %frame.display(), "captioning failed"),
            }
        }
        captions
    }
}

#[async_trait]
impl ContentAnalyzer for MediaAnalyzer {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<ContentSignals, CollaboratorError> {
        let results_dir = request.job_dir.join("results");
        tokio::fs::create_dir_all(&results_dir)
            .await
            .map_err(|e| CollaboratorError::io(&results_dir, &e))?;

        let scenes = self.scenes(&request.media_path, &results_dir).await;
        let scenes_path = results_dir.join("scenes.json");
        let body = serde_json::to_vec_pretty(&scenes).map_err(|e| CollaboratorError::InvalidResponse {
            collaborator: "scenes".into(),
            message: e.to_string(),
        })?;
        if let Err(e) = tokio::fs::write(&scenes_path, body).await {
            tracing::warn!(error = %e, "failed to write scenes.json");
        }

        let transcript_ref = self.transcript(request, &results_dir).await;
        let frame_captions = self.caption_frames(&scenes).await;
        let vision_tags = aggregate_tags(frame_captions.iter().map(|c| c.tags.as_slice()));

        Ok(ContentSignals {
            scenes,
            transcript_ref,
            frame_captions,
            vision_tags,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn without_tools_every_signal_degrades_to_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let clip = tmp.path().join("clip.mp4");
        tokio::fs::write(&clip, b"x").await.unwrap();

        let analyzer = MediaAnalyzer::new(MediaTools::default());
        let signals = analyzer
            .analyze(&AnalysisRequest {
                job_dir: tmp.path().to_path_buf(),
                media_path: clip,
                asr_model_hint: "base".into(),
                language_hint: "tr".into(),
            })
            .await
            .unwrap();

        assert!(signals.scenes.is_empty());
        assert!(signals.transcript_ref.is_none());
        assert!(signals.frame_captions.is_empty());
        assert!(signals.vision_tags.is_empty());
        assert!(tmp.path().join("results/scenes.json").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn each_keyframe_keeps_its_own_caption_and_tags() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let captioner = tmp.path().join("caption.sh");
        std::fs::write(
            &captioner,
            "#!/bin/sh\ncase \"$1\" in\n  *a.jpg) echo 'A red car racing' ;;\n  *) echo 'Neon city streets' ;;\nesac\n",
        )
        .unwrap();
        std::fs::set_permissions(&captioner, std::fs::Permissions::from_mode(0o755)).unwrap();

        let analyzer = MediaAnalyzer::new(MediaTools {
            captioner_command: Some(captioner),
            ..MediaTools::default()
        });
        let scene = |start: f64, keyframe: Option<&str>| Scene {
            start,
            end: start + 5.0,
            keyframe: keyframe.map(|k| tmp.path().join(k)),
        };
        let scenes = vec![
            scene(0.0, Some("a.jpg")),
            scene(5.0, None),
            scene(10.0, Some("b.jpg")),
        ];

        let captions = analyzer.caption_frames(&scenes).await;

        assert_eq!(captions.len(), 2);
        assert_eq!(captions[0].frame, tmp.path().join("a.jpg"));
        assert_eq!(captions[0].caption, "A red car racing");
        assert_eq!(captions[0].tags, vec!["red", "car", "racing"]);
        assert_eq!(captions[1].caption, "Neon city streets");
        assert_eq!(captions[1].tags, vec!["neon", "city", "streets"]);
    }
}
