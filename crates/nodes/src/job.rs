//! Job directory layout: manifest loading, trend seeds, artifact and
//! snapshot persistence.
//!
//! ```text
//! <job_dir>/
//!   meta.json                 manifest (required)
//!   assets/...                source media and text assets
//!   results/                  everything the pipeline writes
//!     state.json              final job-state snapshot
//! ```

use std::path::{Path, PathBuf};

use pipeline::{CaptionFlowError, JobBrief, JobId, JobState};
use serde::{Deserialize, Serialize};

/// Manifest file name inside a job directory.
pub const MANIFEST_FILE: &str = "meta.json";
/// Directory (relative to the job directory) for pipeline outputs.
pub const RESULTS_DIR: &str = "results";
/// Snapshot file name inside the results directory.
pub const SNAPSHOT_FILE: &str = "state.json";

/// Asset lists from the manifest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobFiles {
    #[serde(default)]
    pub videos: Vec<PathBuf>,
    #[serde(default)]
    pub images: Vec<PathBuf>,
    #[serde(default)]
    pub texts: Vec<PathBuf>,
}

/// Contents of `meta.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobManifest {
    #[serde(default)]
    pub job_id: Option<String>,
    #[serde(default)]
    pub game_name: String,
    #[serde(default)]
    pub lang: String,
    #[serde(default)]
    pub files: JobFiles,
    #[serde(default)]
    pub aso_keywords: Vec<String>,
    #[serde(default)]
    pub description: String,
}

impl JobManifest {
    /// The brief handed to the generation stage.
    pub fn brief(&self) -> JobBrief {
        JobBrief {
            game_name: self.game_name.clone(),
            language: self.lang.clone(),
            aso_keywords: self.aso_keywords.clone(),
            description: self.description.clone(),
        }
    }
}

/// Everything needed to start a run, validated.
#[derive(Debug, Clone)]
pub struct JobInputs {
    pub job_id: JobId,
    pub job_dir: PathBuf,
    pub source_media: PathBuf,
    pub manifest: JobManifest,
}

impl JobInputs {
    /// Builds the initial state for a run.
    pub fn into_state(self, max_revisions: u32) -> JobState {
        let brief = self.manifest.brief();
        JobState::new(self.job_id, self.job_dir, self.source_media, brief)
            .with_max_revisions(max_revisions)
    }
}

/// Loads and validates a job directory.
///
/// Fails with [`CaptionFlowError::FatalInput`] if the manifest is missing or
/// unreadable, lists no video, or the first video does not exist.
pub async fn load_job(job_dir: &Path) -> Result<JobInputs, CaptionFlowError> {
    let fatal = |reason: String| CaptionFlowError::FatalInput {
        job_dir: job_dir.to_path_buf(),
        reason,
    };

    let manifest_path = job_dir.join(MANIFEST_FILE);
    let raw = tokio::fs::read_to_string(&manifest_path)
        .await
        .map_err(|e| fatal(format!("cannot read {}: {e}", manifest_path.display())))?;
    let manifest: JobManifest = serde_json::from_str(&raw)
        .map_err(|e| fatal(format!("invalid {MANIFEST_FILE}: {e}")))?;

    let Some(first) = manifest.files.videos.first() else {
        return Err(fatal("no source media listed in manifest".into()));
    };
    let source_media = if first.is_absolute() {
        first.clone()
    } else {
        job_dir.join(first)
    };
    if !tokio::fs::try_exists(&source_media).await.unwrap_or(false) {
        return Err(fatal(format!(
            "source media '{}' does not exist",
            source_media.display()
        )));
    }

    let job_id = manifest
        .job_id
        .clone()
        .and_then(|id| JobId::new(id))
        .or_else(|| {
            job_dir
                .file_name()
                .and_then(|n| JobId::new(n.to_string_lossy().into_owned()))
        })
        .ok_or_else(|| fatal("cannot determine a job id".into()))?;

    Ok(JobInputs {
        job_id,
        job_dir: job_dir.to_path_buf(),
        source_media,
        manifest,
    })
}

/// Raw trend seeds for a state: ASO keywords, game name, description, then
/// vision tags. Normalisation is the trend source's job.
pub fn trend_seeds(state: &JobState) -> Vec<String> {
    let brief = state.brief();
    let mut seeds = brief.aso_keywords.clone();
    if !brief.game_name.trim().is_empty() {
        seeds.push(brief.game_name.clone());
    }
    if !brief.description.trim().is_empty() {
        seeds.push(brief.description.clone());
    }
    seeds.extend(state.content_signals.vision_tags.iter().cloned());
    seeds
}

/// The results directory of a job.
pub fn results_dir(job_dir: &Path) -> PathBuf {
    job_dir.join(RESULTS_DIR)
}

/// Writes `value` as pretty JSON to `results/<name>`, creating the directory.
pub async fn write_result_json<T: Serialize + ?Sized>(
    job_dir: &Path,
    name: &str,
    value: &T,
) -> std::io::Result<PathBuf> {
    let dir = results_dir(job_dir);
    tokio::fs::create_dir_all(&dir).await?;
    let path = dir.join(name);
    let body = serde_json::to_vec_pretty(value).map_err(std::io::Error::other)?;
    tokio::fs::write(&path, body).await?;
    Ok(path)
}

/// Best-effort variant of [`write_result_json`] for intermediate artifacts:
/// failures are logged, never propagated.
pub async fn persist_artifact<T: Serialize + ?Sized>(job_dir: &Path, name: &str, value: &T) {
    if let Err(e) = write_result_json(job_dir, name, value).await {
        tracing::warn!(artifact = name, error = %e, "failed to write artifact");
    }
}

/// Writes the full job state to `results/state.json`.
pub async fn save_snapshot(state: &JobState) -> Result<PathBuf, CaptionFlowError> {
    write_result_json(state.job_dir(), SNAPSHOT_FILE, state)
        .await
        .map_err(|e| CaptionFlowError::Snapshot {
            message: e.to_string(),
        })
}

/// Reads a snapshot previously written by [`save_snapshot`].
pub async fn load_snapshot(job_dir: &Path) -> Result<JobState, CaptionFlowError> {
    let path = results_dir(job_dir).join(SNAPSHOT_FILE);
    let raw = tokio::fs::read_to_string(&path)
        .await
        .map_err(|e| CaptionFlowError::Snapshot {
            message: format!("cannot read {}: {e}", path.display()),
        })?;
    serde_json::from_str(&raw).map_err(|e| CaptionFlowError::Snapshot {
        message: format!("invalid snapshot: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn write_manifest(dir: &Path, value: serde_json::Value) {
        tokio::fs::write(dir.join(MANIFEST_FILE), value.to_string())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn missing_manifest_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let err = load_job(tmp.path()).await.unwrap_err();
        assert!(matches!(err, CaptionFlowError::FatalInput { .. }));
    }

    #[tokio::test]
    async fn manifest_without_video_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        write_manifest(tmp.path(), json!({"game_name": "Racer", "files": {"videos": []}})).await;
        let err = load_job(tmp.path()).await.unwrap_err();
        assert!(err.to_string().contains("no source media"));
    }

    #[tokio::test]
    async fn listed_but_missing_video_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        write_manifest(tmp.path(), json!({"files": {"videos": ["assets/gone.mp4"]}})).await;
        let err = load_job(tmp.path()).await.unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[tokio::test]
    async fn relative_video_paths_resolve_against_job_dir() {
        let tmp = tempfile::tempdir().unwrap();
        tokio::fs::create_dir_all(tmp.path().join("assets")).await.unwrap();
        tokio::fs::write(tmp.path().join("assets/clip.mp4"), b"x").await.unwrap();
        write_manifest(
            tmp.path(),
            json!({
                "job_id": "abc123",
                "game_name": "Racer",
                "lang": "tr",
                "files": {"videos": ["assets/clip.mp4"]},
                "aso_keywords": ["racing"],
                "description": "Fast cars"
            }),
        )
        .await;

        let inputs = load_job(tmp.path()).await.unwrap();
        assert_eq!(inputs.job_id.as_str(), "abc123");
        assert_eq!(inputs.source_media, tmp.path().join("assets/clip.mp4"));
        assert_eq!(inputs.manifest.brief().language, "tr");
    }

    #[tokio::test]
    async fn snapshot_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let mut state = JobState::new(
            JobId::new("job").unwrap(),
            tmp.path(),
            tmp.path().join("clip.mp4"),
            JobBrief::default(),
        );
        state.record_error(pipeline::Stage::Generate, "boom");
        let path = save_snapshot(&state).await.unwrap();
        assert!(path.ends_with("results/state.json"));

        let back = load_snapshot(tmp.path()).await.unwrap();
        assert_eq!(back.errors().len(), 1);
    }
}
