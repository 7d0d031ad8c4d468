//! Builds a job manifest from a local directory of assets.
//!
//! Files are classified by extension. Text assets double as brief inputs:
//! any whose name contains `aso` supplies ASO keywords (one per line or
//! comma-separated), and one whose name starts with `desc` supplies the
//! description. Paths in the written manifest are relative to the job
//! directory whenever the assets live inside it.

use std::path::{Path, PathBuf};

use pipeline::CaptionFlowError;
use walkdir::WalkDir;

use crate::job::{JobFiles, JobManifest, MANIFEST_FILE};

pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "mkv"];
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];
pub const TEXT_EXTENSIONS: &[&str] = &["txt", "json"];

/// Game names outside this length range are not used as guesses.
const GAME_NAME_CHARS: std::ops::RangeInclusive<usize> = 3..=60;

/// Kind of a job asset, by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Video,
    Image,
    Text,
}

impl AssetKind {
    /// Classifies `path` by its (case-insensitive) extension.
    pub fn of(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Some(Self::Video)
        } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Some(Self::Image)
        } else if TEXT_EXTENSIONS.contains(&ext.as_str()) {
            Some(Self::Text)
        } else {
            None
        }
    }
}

/// Caller-supplied manifest fields.
#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    /// Defaults to the job directory name.
    pub job_id: Option<String>,
    pub lang: String,
    /// Used instead of the guess from description and keywords.
    pub game_name: Option<String>,
}

/// Recursively lists the assets under `assets_dir`, sorted by path.
///
/// Unreadable entries are skipped. Paths under `base` are made relative
/// to it.
pub fn index_assets(assets_dir: &Path, base: &Path) -> JobFiles {
    let mut files = JobFiles::default();
    for entry in WalkDir::new(assets_dir)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let path = entry.path();
        let Some(kind) = AssetKind::of(path) else {
            tracing::debug!(path = %path.display(), "skipping unrecognised asset");
            continue;
        };
        let listed = path.strip_prefix(base).unwrap_or(path).to_path_buf();
        match kind {
            AssetKind::Video => files.videos.push(listed),
            AssetKind::Image => files.images.push(listed),
            AssetKind::Text => files.texts.push(listed),
        }
    }
    files
}

/// Splits an ASO keyword file into trimmed, non-empty keywords.
pub fn parse_keywords(raw: &str) -> Vec<String> {
    raw.split(['\n', ','])
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(String::from)
        .collect()
}

/// Picks a game name: the first description line, else the first keyword,
/// when either has a plausible length.
pub fn guess_game_name(aso_keywords: &[String], description: &str) -> Option<String> {
    let plausible = |s: &str| GAME_NAME_CHARS.contains(&s.chars().count());
    let first_line = description.lines().next().unwrap_or_default().trim();
    if plausible(first_line) {
        return Some(first_line.to_string());
    }
    aso_keywords
        .first()
        .map(|k| k.trim())
        .filter(|k| plausible(k))
        .map(String::from)
}

/// Indexes `assets_dir` and writes `<job_dir>/meta.json`.
///
/// Fails with [`CaptionFlowError::FatalInput`] if `assets_dir` is not a
/// directory or the manifest cannot be written. A directory without any
/// video still produces a manifest; [`crate::load_job`] rejects it later.
pub async fn ingest(
    assets_dir: &Path,
    job_dir: &Path,
    options: IngestOptions,
) -> Result<JobManifest, CaptionFlowError> {
    let fatal = |reason: String| CaptionFlowError::FatalInput {
        job_dir: job_dir.to_path_buf(),
        reason,
    };

    if !tokio::fs::metadata(assets_dir)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
    {
        return Err(fatal(format!(
            "assets directory '{}' does not exist",
            assets_dir.display()
        )));
    }

    let (walk_root, base) = (assets_dir.to_path_buf(), job_dir.to_path_buf());
    let files = tokio::task::spawn_blocking(move || index_assets(&walk_root, &base))
        .await
        .map_err(|e| fatal(format!("asset scan failed: {e}")))?;

    let mut aso_keywords = Vec::new();
    let mut description = String::new();
    for text in &files.texts {
        let Some(name) = text.file_name().map(|n| n.to_string_lossy().to_lowercase()) else {
            continue;
        };
        let is_aso = name.contains("aso");
        let is_description = name.starts_with("desc");
        if !is_aso && !is_description {
            continue;
        }
        let raw = match tokio::fs::read(resolve(job_dir, text)).await {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => {
                tracing::warn!(path = %text.display(), error = %e, "cannot read text asset");
                continue;
            }
        };
        if is_aso {
            aso_keywords = parse_keywords(&raw);
        }
        if is_description {
            description = raw.trim().to_string();
        }
    }

    let job_id = options.job_id.or_else(|| {
        job_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
    });
    let game_name = options
        .game_name
        .or_else(|| guess_game_name(&aso_keywords, &description))
        .unwrap_or_else(|| format!("Job {}", job_id.as_deref().unwrap_or("unnamed")));

    let manifest = JobManifest {
        job_id,
        game_name,
        lang: options.lang,
        files,
        aso_keywords,
        description,
    };

    tokio::fs::create_dir_all(job_dir)
        .await
        .map_err(|e| fatal(format!("cannot create job directory: {e}")))?;
    let body = serde_json::to_vec_pretty(&manifest)
        .map_err(|e| fatal(format!("cannot encode {MANIFEST_FILE}: {e}")))?;
    tokio::fs::write(job_dir.join(MANIFEST_FILE), body)
        .await
        .map_err(|e| fatal(format!("cannot write {MANIFEST_FILE}: {e}")))?;

    tracing::info!(
        videos = manifest.files.videos.len(),
        images = manifest.files.images.len(),
        texts = manifest.files.texts.len(),
        aso_keywords = manifest.aso_keywords.len(),
        "assets indexed"
    );
    Ok(manifest)
}

fn resolve(job_dir: &Path, listed: &Path) -> PathBuf {
    if listed.is_absolute() {
        listed.to_path_buf()
    } else {
        job_dir.join(listed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn touch(path: &Path, body: &str) {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.unwrap();
        }
        tokio::fs::write(path, body).await.unwrap();
    }

    #[test]
    fn extensions_are_case_insensitive() {
        assert_eq!(AssetKind::of(Path::new("a/Clip.MOV")), Some(AssetKind::Video));
        assert_eq!(AssetKind::of(Path::new("shot.jpeg")), Some(AssetKind::Image));
        assert_eq!(AssetKind::of(Path::new("notes.json")), Some(AssetKind::Text));
        assert_eq!(AssetKind::of(Path::new("track.mp3")), None);
        assert_eq!(AssetKind::of(Path::new("README")), None);
    }

    #[test]
    fn keywords_split_on_lines_and_commas() {
        assert_eq!(
            parse_keywords("racing game, drift\n\n  arcade  \r\ncars,"),
            vec!["racing game", "drift", "arcade", "cars"]
        );
    }

    #[test]
    fn game_name_prefers_a_short_description_line() {
        let aso = vec!["Neon Drift".to_string()];
        assert_eq!(
            guess_game_name(&aso, "Turbo Racer\nThe best arcade racer"),
            Some("Turbo Racer".into())
        );
        assert_eq!(guess_game_name(&aso, "ok"), Some("Neon Drift".into()));
        assert_eq!(guess_game_name(&[], &"x".repeat(80)), None);
    }

    #[tokio::test]
    async fn ingest_writes_a_loadable_manifest() {
        let tmp = tempfile::tempdir().unwrap();
        let job_dir = tmp.path().join("job42");
        let assets = job_dir.join("assets");
        touch(&assets.join("videos/b.mp4"), "x").await;
        touch(&assets.join("a.mkv"), "x").await;
        touch(&assets.join("cover.PNG"), "x").await;
        touch(&assets.join("aso_keywords.txt"), "racing, drift\narcade\n").await;
        touch(&assets.join("description.txt"), "Turbo Racer\nFast cars at night.\n").await;
        touch(&assets.join("music.mp3"), "x").await;

        let manifest = ingest(
            &assets,
            &job_dir,
            IngestOptions {
                lang: "tr".into(),
                ..IngestOptions::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(manifest.job_id.as_deref(), Some("job42"));
        assert_eq!(manifest.game_name, "Turbo Racer");
        assert_eq!(manifest.aso_keywords, vec!["racing", "drift", "arcade"]);
        assert_eq!(manifest.description, "Turbo Racer\nFast cars at night.");
        assert_eq!(
            manifest.files.videos,
            vec![PathBuf::from("assets/a.mkv"), PathBuf::from("assets/videos/b.mp4")]
        );
        assert_eq!(manifest.files.images, vec![PathBuf::from("assets/cover.PNG")]);
        assert_eq!(manifest.files.texts.len(), 2);

        let inputs = crate::load_job(&job_dir).await.unwrap();
        assert_eq!(inputs.job_id.as_str(), "job42");
        assert_eq!(inputs.source_media, job_dir.join("assets/a.mkv"));
        assert_eq!(inputs.manifest, manifest);
    }

    #[tokio::test]
    async fn game_name_falls_back_to_the_job_id() {
        let tmp = tempfile::tempdir().unwrap();
        let job_dir = tmp.path().join("abc");
        touch(&job_dir.join("assets/clip.mp4"), "x").await;

        let manifest = ingest(&job_dir.join("assets"), &job_dir, IngestOptions::default())
            .await
            .unwrap();
        assert_eq!(manifest.game_name, "Job abc");
        assert!(manifest.aso_keywords.is_empty());
    }

    #[tokio::test]
    async fn missing_assets_directory_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let err = ingest(&tmp.path().join("nope"), tmp.path(), IngestOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CaptionFlowError::FatalInput { .. }));
        assert!(!tmp.path().join(MANIFEST_FILE).exists());
    }
}
