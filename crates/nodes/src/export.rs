//! Writes final artifacts into the job's results directory.
//!
//! Besides the three result files, the exporter packs a `bundle.zip` with
//! everything a reviewer needs: the result files, the subtitles and scene
//! list when content understanding produced them, and the first few
//! keyframes.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use pipeline::{CollaboratorError, PublishedArtifacts, Publisher, ScoreBoard, Variant, VariantId};
use serde::Serialize;

use crate::job::{results_dir, write_result_json};

pub const CAPTIONS_FILE: &str = "captions.json";
pub const HASHTAGS_FILE: &str = "hashtags.txt";
pub const SUMMARY_FILE: &str = "summary.json";
pub const BUNDLE_FILE: &str = "bundle.zip";

/// Result files packed into the bundle when present, in this order.
const BUNDLED_FILES: [&str; 5] = [
    CAPTIONS_FILE,
    HASHTAGS_FILE,
    "subtitles.srt",
    "scenes.json",
    SUMMARY_FILE,
];
/// Keyframes packed into the bundle, taken in file-name order.
const BUNDLED_FRAMES: usize = 6;

/// Contents of `summary.json`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary<'a> {
    pub selected: &'a VariantId,
    pub caption: &'a str,
    pub hashtags: &'a [String],
    pub score: f64,
}

#[derive(Serialize)]
struct CaptionsFile<'a> {
    variants: &'a [Variant],
}

/// [`Publisher`] that writes plain files next to the job.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalExporter;

impl LocalExporter {
    pub fn new() -> Self {
        Self
    }
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> CollaboratorError + '_ {
    move |e| CollaboratorError::io(path, &e)
}

/// Zips the bundled files found in `results`. Blocking.
fn write_bundle(results: &Path) -> std::io::Result<PathBuf> {
    let mut entries: Vec<(String, PathBuf)> = BUNDLED_FILES
        .iter()
        .map(|name| (name.to_string(), results.join(name)))
        .filter(|(_, path)| path.is_file())
        .collect();

    let frames_dir = results.join("frames");
    if frames_dir.is_dir() {
        let mut frames: Vec<PathBuf> = std::fs::read_dir(&frames_dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file())
            .collect();
        frames.sort();
        for path in frames.into_iter().take(BUNDLED_FRAMES) {
            if let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) {
                entries.push((format!("frames/{name}"), path));
            }
        }
    }

    let bundle = results.join(BUNDLE_FILE);
    let mut zip = zip::ZipWriter::new(File::create(&bundle)?);
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);
    for (name, path) in entries {
        zip.start_file(name, options).map_err(std::io::Error::other)?;
        zip.write_all(&std::fs::read(&path)?)?;
    }
    zip.finish().map_err(std::io::Error::other)?;
    Ok(bundle)
}

#[async_trait]
impl Publisher for LocalExporter {
    async fn publish(
        &self,
        job_dir: &Path,
        variants: &[Variant],
        board: &ScoreBoard,
        winner: &VariantId,
    ) -> Result<PublishedArtifacts, CollaboratorError> {
        let best = variants
            .iter()
            .find(|v| &v.id == winner)
            .ok_or_else(|| CollaboratorError::InvalidResponse {
                collaborator: "exporter".into(),
                message: format!("winner '{winner}' is not among the variants"),
            })?;
        let score = board
            .get(winner)
            .map(|b| b.total.as_f64())
            .unwrap_or_default();

        let dir = results_dir(job_dir);
        let mut files: Vec<PathBuf> = Vec::with_capacity(4);

        let path = dir.join(CAPTIONS_FILE);
        write_result_json(job_dir, CAPTIONS_FILE, &CaptionsFile { variants })
            .await
            .map_err(io_err(&path))?;
        files.push(path);

        let path = dir.join(HASHTAGS_FILE);
        tokio::fs::write(&path, best.tags.join(" "))
            .await
            .map_err(io_err(&path))?;
        files.push(path);

        let summary = Summary {
            selected: winner,
            caption: &best.text,
            hashtags: &best.tags,
            score,
        };
        let path = dir.join(SUMMARY_FILE);
        write_result_json(job_dir, SUMMARY_FILE, &summary)
            .await
            .map_err(io_err(&path))?;
        files.push(path);

        let bundle_path = dir.join(BUNDLE_FILE);
        let results = dir.clone();
        let bundle = tokio::task::spawn_blocking(move || write_bundle(&results))
            .await
            .map_err(|e| CollaboratorError::io(&bundle_path, &std::io::Error::other(e)))?
            .map_err(io_err(&bundle_path))?;
        files.push(bundle);

        tracing::info!(winner = %winner, score, "artifacts exported");
        Ok(PublishedArtifacts { files })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeline::{HashingEmbedder, MediaMetrics, ScoringContext, ScoringPolicy};

    fn variant(id: &str, text: &str, tags: &[&str]) -> Variant {
        Variant {
            id: VariantId::new(id).unwrap(),
            text: text.into(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn writes_captions_hashtags_and_summary() {
        let tmp = tempfile::tempdir().unwrap();
        let variants = vec![
            variant("v1", "Race now", &["#race", "#cars"]),
            variant("v2", "Drift hard", &["#drift"]),
        ];
        let embedder = HashingEmbedder::default();
        let policy = ScoringPolicy::default();
        let board = ScoringContext::new(&embedder, &[], MediaMetrics::default(), &policy)
            .score_all(&variants)
            .unwrap();
        let winner = VariantId::new("v1").unwrap();

        let out = LocalExporter::new()
            .publish(tmp.path(), &variants, &board, &winner)
            .await
            .unwrap();
        assert_eq!(out.files.len(), 4);

        let tags = tokio::fs::read_to_string(tmp.path().join("results/hashtags.txt"))
            .await
            .unwrap();
        assert_eq!(tags, "#race #cars");

        let summary: serde_json::Value = serde_json::from_str(
            &tokio::fs::read_to_string(tmp.path().join("results/summary.json"))
                .await
                .unwrap(),
        )
        .unwrap();
        assert_eq!(summary["selected"], "v1");
        assert_eq!(summary["caption"], "Race now");
        assert_eq!(
            summary["score"].as_f64().unwrap(),
            board.get(&winner).unwrap().total.as_f64()
        );
    }

    #[tokio::test]
    async fn bundle_packs_results_and_first_six_frames() {
        let tmp = tempfile::tempdir().unwrap();
        let frames = tmp.path().join("results/frames");
        tokio::fs::create_dir_all(&frames).await.unwrap();
        for i in 1..=8 {
            tokio::fs::write(frames.join(format!("scene_{i:02}.jpg")), b"jpg")
                .await
                .unwrap();
        }
        tokio::fs::write(tmp.path().join("results/subtitles.srt"), "1\n")
            .await
            .unwrap();

        let variants = vec![variant("v1", "Race now", &["#race"])];
        let winner = VariantId::new("v1").unwrap();
        let out = LocalExporter::new()
            .publish(tmp.path(), &variants, &ScoreBoard::default(), &winner)
            .await
            .unwrap();
        let bundle = out.files.last().unwrap();
        assert!(bundle.ends_with("results/bundle.zip"));

        let archive = zip::ZipArchive::new(std::fs::File::open(bundle).unwrap()).unwrap();
        let mut names: Vec<&str> = archive.file_names().collect();
        names.sort_unstable();
        assert_eq!(
            names,
            vec![
                "captions.json",
                "frames/scene_01.jpg",
                "frames/scene_02.jpg",
                "frames/scene_03.jpg",
                "frames/scene_04.jpg",
                "frames/scene_05.jpg",
                "frames/scene_06.jpg",
                "hashtags.txt",
                "subtitles.srt",
                "summary.json",
            ]
        );
    }

    #[tokio::test]
    async fn unknown_winner_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let variants = vec![variant("v1", "Race now", &["#race"])];
        let err = LocalExporter::new()
            .publish(
                tmp.path(),
                &variants,
                &ScoreBoard::default(),
                &VariantId::new("v9").unwrap(),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("v9"));
    }
}
