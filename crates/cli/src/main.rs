//! CaptionFlow CLI entry point.
//!
//! This binary is the composition root for the entire system:
//!
//! 1. **Parse configuration**: load `captionflow.toml` (or `--config`),
//!    apply environment overrides and validate.
//! 2. **Wire observability**: `tracing-subscriber` with a text or JSON layer
//!    and an optional OpenTelemetry OTLP exporter.
//! 3. **Construct infrastructure**: the media analyzer and probe, the trend
//!    source, the Gemini-backed generator and the local exporter, injected
//!    into the pipeline as trait objects.
//!    The sentence-embedding model is installed process-wide and loaded on
//!    first use.
//! 4. **Dispatch** to `ingest`, `run`, `score` or `probe`.

mod config;
mod telemetry;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use llm::{FastEmbedder, GeminiConfig, GeminiProvider, LlmCaptionGenerator};
use media::{FfprobeProbe, MediaAnalyzer, MediaTools};
use nodes::{ingest, run_pipeline, Collaborators, IngestOptions, LocalExporter, PipelineSettings};
use pipeline::similarity::{install_shared_embedder, require_shared_embedder};
use pipeline::{scoring, MediaProbe, ScoringContext, TrendSource, UnitScore};
use serde_json::json;
use trends::{HttpTrendFetcher, TrendDiscovery, TrendServiceConfig, Unconfigured};

use crate::config::AppConfig;
use crate::telemetry::LogFormat;

#[derive(Parser)]
#[command(name = "captionflow")]
#[command(author, version, about = "Social media caption generation pipeline")]
struct Cli {
    /// Path to config file (defaults to ./captionflow.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log line format on stderr
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index a directory of assets and write the job's meta.json
    Ingest {
        /// Directory holding the videos, images and text files
        assets_dir: PathBuf,

        /// Job directory to write meta.json into (defaults to the parent of
        /// an `assets` directory, else the assets directory itself)
        #[arg(long)]
        job_dir: Option<PathBuf>,

        #[arg(long)]
        job_id: Option<String>,

        #[arg(long)]
        game_name: Option<String>,

        /// Caption language (defaults to generation.language)
        #[arg(long)]
        lang: Option<String>,
    },

    /// Run the full pipeline on a job directory
    Run {
        /// Directory containing meta.json and the job's assets
        job_dir: PathBuf,
    },

    /// Score one caption offline and print the breakdown as JSON
    Score {
        #[arg(long)]
        caption: String,

        /// Hashtag (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Trend term (repeatable)
        #[arg(long = "trend")]
        trends: Vec<String>,

        /// Media file to probe for media fit
        #[arg(long)]
        media: Option<PathBuf>,
    },

    /// Probe a media file and print its metrics and media fit
    Probe {
        media: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match dispatch(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "captionflow failed");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(cli: Cli) -> anyhow::Result<()> {
    let config = AppConfig::load(cli.config.as_deref())?;
    let _telemetry = telemetry::init(cli.log_format, &config.telemetry)?;
    tracing::debug!(pipeline = ?config.pipeline, "configuration loaded");

    let embedder = FastEmbedder::new(config.embedding.model_config());
    if install_shared_embedder(Box::new(embedder)).is_err() {
        tracing::debug!("embedder already installed");
    }

    match cli.command {
        Commands::Ingest {
            assets_dir,
            job_dir,
            job_id,
            game_name,
            lang,
        } => {
            let job_dir = job_dir.unwrap_or_else(|| default_job_dir(&assets_dir));
            let options = IngestOptions {
                job_id,
                game_name,
                lang: lang.unwrap_or_else(|| config.generation.language.clone()),
            };
            let manifest = ingest(&assets_dir, &job_dir, options)
                .await
                .with_context(|| {
                    format!("assets in {} could not be ingested", assets_dir.display())
                })?;
            println!("{}", serde_json::to_string_pretty(&manifest)?);
            Ok(())
        }
        Commands::Run { job_dir } => run_job(&config, &job_dir).await,
        Commands::Score {
            caption,
            tags,
            trends,
            media,
        } => score_caption(&config, &caption, &tags, &trends, media.as_deref()).await,
        Commands::Probe { media } => probe_media(&config, &media).await,
    }
}

/// `<job>/assets` belongs to `<job>`; any other directory is its own job.
fn default_job_dir(assets_dir: &Path) -> PathBuf {
    match assets_dir.parent() {
        Some(parent) if assets_dir.file_name().is_some_and(|n| n == "assets") => {
            parent.to_path_buf()
        }
        _ => assets_dir.to_path_buf(),
    }
}

fn probe_for(config: &AppConfig) -> FfprobeProbe {
    FfprobeProbe::resolve(config.media.ffprobe_path.as_deref())
        .with_timeout(config.media.tool_timeout())
}

fn trend_source(config: &AppConfig) -> anyhow::Result<Arc<dyn TrendSource>> {
    let Some(endpoint) = &config.trends.endpoint else {
        tracing::info!("no trend endpoint configured; seeds will be used as trend terms");
        return Ok(Arc::new(TrendDiscovery::new(Unconfigured)));
    };
    let fetcher = HttpTrendFetcher::new(TrendServiceConfig {
        endpoint: endpoint.clone(),
        geo: config.trends.geo.clone(),
        language: config.trends.language.clone(),
        timeframe: config.trends.timeframe.clone(),
        timeout: Duration::from_secs(config.trends.timeout_secs),
    })?;
    Ok(Arc::new(TrendDiscovery::new(fetcher)))
}

fn collaborators(config: &AppConfig) -> anyhow::Result<Collaborators> {
    let api_key = config.require_api_key()?;
    let provider = GeminiProvider::new(GeminiConfig {
        endpoint: config.generation.endpoint.clone(),
        model: config.generation.model.clone(),
        api_key: api_key.to_string(),
        temperature: config.generation.temperature,
        timeout: Duration::from_secs(config.generation.timeout_secs),
    })?;

    let tools = MediaTools::resolve(
        config.media.ffprobe_path.as_deref(),
        config.media.ffmpeg_path.as_deref(),
        config.media.asr_command.clone(),
        config.media.captioner_command.clone(),
    );
    if tools.ffprobe.is_none() || tools.ffmpeg.is_none() {
        tracing::warn!(
            ffprobe = tools.ffprobe.is_some(),
            ffmpeg = tools.ffmpeg.is_some(),
            "media tools missing; content understanding will be partial"
        );
    }

    Ok(Collaborators {
        analyzer: Arc::new(MediaAnalyzer::new(tools).with_timeout(config.media.tool_timeout())),
        trends: trend_source(config)?,
        generator: Arc::new(LlmCaptionGenerator::new(provider)),
        probe: Arc::new(probe_for(config)),
        publisher: Arc::new(LocalExporter::new()),
        embedder: None,
    })
}

async fn run_job(config: &AppConfig, job_dir: &Path) -> anyhow::Result<()> {
    let settings = PipelineSettings {
        max_revisions: config.pipeline.max_revisions,
        asr_model: config.media.asr_model.clone(),
        language_hint: config.media.language.clone(),
        default_language: config.generation.language.clone(),
        scoring_policy: config.scoring.policy(),
    };
    let state = run_pipeline(job_dir, collaborators(config)?, &settings)
        .await
        .with_context(|| format!("job {} could not run", job_dir.display()))?;

    let winner = state
        .winner
        .as_ref()
        .and_then(|id| state.variant(id).map(|v| (v, state.score_board.get(id))));
    let summary = json!({
        "job_id": state.job_id(),
        "run_id": state.run_id(),
        "selected": state.winner,
        "caption": winner.map(|(v, _)| v.text.as_str()),
        "hashtags": winner.map(|(v, _)| &v.tags),
        "score": winner.and_then(|(_, s)| s).map(|s| s.total.as_f64()),
        "revisions": state.revision_count(),
        "errors": state.errors(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

/// Probe errors mean unreadable media: zero fit, unknown metrics.
async fn media_fit_for(probe: &FfprobeProbe, media: &Path) -> (pipeline::MediaMetrics, UnitScore) {
    match probe.probe(media).await {
        Ok(m) => (m, scoring::media_fit(&m)),
        Err(e) => {
            tracing::warn!(error = %e, "media unreadable; media fit is zero");
            (pipeline::MediaMetrics::default(), UnitScore::saturating(0.0))
        }
    }
}

async fn score_caption(
    config: &AppConfig,
    caption: &str,
    tags: &[String],
    trends: &[String],
    media: Option<&Path>,
) -> anyhow::Result<()> {
    let (metrics, fit) = match media {
        Some(path) => media_fit_for(&probe_for(config), path).await,
        None => {
            let m = pipeline::MediaMetrics::default();
            (m, scoring::media_fit(&m))
        }
    };
    let policy = config.scoring.policy();
    let mut context = ScoringContext::new(require_shared_embedder()?, trends, metrics, &policy);
    context.media_fit = fit;
    let breakdown = context.score(caption, tags)?;
    println!("{}", serde_json::to_string_pretty(&breakdown)?);
    Ok(())
}

async fn probe_media(config: &AppConfig, media: &Path) -> anyhow::Result<()> {
    let probe = probe_for(config);
    if !probe.is_available() {
        tracing::warn!("ffprobe not found; metrics will be unknown");
    }
    let (metrics, fit) = media_fit_for(&probe, media).await;
    let out = json!({ "metrics": metrics, "media_fit": fit });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assets_directory_defaults_to_its_job() {
        assert_eq!(
            default_job_dir(Path::new("/data/job7/assets")),
            PathBuf::from("/data/job7")
        );
        assert_eq!(
            default_job_dir(Path::new("/data/drops/job8")),
            PathBuf::from("/data/drops/job8")
        );
    }
}
