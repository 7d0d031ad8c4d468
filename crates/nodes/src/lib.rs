//! Pipeline orchestration for CaptionFlow.
//!
//! This crate wires the domain logic in [`pipeline`] to the collaborator
//! traits: one node per stage, the transactional [`NodeExecutor`], the
//! [`PipelineExecutor`] state machine, the job-directory conventions and
//! asset ingestion.
//!
//! ## Architectural Layer
//!
//! **Orchestration layer.** Nodes sequence calls between business logic in
//! the [`pipeline`] crate and infrastructure traits (analysis, trends,
//! generation, probing, export). They contain no scoring or revision rules
//! of their own.

pub mod executor;
pub mod export;
pub mod ingest;
pub mod job;
pub mod orchestrator;
pub mod stages;

use std::path::Path;

use pipeline::{CaptionFlowError, JobState};
use tracing::Instrument;

pub use executor::{NodeExecutor, PipelineNode, StageOutcome};
pub use export::LocalExporter;
pub use ingest::{ingest, IngestOptions};
pub use job::{load_job, load_snapshot, save_snapshot, JobInputs, JobManifest};
pub use orchestrator::{route, Collaborators, Next, PipelineExecutor, PipelineSettings};

/// Runs one job end to end.
///
/// Fails only when the job directory itself is unusable. Stage failures are
/// recorded in the returned state's error log; a snapshot of that state is
/// written to `results/state.json` on a best-effort basis.
pub async fn run_pipeline(
    job_dir: &Path,
    collaborators: Collaborators,
    settings: &PipelineSettings,
) -> Result<JobState, CaptionFlowError> {
    let mut inputs = load_job(job_dir).await?;
    if inputs.manifest.lang.trim().is_empty() {
        inputs.manifest.lang = settings.default_language.clone();
    }
    let state = inputs.into_state(settings.max_revisions);

    let span = tracing::info_span!("job", job_id = %state.job_id(), run_id = %state.run_id());
    async move {
        tracing::info!(media = %state.source_media_path().display(), "job loaded");
        let state = PipelineExecutor::new(collaborators, settings).run(state).await;
        if let Err(e) = save_snapshot(&state).await {
            tracing::warn!(error = %e, "could not write state snapshot");
        }
        Ok(state)
    }
    .instrument(span)
    .await
}
