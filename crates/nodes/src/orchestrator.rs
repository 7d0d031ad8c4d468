//! The pipeline state machine.
//!
//! ```text
//! ContentUnderstanding -> TrendDiscovery -> Generate -> QualityCheck
//!                                              ^             |
//!                                              +-- revise ---+--> Finalize -> Done
//! ```
//!
//! Every stage runs through the [`NodeExecutor`], so a failing stage never
//! stops the run. The only branch is after quality check; the router takes
//! the revise edge only while budget remains, and the revision counter is
//! incremented exactly when that edge is taken.

use std::sync::Arc;

use pipeline::{
    CaptionGenerator, ContentAnalyzer, Embedder, JobState, MediaProbe, Publisher, ScoringPolicy,
    Stage, TrendSource, DEFAULT_MAX_REVISIONS,
};

use crate::executor::{NodeExecutor, PipelineNode};
use crate::stages::{
    ContentUnderstandingNode, FinalizeNode, GenerateNode, QualityCheckNode, TrendDiscoveryNode,
};

/// The external collaborators a run needs.
#[derive(Clone)]
pub struct Collaborators {
    pub analyzer: Arc<dyn ContentAnalyzer>,
    pub trends: Arc<dyn TrendSource>,
    pub generator: Arc<dyn CaptionGenerator>,
    pub probe: Arc<dyn MediaProbe>,
    pub publisher: Arc<dyn Publisher>,
    /// Trend-fit embedder; `None` uses the process-wide instance.
    pub embedder: Option<Arc<dyn Embedder>>,
}

/// Run-level knobs.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub max_revisions: u32,
    /// Speech model passed to content understanding.
    pub asr_model: String,
    /// Spoken-language hint passed to content understanding.
    pub language_hint: String,
    /// Caption language for jobs whose manifest names none.
    pub default_language: String,
    pub scoring_policy: ScoringPolicy,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_revisions: DEFAULT_MAX_REVISIONS,
            asr_model: "base".into(),
            language_hint: "tr".into(),
            default_language: "tr".into(),
            scoring_policy: ScoringPolicy::default(),
        }
    }
}

/// Where the router sends the run next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Next {
    Stage(Stage),
    Done,
}

/// Drives one job through all stages.
pub struct PipelineExecutor {
    executor: NodeExecutor,
    content: ContentUnderstandingNode,
    trend: TrendDiscoveryNode,
    generate: GenerateNode,
    quality: QualityCheckNode,
    finalize: FinalizeNode,
}

impl PipelineExecutor {
    pub fn new(collaborators: Collaborators, settings: &PipelineSettings) -> Self {
        let mut quality =
            QualityCheckNode::new(collaborators.probe, settings.scoring_policy.clone());
        if let Some(embedder) = collaborators.embedder {
            quality = quality.with_embedder(embedder);
        }
        Self {
            executor: NodeExecutor::new(),
            content: ContentUnderstandingNode::new(
                collaborators.analyzer,
                settings.asr_model.clone(),
                settings.language_hint.clone(),
            ),
            trend: TrendDiscoveryNode::new(collaborators.trends),
            generate: GenerateNode::new(collaborators.generator),
            quality,
            finalize: FinalizeNode::new(collaborators.publisher),
        }
    }

    fn node(&self, stage: Stage) -> &dyn PipelineNode {
        match stage {
            Stage::ContentUnderstanding => &self.content,
            Stage::TrendDiscovery => &self.trend,
            Stage::Generate => &self.generate,
            Stage::QualityCheck => &self.quality,
            Stage::Finalize => &self.finalize,
        }
    }

    /// Runs the state machine to completion.
    pub async fn run(&self, mut state: JobState) -> JobState {
        let mut next = Next::Stage(Stage::ContentUnderstanding);
        while let Next::Stage(stage) = next {
            self.executor.execute(self.node(stage), &mut state).await;
            next = route(stage, &mut state);
        }
        tracing::info!(
            errors = state.errors().len(),
            revisions = state.revision_count(),
            winner = ?state.winner,
            "pipeline finished"
        );
        state
    }
}

/// Chooses the successor of `stage`.
///
/// After quality check the revision flag is consumed: on the revise edge the
/// counter is incremented and the verdict's critique is queued for the next
/// generation pass. If quality check failed, the flag was never set and the
/// run proceeds to finalize.
pub fn route(stage: Stage, state: &mut JobState) -> Next {
    match stage {
        Stage::ContentUnderstanding => Next::Stage(Stage::TrendDiscovery),
        Stage::TrendDiscovery => Next::Stage(Stage::Generate),
        Stage::Generate => Next::Stage(Stage::QualityCheck),
        Stage::QualityCheck => {
            let wants_revision = std::mem::take(&mut state.needs_revision);
            if wants_revision && state.begin_revision() {
                state.pending_critique = state.verdict.as_ref().map(|v| v.critique());
                tracing::info!(
                    revision = state.revision_count(),
                    max = state.max_revisions(),
                    "quality below bar; revising"
                );
                Next::Stage(Stage::Generate)
            } else {
                Next::Stage(Stage::Finalize)
            }
        }
        Stage::Finalize => Next::Done,
    }
}
