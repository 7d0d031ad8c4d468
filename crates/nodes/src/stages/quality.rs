use std::sync::Arc;

use async_trait::async_trait;
use pipeline::revision::evaluate;
use pipeline::similarity::require_shared_embedder;
use pipeline::{
    Embedder, JobState, MediaMetrics, MediaProbe, ScoringContext, ScoringPolicy, Stage,
    StageError, UnitScore,
};

use crate::executor::PipelineNode;
use crate::job::persist_artifact;

/// Scores every variant and decides whether another generation pass is
/// needed.
pub struct QualityCheckNode {
    probe: Arc<dyn MediaProbe>,
    policy: ScoringPolicy,
    embedder: Option<Arc<dyn Embedder>>,
}

impl QualityCheckNode {
    /// Uses the process-wide embedder, looked up when the stage runs.
    pub fn new(probe: Arc<dyn MediaProbe>, policy: ScoringPolicy) -> Self {
        Self {
            probe,
            policy,
            embedder: None,
        }
    }

    /// Uses `embedder` instead of the process-wide one.
    #[must_use]
    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    fn embedder(&self) -> Result<&dyn Embedder, StageError> {
        match &self.embedder {
            Some(e) => Ok(e.as_ref()),
            None => Ok(require_shared_embedder()?),
        }
    }

    /// Probes the source media once per job; later passes reuse the result.
    async fn media(&self, state: &mut JobState) -> (MediaMetrics, UnitScore) {
        if let (Some(metrics), Some(fit)) = (state.media_metrics, state.media_fit) {
            return (metrics, fit);
        }

        let (metrics, fit) = match self.probe.probe(state.source_media_path()).await {
            Ok(metrics) => (metrics, pipeline::scoring::media_fit(&metrics)),
            Err(e) => {
                tracing::warn!(error = %e, "media unreadable; media fit is zero");
                (MediaMetrics::default(), UnitScore::saturating(0.0))
            }
        };
        state.media_metrics = Some(metrics);
        state.media_fit = Some(fit);
        (metrics, fit)
    }
}

#[async_trait]
impl PipelineNode for QualityCheckNode {
    fn stage(&self) -> Stage {
        Stage::QualityCheck
    }

    async fn run(&self, state: &mut JobState) -> Result<(), StageError> {
        if state.variants.is_empty() {
            return Err(StageError::precondition("no variants to score"));
        }

        let embedder = self.embedder()?;
        let (metrics, fit) = self.media(state).await;
        let trend_terms = state.trend_term_strings();
        let mut context = ScoringContext::new(embedder, &trend_terms, metrics, &self.policy);
        context.media_fit = fit;
        let board = context.score_all(&state.variants)?;

        let verdict = evaluate(
            &state.variants,
            &board,
            state.revision_count(),
            state.max_revisions(),
        )
        .ok_or_else(|| StageError::precondition("no variant could be scored"))?;
        tracing::info!(
            best = %verdict.best,
            total = verdict.best_total,
            trend_fit = verdict.best_trend_fit,
            needs_revision = verdict.needs_revision,
            "variants scored"
        );

        persist_artifact(state.job_dir(), "scores.json", &board).await;
        state.score_board = board;
        state.needs_revision = verdict.needs_revision;
        state.verdict = Some(verdict);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeline::{CollaboratorError, HashingEmbedder, JobBrief, JobId, Variant, VariantId};

    struct Unreadable;

    #[async_trait]
    impl MediaProbe for Unreadable {
        async fn probe(
            &self,
            _media_path: &std::path::Path,
        ) -> Result<MediaMetrics, CollaboratorError> {
            Err(CollaboratorError::Unavailable {
                collaborator: "ffprobe".into(),
                reason: "not installed".into(),
            })
        }
    }

    fn scored_state() -> JobState {
        let mut state = JobState::new(
            JobId::new("job").unwrap(),
            "/tmp/job",
            "/tmp/job/clip.mp4",
            JobBrief::default(),
        );
        state.variants = vec![Variant {
            id: VariantId::new("v1").unwrap(),
            text: "Arcade racing tonight".into(),
            tags: vec!["#racing".into()],
        }];
        state
    }

    #[tokio::test]
    async fn injected_embedder_scores_every_variant() {
        let node = QualityCheckNode::new(Arc::new(Unreadable), ScoringPolicy::default())
            .with_embedder(Arc::new(HashingEmbedder::default()));
        let mut state = scored_state();
        node.run(&mut state).await.unwrap();

        assert_eq!(state.score_board.len(), 1);
        assert_eq!(state.media_fit, Some(UnitScore::saturating(0.0)));
        assert!(state.verdict.is_some());
    }

    #[tokio::test]
    async fn missing_embedder_fails_the_stage() {
        let node = QualityCheckNode::new(Arc::new(Unreadable), ScoringPolicy::default());
        let err = node.run(&mut scored_state()).await.unwrap_err();
        assert!(matches!(
            err,
            StageError::Collaborator(CollaboratorError::Unavailable { .. })
        ));
    }
}
