use std::sync::Arc;

use async_trait::async_trait;
use pipeline::{CaptionGenerator, GenerationRequest, JobState, ScoreBoard, Stage, StageError};

use crate::executor::PipelineNode;
use crate::job::persist_artifact;

/// Generates caption variants, using the router's critique on a revision
/// pass.
pub struct GenerateNode {
    generator: Arc<dyn CaptionGenerator>,
}

impl GenerateNode {
    pub fn new(generator: Arc<dyn CaptionGenerator>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl PipelineNode for GenerateNode {
    fn stage(&self) -> Stage {
        Stage::Generate
    }

    async fn run(&self, state: &mut JobState) -> Result<(), StageError> {
        let brief = state.brief();
        let request = GenerationRequest {
            job_dir: state.job_dir().to_path_buf(),
            game_name: brief.game_name.clone(),
            language: brief.language.clone(),
            aso_keywords: brief.aso_keywords.clone(),
            description: brief.description.clone(),
            tags: state.content_signals.vision_tags.clone(),
            trend_terms: state.trend_term_strings(),
            critique: state.pending_critique.take(),
        };
        if request.critique.is_some() {
            tracing::info!(revision = state.revision_count(), "regenerating with critique");
        }

        let parsed = self.generator.generate(&request).await?;
        let variants = parsed.into_inner();
        tracing::info!(variants = variants.len(), "variants generated");

        persist_artifact(state.job_dir(), "captions.json", &variants).await;
        state.variants = variants;
        // Scores of the previous pass describe text that no longer exists.
        state.score_board = ScoreBoard::default();
        Ok(())
    }
}
