use std::sync::Arc;

use async_trait::async_trait;
use pipeline::{AnalysisRequest, ContentAnalyzer, JobState, Stage, StageError};

use crate::executor::PipelineNode;
use crate::job::persist_artifact;

/// Runs scene, speech and frame analysis over the source media.
pub struct ContentUnderstandingNode {
    analyzer: Arc<dyn ContentAnalyzer>,
    asr_model: String,
    language: String,
}

impl ContentUnderstandingNode {
    pub fn new(
        analyzer: Arc<dyn ContentAnalyzer>,
        asr_model: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            analyzer,
            asr_model: asr_model.into(),
            language: language.into(),
        }
    }
}

#[async_trait]
impl PipelineNode for ContentUnderstandingNode {
    fn stage(&self) -> Stage {
        Stage::ContentUnderstanding
    }

    async fn run(&self, state: &mut JobState) -> Result<(), StageError> {
        let request = AnalysisRequest {
            job_dir: state.job_dir().to_path_buf(),
            media_path: state.source_media_path().to_path_buf(),
            asr_model_hint: self.asr_model.clone(),
            language_hint: self.language.clone(),
        };
        let signals = self.analyzer.analyze(&request).await?;
        tracing::info!(
            scenes = signals.scenes.len(),
            transcript = signals.transcript_ref.is_some(),
            frame_captions = signals.frame_captions.len(),
            vision_tags = signals.vision_tags.len(),
            "content understood"
        );

        persist_artifact(state.job_dir(), "content_understanding.json", &signals).await;
        state.content_signals = signals;
        Ok(())
    }
}
