use std::sync::Arc;

use async_trait::async_trait;
use pipeline::{JobState, Stage, StageError, TrendSource};

use crate::executor::PipelineNode;
use crate::job::{persist_artifact, trend_seeds};

/// Discovers trend terms seeded from the job brief and vision tags.
pub struct TrendDiscoveryNode {
    source: Arc<dyn TrendSource>,
}

impl TrendDiscoveryNode {
    pub fn new(source: Arc<dyn TrendSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl PipelineNode for TrendDiscoveryNode {
    fn stage(&self) -> Stage {
        Stage::TrendDiscovery
    }

    async fn run(&self, state: &mut JobState) -> Result<(), StageError> {
        let seeds = trend_seeds(state);
        let report = self.source.discover(state.job_dir(), &seeds).await?;
        tracing::info!(
            seeds = seeds.len(),
            terms = report.terms.len(),
            origin = ?report.origin,
            "trend terms discovered"
        );

        persist_artifact(state.job_dir(), "trends.json", &report).await;
        state.trend_terms = report.terms;
        Ok(())
    }
}
