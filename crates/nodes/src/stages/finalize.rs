use std::sync::Arc;

use async_trait::async_trait;
use pipeline::revision::select_best;
use pipeline::{JobState, Publisher, Stage, StageError};

use crate::executor::PipelineNode;

/// Selects the winning variant and hands it to the publisher.
pub struct FinalizeNode {
    publisher: Arc<dyn Publisher>,
}

impl FinalizeNode {
    pub fn new(publisher: Arc<dyn Publisher>) -> Self {
        Self { publisher }
    }
}

#[async_trait]
impl PipelineNode for FinalizeNode {
    fn stage(&self) -> Stage {
        Stage::Finalize
    }

    async fn run(&self, state: &mut JobState) -> Result<(), StageError> {
        let (winner, score) = select_best(&state.variants, &state.score_board)
            .ok_or_else(|| StageError::precondition("no scored variants to finalize"))?;
        let winner_id = winner.id.clone();
        tracing::info!(winner = %winner_id, total = %score.total, "finalizing");

        let artifacts = self
            .publisher
            .publish(state.job_dir(), &state.variants, &state.score_board, &winner_id)
            .await?;
        tracing::debug!(files = artifacts.files.len(), "artifacts published");

        state.winner = Some(winner_id);
        Ok(())
    }
}
