//! Runs one pipeline node with isolated failure handling.
//!
//! A node works on a private copy of the job state. If it succeeds, the copy
//! replaces the state; if it returns an error or panics, the copy is thrown
//! away and the only changes to the state are a new error-log entry and the
//! stage's trace entry, which is recorded before the node runs. Either way
//! the run continues with the next stage.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use async_trait::async_trait;
use futures::FutureExt;
use pipeline::{JobState, Stage, StageError};
use tracing::Instrument;

/// One stage of the pipeline.
///
/// Implementations read and update `state` freely; partial updates made
/// before an error are discarded by [`NodeExecutor`].
#[async_trait]
pub trait PipelineNode: Send + Sync {
    /// The stage this node implements.
    fn stage(&self) -> Stage;

    /// Performs the stage's work.
    async fn run(&self, state: &mut JobState) -> Result<(), StageError>;
}

/// What happened when a node ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    /// The node succeeded and its changes were kept.
    Completed,
    /// The node failed; its diagnostic was appended to the error log.
    Failed(String),
}

impl StageOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, StageOutcome::Completed)
    }
}

/// Executes [`PipelineNode`]s transactionally against a [`JobState`].
#[derive(Debug, Default, Clone, Copy)]
pub struct NodeExecutor;

impl NodeExecutor {
    pub fn new() -> Self {
        Self
    }

    /// Runs `node` against `state`.
    ///
    /// Records the stage in the execution trace before running it, so a
    /// failed stage still appears in the trace. Never fails: errors and
    /// panics become error-log entries.
    pub async fn execute(&self, node: &dyn PipelineNode, state: &mut JobState) -> StageOutcome {
        let stage = node.stage();
        state.push_trace(stage);

        let span = tracing::info_span!(
            "stage",
            stage = stage.label(),
            job_id = %state.job_id(),
            run_id = %state.run_id(),
            revision = state.revision_count(),
        );

        let mut working = state.clone();
        let result = AssertUnwindSafe(node.run(&mut working))
            .catch_unwind()
            .instrument(span.clone())
            .await
            .unwrap_or_else(|payload| {
                Err(StageError::Panicked {
                    message: panic_message(payload.as_ref()),
                })
            });

        let _entered = span.enter();
        match result {
            Ok(()) => {
                *state = working;
                tracing::info!("stage completed");
                StageOutcome::Completed
            }
            Err(err) => {
                let diagnostic = err.to_string();
                tracing::warn!(error = %diagnostic, "stage failed; continuing with prior state");
                state.record_error(stage, diagnostic.clone());
                StageOutcome::Failed(diagnostic)
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
