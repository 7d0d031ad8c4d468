//! Error taxonomy for the captionflow pipeline domain.
//!
//! Three tiers, from most to least severe:
//!
//! - [`CaptionFlowError`]: conditions that stop a run before (or instead of)
//!   the state machine executing: missing job input, invalid configuration,
//!   an unwritable snapshot.
//! - [`StageError`]: any failure inside a single stage. The node executor
//!   records it in the job's error log and the run continues.
//! - [`CollaboratorError`]: failures reported by an external collaborator
//!   (tool process, HTTP service, file system). Collaborators that have a safe
//!   default (trend discovery) absorb these themselves; the rest surface them
//!   to the stage, which wraps them in [`StageError::Collaborator`].

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Run-level errors
// ---------------------------------------------------------------------------

/// Errors that abort a run.
///
/// These are distinct from stage errors in that no amount of graceful
/// degradation makes the run meaningful once one of them occurs.
#[derive(Debug, Error, Serialize, Deserialize)]
pub enum CaptionFlowError {
    /// A required job input is absent before the graph starts (no manifest,
    /// no source media).
    ///
    /// No stage executes and no snapshot is written.
    #[error("Fatal input error in '{}': {reason}", job_dir.display())]
    FatalInput {
        /// The job directory that was being loaded.
        job_dir: PathBuf,
        /// Human-readable description of what is missing.
        reason: String,
    },

    /// The runtime configuration is invalid.
    ///
    /// Produced at load time; the pipeline never starts with an invalid config.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },

    /// The final job state could not be persisted.
    #[error("Snapshot error: {message}")]
    Snapshot {
        /// Description of the persistence problem.
        message: String,
    },
}

// ---------------------------------------------------------------------------
// Stage-level errors
// ---------------------------------------------------------------------------

/// A failure inside one pipeline stage.
///
/// Always recoverable: the node executor appends it to the error log and
/// leaves the job state exactly as it was before the stage ran.
#[derive(Debug, Error)]
pub enum StageError {
    /// An external collaborator failed (tool, HTTP service, timeout).
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    /// Generated content could not be parsed into valid variants.
    #[error("Parse/validation error: {message}")]
    ParseValidation {
        /// What was wrong with the generated content.
        message: String,
    },

    /// The stage's inputs are not usable (e.g. nothing to score).
    #[error("Precondition not met: {message}")]
    Precondition {
        /// Which input was missing or empty.
        message: String,
    },

    /// The stage panicked; the panic payload is captured as text.
    #[error("Stage panicked: {message}")]
    Panicked {
        /// The panic payload, if it was a string.
        message: String,
    },
}

impl StageError {
    /// Shorthand for [`StageError::Precondition`].
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition {
            message: message.into(),
        }
    }

    /// Shorthand for [`StageError::ParseValidation`].
    pub fn parse_validation(message: impl Into<String>) -> Self {
        Self::ParseValidation {
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Collaborator errors
// ---------------------------------------------------------------------------

/// A failure reported by an external collaborator.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum CollaboratorError {
    /// The collaborator is not configured or its tool is not installed.
    #[error("{collaborator} is unavailable: {reason}")]
    Unavailable {
        /// Name of the collaborator (e.g. `"ffprobe"`, `"gemini"`).
        collaborator: String,
        /// Why it cannot be used.
        reason: String,
    },

    /// The call did not complete within its time limit.
    #[error("{collaborator} timed out after {after:?}")]
    Timeout {
        /// Name of the collaborator.
        collaborator: String,
        /// The limit that was exceeded.
        after: Duration,
    },

    /// An external process failed to spawn or exited unsuccessfully.
    #[error("{tool} failed: {message}")]
    Tool {
        /// The tool binary name.
        tool: String,
        /// Exit status and captured stderr.
        message: String,
    },

    /// An HTTP service returned an error or could not be reached.
    #[error("HTTP error from {service} (status {status:?}): {message}")]
    Http {
        /// Name of the service.
        service: String,
        /// Response status, if a response was received at all.
        status: Option<u16>,
        /// Error detail.
        message: String,
    },

    /// A local file-system operation failed.
    #[error("I/O error on '{}': {message}", path.display())]
    Io {
        /// The path being read or written.
        path: PathBuf,
        /// Error detail.
        message: String,
    },

    /// The collaborator answered, but the answer has the wrong shape.
    #[error("Invalid response from {collaborator}: {message}")]
    InvalidResponse {
        /// Name of the collaborator.
        collaborator: String,
        /// What was wrong with the response.
        message: String,
    },
}

impl CollaboratorError {
    /// Builds an [`CollaboratorError::Io`] from a [`std::io::Error`].
    pub fn io(path: impl Into<PathBuf>, err: &std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }

    /// Returns `true` if this error is a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collaborator_errors_convert_into_stage_errors() {
        let err: StageError = CollaboratorError::Timeout {
            collaborator: "gemini".into(),
            after: Duration::from_secs(30),
        }
        .into();
        assert!(matches!(err, StageError::Collaborator(ref c) if c.is_timeout()));
        assert_eq!(err.to_string(), "gemini timed out after 30s");
    }

    #[test]
    fn fatal_input_message_names_the_job_dir() {
        let err = CaptionFlowError::FatalInput {
            job_dir: PathBuf::from("/jobs/abc"),
            reason: "no source media".into(),
        };
        assert_eq!(
            err.to_string(),
            "Fatal input error in '/jobs/abc': no source media"
        );
    }
}
