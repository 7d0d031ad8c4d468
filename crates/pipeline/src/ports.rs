//! Port traits for the external collaborators the pipeline calls.
//!
//! Infrastructure crates implement these; this crate never performs I/O
//! itself. Every method is async and object-safe (via `async_trait`) so the
//! orchestrator can hold collaborators as `Arc<dyn Trait>`.
//!
//! Timeouts are the collaborator's responsibility. A collaborator that gives
//! up reports [`CollaboratorError::Timeout`]; the node executor then records
//! a recoverable stage failure.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::errors::{CollaboratorError, StageError};
use crate::scoring::ScoreBoard;
use crate::state::{ContentSignals, TrendTerm, Variant};
use crate::{MediaMetrics, Timestamp, VariantId};

// ---------------------------------------------------------------------------
// Content understanding
// ---------------------------------------------------------------------------

/// Input to [`ContentAnalyzer::analyze`].
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRequest {
    pub job_dir: PathBuf,
    pub media_path: PathBuf,
    /// Speech model to use (e.g. `"base"`).
    pub asr_model_hint: String,
    /// Spoken language hint (e.g. `"tr"`); empty means auto-detect.
    pub language_hint: String,
}

/// Extracts scenes, a transcript and visual tags from source media.
///
/// Implementations should degrade per sub-feature (return partial signals)
/// rather than fail the whole call.
#[async_trait]
pub trait ContentAnalyzer: Send + Sync {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<ContentSignals, CollaboratorError>;
}

// ---------------------------------------------------------------------------
// Trend discovery
// ---------------------------------------------------------------------------

/// Where a [`TrendReport`]'s terms came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendOrigin {
    /// Related queries returned by the trend service.
    Fetched,
    /// The normalised seeds, because the service failed or returned nothing.
    SeedFallback,
}

/// Output of [`TrendSource::discover`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendReport {
    /// Terms in relevance order.
    pub terms: Vec<TrendTerm>,
    pub timestamp: Timestamp,
    pub origin: TrendOrigin,
}

/// Discovers trend terms related to a set of seed terms.
///
/// On any service failure an implementation must return the normalised seeds
/// unchanged (origin [`TrendOrigin::SeedFallback`]), never an empty list or a
/// hard-coded placeholder. An `Err` is reserved for local failures such as an
/// unwritable job directory.
#[async_trait]
pub trait TrendSource: Send + Sync {
    async fn discover(&self, job_dir: &Path, seeds: &[String]) -> Result<TrendReport, CollaboratorError>;
}

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

/// Input to [`CaptionGenerator::generate`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationRequest {
    pub job_dir: PathBuf,
    pub game_name: String,
    pub language: String,
    pub aso_keywords: Vec<String>,
    pub description: String,
    /// Visual tags from content understanding.
    pub tags: Vec<String>,
    pub trend_terms: Vec<String>,
    /// Present only on a revision pass.
    pub critique: Option<String>,
}

/// Generated content could not be turned into any valid variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ParseValidationError(pub String);

/// A validated, non-empty set of variants with unique ids.
///
/// The only way to obtain one is [`ParsedVariants::new`], so holding a value
/// of this type means the generator's output passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedVariants(Vec<Variant>);

impl ParsedVariants {
    /// Validates `variants`: at least one, every id unique, every variant
    /// with non-empty text and at least one tag.
    pub fn new(variants: Vec<Variant>) -> Result<Self, ParseValidationError> {
        if variants.is_empty() {
            return Err(ParseValidationError("no valid variants".into()));
        }
        let mut seen: HashSet<&VariantId> = HashSet::new();
        for v in &variants {
            if !seen.insert(&v.id) {
                return Err(ParseValidationError(format!("duplicate variant id '{}'", v.id)));
            }
            if v.text.trim().is_empty() {
                return Err(ParseValidationError(format!("variant '{}' has empty text", v.id)));
            }
            if v.tags.is_empty() {
                return Err(ParseValidationError(format!("variant '{}' has no tags", v.id)));
            }
        }
        Ok(Self(variants))
    }

    pub fn as_slice(&self) -> &[Variant] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<Variant> {
        self.0
    }
}

/// Failure of a generation call.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
    #[error(transparent)]
    ParseValidation(#[from] ParseValidationError),
}

impl From<GenerationError> for StageError {
    fn from(err: GenerationError) -> Self {
        match err {
            GenerationError::Collaborator(e) => StageError::Collaborator(e),
            GenerationError::ParseValidation(e) => StageError::parse_validation(e.0),
        }
    }
}

/// Produces caption variants from the job's context.
///
/// Must return at least one valid variant or fail.
#[async_trait]
pub trait CaptionGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<ParsedVariants, GenerationError>;
}

// ---------------------------------------------------------------------------
// Media probe
// ---------------------------------------------------------------------------

/// Reads basic properties of the source media.
///
/// Fields the probe cannot determine are zero. `Err` means the media is
/// unreadable or malformed, not merely that some fields are unknown.
#[async_trait]
pub trait MediaProbe: Send + Sync {
    async fn probe(&self, media_path: &Path) -> Result<MediaMetrics, CollaboratorError>;
}

// ---------------------------------------------------------------------------
// Finalize / export
// ---------------------------------------------------------------------------

/// Files written by a [`Publisher`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PublishedArtifacts {
    pub files: Vec<PathBuf>,
}

/// Turns the final variants and scores into user-facing artifacts.
///
/// `winner` is the variant the core selected; implementations must not
/// re-derive it.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(
        &self,
        job_dir: &Path,
        variants: &[Variant],
        board: &ScoreBoard,
        winner: &VariantId,
    ) -> Result<PublishedArtifacts, CollaboratorError>;
}
