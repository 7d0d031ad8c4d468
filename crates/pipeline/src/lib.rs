//! Core domain for captionflow.
//!
//! This crate contains the job state threaded through the pipeline, the
//! multi-criteria scoring engine, the revision controller, the similarity
//! ranking used for trend fit, and the port traits every external
//! collaborator implements.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies.
//! It defines *what* is needed; infrastructure crates define *how* to supply it.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`JobId`, `VariantId`, `RunId`) |
//! | [`types`] | Bounded scores, media metrics, timestamps |
//! | [`errors`] | Run, stage, and collaborator error taxonomy |
//! | [`state`] | `JobState` and the records stages produce |
//! | [`scoring`] | Sub-scores, weighted total, score board |
//! | [`similarity`] | Embeddings, cosine ranking, shared embedder |
//! | [`revision`] | Best-variant selection and the revise/done decision |
//! | [`ports`] | Collaborator traits and their request/response types |

pub mod errors;
pub mod identifiers;
pub mod ports;
pub mod revision;
pub mod scoring;
pub mod similarity;
pub mod state;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use errors::{CaptionFlowError, CollaboratorError, StageError};
pub use identifiers::{JobId, RunId, VariantId};
pub use ports::{
    AnalysisRequest, CaptionGenerator, ContentAnalyzer, GenerationError, GenerationRequest,
    MediaProbe, ParseValidationError, ParsedVariants, PublishedArtifacts, Publisher, TrendOrigin,
    TrendReport, TrendSource,
};
pub use revision::{QualityVerdict, TOTAL_THRESHOLD, TREND_FIT_THRESHOLD};
pub use scoring::{ScoreBoard, ScoreBreakdown, ScoringContext, ScoringPolicy};
pub use similarity::{Embedder, HashingEmbedder};
pub use state::{
    ContentSignals, ErrorEntry, FrameCaption, JobBrief, JobState, Scene, Stage, TrendTerm, Variant,
    DEFAULT_MAX_REVISIONS,
};
pub use types::{MediaMetrics, PercentScore, Timestamp, UnitScore};
