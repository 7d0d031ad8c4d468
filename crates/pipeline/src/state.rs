//! The job state record threaded through every pipeline stage.
//!
//! A [`JobState`] is created once per run from the job's immutable inputs,
//! owned by the orchestrator for the duration of the run, and handed to each
//! stage by exclusive reference. Stages read what earlier stages produced and
//! fill in their own fields.
//!
//! Two fields carry invariants that the type enforces rather than trusts:
//!
//! - the error log is append-only ([`JobState::record_error`]);
//! - the revision counter never exceeds the revision budget
//!   ([`JobState::begin_revision`]).
//!
//! The execution trace is diagnostic. It records every stage entered,
//! including stages whose other changes were rolled back after a failure.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::revision::QualityVerdict;
use crate::scoring::ScoreBoard;
use crate::{JobId, MediaMetrics, RunId, Timestamp, UnitScore, VariantId};

/// Default revision budget: regenerate at most once.
pub const DEFAULT_MAX_REVISIONS: u32 = 1;

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

/// The states of the pipeline state machine, excluding the terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Scene segmentation, transcription and frame captioning.
    ContentUnderstanding,
    /// Trend-term discovery seeded from the job brief and vision tags.
    TrendDiscovery,
    /// Caption variant generation (re-entered on revision).
    Generate,
    /// Scoring and the revision decision.
    QualityCheck,
    /// Winner selection and export.
    Finalize,
}

impl Stage {
    /// The label recorded in the error log and on tracing spans.
    pub fn label(self) -> &'static str {
        match self {
            Stage::ContentUnderstanding => "content_understanding",
            Stage::TrendDiscovery => "trend_discovery",
            Stage::Generate => "generate",
            Stage::QualityCheck => "quality_check",
            Stage::Finalize => "finalize",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Stage outputs
// ---------------------------------------------------------------------------

/// Free-text context about the job, read from its manifest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobBrief {
    /// Product or game name the captions advertise.
    pub game_name: String,
    /// Target language for generated captions (e.g. `"tr"`).
    pub language: String,
    /// App-store keywords supplied with the job.
    pub aso_keywords: Vec<String>,
    /// Long-form product description.
    pub description: String,
}

/// One detected scene of the source media.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    /// Scene start, in seconds.
    pub start: f64,
    /// Scene end, in seconds.
    pub end: f64,
    /// Extracted keyframe image, if extraction succeeded.
    pub keyframe: Option<PathBuf>,
}

/// A caption produced for one keyframe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameCaption {
    pub frame: PathBuf,
    pub caption: String,
    /// Tags extracted from `caption`.
    pub tags: Vec<String>,
}

/// Structured output of content understanding.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentSignals {
    /// Scene list in playback order.
    pub scenes: Vec<Scene>,
    /// Subtitle file produced by transcription, if any.
    pub transcript_ref: Option<PathBuf>,
    /// Per-keyframe captions, in scene order.
    #[serde(default)]
    pub frame_captions: Vec<FrameCaption>,
    /// Aggregated visual tags from frame captions.
    pub vision_tags: Vec<String>,
}

/// A candidate term judged contextually relevant, with its relevance weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendTerm {
    /// The normalised (lowercase) term.
    pub term: String,
    /// Relevance weight; higher is more relevant.
    pub weight: f64,
}

impl TrendTerm {
    /// Creates a trend term.
    pub fn new(term: impl Into<String>, weight: f64) -> Self {
        Self {
            term: term.into(),
            weight,
        }
    }
}

/// One generated candidate caption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    /// Identifier, unique within one generation pass.
    pub id: VariantId,
    /// Caption body.
    pub text: String,
    /// Hashtags, each starting with `#`.
    pub tags: Vec<String>,
}

/// One entry in the job's error log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEntry {
    /// The stage that failed.
    pub stage: Stage,
    /// Diagnostic text.
    pub message: String,
    /// When the failure was recorded.
    pub at: Timestamp,
}

// ---------------------------------------------------------------------------
// Job state
// ---------------------------------------------------------------------------

/// The single mutable record shared by all stages of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobState {
    run_id: RunId,
    job_id: JobId,
    job_dir: PathBuf,
    source_media_path: PathBuf,
    brief: JobBrief,

    /// Set once by content understanding.
    pub content_signals: ContentSignals,
    /// Set by trend discovery, in relevance order.
    pub trend_terms: Vec<TrendTerm>,
    /// Overwritten each time generation succeeds.
    pub variants: Vec<Variant>,
    /// Overwritten each time quality check succeeds.
    pub score_board: ScoreBoard,
    /// Probed once per job, on the first quality check.
    pub media_metrics: Option<MediaMetrics>,
    /// Media fit derived from `media_metrics`; zero if the media was unreadable.
    pub media_fit: Option<UnitScore>,
    /// The last quality-check decision, used to build a revision critique.
    pub verdict: Option<QualityVerdict>,
    /// Set by quality check; consumed and cleared by the router.
    pub needs_revision: bool,
    /// Set by the router on the revise edge; taken by the next generation.
    pub pending_critique: Option<String>,
    /// The variant finalize exported.
    pub winner: Option<VariantId>,

    error_log: Vec<ErrorEntry>,
    revision_count: u32,
    max_revisions: u32,
    trace: Vec<Stage>,
}

impl JobState {
    /// Creates a fresh state for one run with the default revision budget.
    pub fn new(
        job_id: JobId,
        job_dir: impl Into<PathBuf>,
        source_media_path: impl Into<PathBuf>,
        brief: JobBrief,
    ) -> Self {
        Self {
            run_id: RunId::new_random(),
            job_id,
            job_dir: job_dir.into(),
            source_media_path: source_media_path.into(),
            brief,
            content_signals: ContentSignals::default(),
            trend_terms: Vec::new(),
            variants: Vec::new(),
            score_board: ScoreBoard::default(),
            media_metrics: None,
            media_fit: None,
            verdict: None,
            needs_revision: false,
            pending_critique: None,
            winner: None,
            error_log: Vec::new(),
            revision_count: 0,
            max_revisions: DEFAULT_MAX_REVISIONS,
            trace: Vec::new(),
        }
    }

    /// Replaces the revision budget. Only meaningful before the run starts.
    #[must_use]
    pub fn with_max_revisions(mut self, max_revisions: u32) -> Self {
        self.max_revisions = max_revisions;
        self.revision_count = self.revision_count.min(max_revisions);
        self
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn job_dir(&self) -> &Path {
        &self.job_dir
    }

    pub fn source_media_path(&self) -> &Path {
        &self.source_media_path
    }

    pub fn brief(&self) -> &JobBrief {
        &self.brief
    }

    /// Trend terms as plain strings, in relevance order.
    pub fn trend_term_strings(&self) -> Vec<String> {
        self.trend_terms.iter().map(|t| t.term.clone()).collect()
    }

    // -- error log ----------------------------------------------------------

    /// Appends a failure to the error log.
    pub fn record_error(&mut self, stage: Stage, message: impl Into<String>) {
        self.error_log.push(ErrorEntry {
            stage,
            message: message.into(),
            at: Timestamp::now(),
        });
    }

    /// All recorded failures, oldest first.
    pub fn errors(&self) -> &[ErrorEntry] {
        &self.error_log
    }

    // -- revision budget ----------------------------------------------------

    pub fn revision_count(&self) -> u32 {
        self.revision_count
    }

    pub fn max_revisions(&self) -> u32 {
        self.max_revisions
    }

    /// Returns `true` while another revision may still be requested.
    pub fn can_revise(&self) -> bool {
        self.revision_count < self.max_revisions
    }

    /// Consumes one unit of revision budget.
    ///
    /// Returns `false`, leaving the counter untouched, if the budget is
    /// already exhausted.
    pub fn begin_revision(&mut self) -> bool {
        if !self.can_revise() {
            return false;
        }
        self.revision_count += 1;
        true
    }

    // -- execution trace ----------------------------------------------------

    /// Records that `stage` was entered. Entries are kept whether or not
    /// the stage succeeds.
    pub fn push_trace(&mut self, stage: Stage) {
        self.trace.push(stage);
    }

    /// Every stage entered during the run, in order.
    pub fn trace(&self) -> &[Stage] {
        &self.trace
    }

    /// Number of times `stage` was entered.
    pub fn visits(&self, stage: Stage) -> usize {
        self.trace.iter().filter(|s| **s == stage).count()
    }

    /// Looks up a variant by id.
    pub fn variant(&self, id: &VariantId) -> Option<&Variant> {
        self.variants.iter().find(|v| &v.id == id)
    }
}
