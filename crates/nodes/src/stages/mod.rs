//! The five pipeline nodes.
//!
//! Each node wraps exactly one collaborator call (quality check additionally
//! runs the scoring engine and the revision controller) and writes its
//! output into the job state. Intermediate artifacts are persisted to the
//! job's results directory on a best-effort basis.

mod content;
mod finalize;
mod generate;
mod quality;
mod trend;

pub use content::ContentUnderstandingNode;
pub use finalize::FinalizeNode;
pub use generate::GenerateNode;
pub use quality::QualityCheckNode;
pub use trend::TrendDiscoveryNode;
