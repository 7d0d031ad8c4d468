//! CaptionFlow trend discovery.
//!
//! Implements [`pipeline::TrendSource`]: seeds are normalised, the first few
//! are sent to a related-queries service, and the answers are aggregated
//! into weighted [`pipeline::TrendTerm`]s. Whenever the service fails or has
//! nothing to say, the normalised seeds themselves are the result.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** HTTP transport lives in [`client`]; [`discovery`]
//! holds the aggregation and fallback rules.

pub mod client;
pub mod discovery;
pub mod normalize;

pub use client::{HttpTrendFetcher, RelatedQuery, TrendFetcher, TrendServiceConfig, Unconfigured};
pub use discovery::TrendDiscovery;
pub use normalize::normalize_seeds;
