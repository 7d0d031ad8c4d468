//! CaptionFlow LLM provider infrastructure adapter.
//!
//! Implements [`pipeline::CaptionGenerator`] on top of the [`LlmProvider`]
//! seam. [`GeminiProvider`] talks to Google's Gemini REST API; additional
//! providers are added as new `impl LlmProvider` blocks without any changes
//! to the `pipeline` crate.
//!
//! [`FastEmbedder`] supplies the sentence embeddings the scoring engine uses
//! for trend fit, through [`pipeline::Embedder`].
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** HTTP transport, prompt formatting and response
//! parsing live here. The [`pipeline`] crate sees only
//! [`pipeline::CaptionGenerator`] and the validated
//! [`pipeline::ParsedVariants`] it returns.

pub mod embedding;
pub mod generator;
pub mod parse;
pub mod prompt;
pub mod provider;

pub use embedding::{EmbeddingConfig, FastEmbedder};
pub use generator::LlmCaptionGenerator;
pub use parse::parse_variants;
pub use prompt::build_prompt;
pub use provider::{GeminiConfig, GeminiProvider, LlmProvider};
