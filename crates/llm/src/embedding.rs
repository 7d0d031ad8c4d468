//! Sentence embeddings for trend fit, backed by a local ONNX model.
//!
//! The model (all-MiniLM-L6-v2 by default) is downloaded into the cache
//! directory and loaded on the first [`Embedder::embed`] call, not at
//! construction. A failed load is remembered; every later call reports the
//! same [`CollaboratorError::Unavailable`] without retrying.

use std::path::PathBuf;
use std::sync::OnceLock;

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use pipeline::{CollaboratorError, Embedder};

/// Output dimension of all-MiniLM-L6-v2.
pub const MINILM_DIMENSION: usize = 384;

const COLLABORATOR: &str = "embedder";

/// Where and how to load the embedding model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmbeddingConfig {
    /// Model cache directory; the library default when `None`.
    pub cache_dir: Option<PathBuf>,
    pub show_download_progress: bool,
}

/// [`Embedder`] over a fastembed sentence-transformer model.
pub struct FastEmbedder {
    config: EmbeddingConfig,
    model: OnceLock<Result<TextEmbedding, String>>,
}

impl FastEmbedder {
    /// Creates the embedder without loading the model.
    pub fn new(config: EmbeddingConfig) -> Self {
        Self {
            config,
            model: OnceLock::new(),
        }
    }

    /// Whether a load has been attempted, successfully or not.
    pub fn is_initialised(&self) -> bool {
        self.model.get().is_some()
    }

    fn load(&self) -> Result<TextEmbedding, String> {
        let mut options = InitOptions::new(EmbeddingModel::AllMiniLML6V2)
            .with_show_download_progress(self.config.show_download_progress);
        if let Some(dir) = &self.config.cache_dir {
            options = options.with_cache_dir(dir.clone());
        }
        tracing::info!(cache_dir = ?self.config.cache_dir, "loading sentence-embedding model");
        TextEmbedding::try_new(options)
            .inspect_err(|e| tracing::warn!(error = %e, "embedding model failed to load"))
            .map_err(|e| e.to_string())
    }

    fn model(&self) -> Result<&TextEmbedding, CollaboratorError> {
        self.model
            .get_or_init(|| self.load())
            .as_ref()
            .map_err(|reason| CollaboratorError::Unavailable {
                collaborator: COLLABORATOR.into(),
                reason: reason.clone(),
            })
    }
}

impl std::fmt::Debug for FastEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedder")
            .field("config", &self.config)
            .field("initialised", &self.is_initialised())
            .finish()
    }
}

impl Embedder for FastEmbedder {
    fn dimension(&self) -> usize {
        MINILM_DIMENSION
    }

    fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, CollaboratorError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.model()?
            .embed(texts.to_vec(), None)
            .map_err(|e| CollaboratorError::InvalidResponse {
                collaborator: COLLABORATOR.into(),
                message: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction_does_not_load_the_model() {
        let embedder = FastEmbedder::new(EmbeddingConfig::default());
        assert!(!embedder.is_initialised());
        assert_eq!(embedder.dimension(), MINILM_DIMENSION);
    }

    #[test]
    fn empty_batches_skip_the_model() {
        let embedder = FastEmbedder::new(EmbeddingConfig::default());
        assert!(embedder.embed(&[]).unwrap().is_empty());
        assert!(!embedder.is_initialised());
    }
}
