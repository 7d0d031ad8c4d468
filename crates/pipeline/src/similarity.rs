//! Semantic similarity ranking.
//!
//! Texts are mapped to fixed-dimension embeddings by an [`Embedder`] and
//! compared with cosine similarity. The scoring engine uses
//! [`mean_top_similarity`] for trend fit; [`rank_by_similarity`] is the
//! general form for any other matching need.
//!
//! ## Shared embedder
//!
//! Embedding models are expensive to build, so one instance serves the whole
//! process. The composition root installs it once with
//! [`install_shared_embedder`]; a second install is rejected, so concurrent
//! start-up code cannot build two. Implementations are expected to load
//! their model lazily on the first [`Embedder::embed`] call. After that the
//! instance is read-only and safe to share between concurrent runs. It is
//! never torn down.

use std::sync::OnceLock;

use crate::errors::CollaboratorError;

/// Number of best matches averaged by [`mean_top_similarity`].
pub const TOP_K: usize = 5;

/// Produces fixed-dimension embeddings for text.
///
/// Implementations must be deterministic: the same input yields the same
/// vector for the lifetime of the process. A model that cannot be loaded
/// reports [`CollaboratorError::Unavailable`].
pub trait Embedder: Send + Sync {
    /// Length of every vector this embedder produces.
    fn dimension(&self) -> usize;

    /// Embeds each text, returning one vector per input in the same order.
    fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, CollaboratorError>;
}

// ---------------------------------------------------------------------------
// Lexical embedder
// ---------------------------------------------------------------------------

/// A model-free embedder based on feature hashing.
///
/// Only lexical overlap is measured: each lowercase word feeds one bucket and
/// each of its padded character trigrams another. Synonyms do not match, so
/// this is not a substitute for a sentence-embedding model in production; it
/// serves tests and offline tooling that need deterministic vectors.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub const DEFAULT_DIMENSION: usize = 384;

    const WORD_WEIGHT: f32 = 1.0;
    const TRIGRAM_WEIGHT: f32 = 0.5;

    /// Creates an embedder with the given dimension (at least 1).
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn bucket(&self, feature: &str) -> usize {
        (xxhash_rust::xxh64::xxh64(feature.as_bytes(), 0) % self.dimension as u64) as usize
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dimension];
        let lower = text.to_lowercase();
        for word in lower.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
            v[self.bucket(word)] += Self::WORD_WEIGHT;

            let padded: Vec<char> = std::iter::once('#')
                .chain(word.chars())
                .chain(std::iter::once('#'))
                .collect();
            for tri in padded.windows(3) {
                let gram: String = tri.iter().collect();
                v[self.bucket(&gram)] += Self::TRIGRAM_WEIGHT;
            }
        }
        normalize(&mut v);
        v
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DIMENSION)
    }
}

impl Embedder for HashingEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, CollaboratorError> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

fn normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
}

// ---------------------------------------------------------------------------
// Process-wide instance
// ---------------------------------------------------------------------------

static SHARED_EMBEDDER: OnceLock<Box<dyn Embedder>> = OnceLock::new();

/// Installs `embedder` as the process-wide instance.
///
/// Returns the rejected embedder if one is already in place.
pub fn install_shared_embedder(embedder: Box<dyn Embedder>) -> Result<(), Box<dyn Embedder>> {
    SHARED_EMBEDDER.set(embedder)
}

/// The process-wide embedder, if one has been installed.
pub fn shared_embedder() -> Option<&'static dyn Embedder> {
    SHARED_EMBEDDER.get().map(|e| e.as_ref())
}

/// Like [`shared_embedder`], but a missing embedder is an error.
pub fn require_shared_embedder() -> Result<&'static dyn Embedder, CollaboratorError> {
    shared_embedder().ok_or_else(|| CollaboratorError::Unavailable {
        collaborator: "embedder".into(),
        reason: "no embedding model installed".into(),
    })
}

// ---------------------------------------------------------------------------
// Ranking
// ---------------------------------------------------------------------------

/// Cosine similarity of two vectors. Zero if either has zero length or the
/// dimensions differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let (mut dot, mut na, mut nb) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na.sqrt() * nb.sqrt())
}

/// Ranks `candidates` by similarity to `query`, best first.
///
/// Returns `(candidate index, similarity)` pairs. Candidates with equal
/// similarity keep their input order. `query` and all candidates are embedded
/// in a single batch.
pub fn rank_by_similarity(
    embedder: &dyn Embedder,
    query: &str,
    candidates: &[&str],
) -> Result<Vec<(usize, f64)>, CollaboratorError> {
    if candidates.is_empty() {
        return Ok(Vec::new());
    }
    let mut batch = Vec::with_capacity(candidates.len() + 1);
    batch.push(query);
    batch.extend_from_slice(candidates);

    let vectors = embedder.embed(&batch)?;
    if vectors.len() != batch.len() {
        return Err(CollaboratorError::InvalidResponse {
            collaborator: "embedder".into(),
            message: format!("expected {} vectors, got {}", batch.len(), vectors.len()),
        });
    }
    let Some((query_vec, candidate_vecs)) = vectors.split_first() else {
        return Ok(Vec::new());
    };

    let mut ranked: Vec<(usize, f64)> = candidate_vecs
        .iter()
        .map(|v| cosine_similarity(query_vec, v))
        .enumerate()
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    Ok(ranked)
}

/// Mean similarity of the [`TOP_K`] candidates closest to `query`.
///
/// `Ok(None)` when there are no candidates.
pub fn mean_top_similarity(
    embedder: &dyn Embedder,
    query: &str,
    candidates: &[&str],
) -> Result<Option<f64>, CollaboratorError> {
    let ranked = rank_by_similarity(embedder, query, candidates)?;
    if ranked.is_empty() {
        return Ok(None);
    }
    let top: Vec<f64> = ranked.iter().take(TOP_K).map(|(_, s)| *s).collect();
    Ok(Some(top.iter().sum::<f64>() / top.len() as f64))
}
