//! Embedder abstractions.
//!
//! An [`Embedder`] is an opaque vectorizer: the orchestrator only relies on
//! its id, its output dimension, and determinism within a process. Neural
//! models live behind this contract in downstream crates; whirr-core ships
//! the dependency-free [`FnvHashEmbedder`] and the [`EmbedderStack`] that
//! pairs a fast tier with an optional quality tier.

mod hash;
mod stack;

pub use hash::FnvHashEmbedder;
pub use stack::{EmbedderFactory, EmbedderStack};

use crate::error::SearchError;

/// Quality tier of an embedder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelCategory {
    /// Deterministic hash projection, no semantics.
    Hash,
    /// Small model tuned for latency.
    Fast,
    /// Larger model tuned for ranking quality.
    Quality,
}

/// Text embedding model.
///
/// Implementations must be deterministic within a process (same input, same
/// output) and are shared across threads, so `Send + Sync` is required.
/// `embed` output length must always equal [`Embedder::dimension`].
pub trait Embedder: Send + Sync {
    /// Model identifier recorded in indexes built with this embedder.
    fn model_id(&self) -> &str;

    /// Output vector dimension.
    fn dimension(&self) -> usize;

    /// Embeds a single text.
    fn embed(&self, text: &str) -> Result<Vec<f32>, SearchError>;

    /// Embeds a batch of texts, one vector per input in order.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SearchError> {
        texts.iter().map(|text| self.embed(text)).collect()
    }

    /// Whether the embedding space carries meaning beyond surface overlap.
    fn is_semantic(&self) -> bool;

    /// Quality tier of this model.
    fn category(&self) -> ModelCategory;
}

/// Cross-encoder style reranker, reserved for a future phase.
///
/// No orchestrator stage consumes this today; the trait fixes the interface
/// surface so external rerankers can be written against it.
pub trait Reranker: Send + Sync {
    /// Scores each (query, document) pair; one score per document in order.
    fn score_pairs(&self, query: &str, documents: &[String]) -> Result<Vec<f32>, SearchError>;
}
