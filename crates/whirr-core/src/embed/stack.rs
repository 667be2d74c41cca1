//! Embedder stack: an explicit fast/quality pair with ordered fallback.
//!
//! Callers hand over candidate factories in preference order for each tier;
//! the first one that constructs wins. The hash embedder is the
//! unconditional last resort for the fast tier, so a stack can always be
//! built. There is no import probing or global detection: what you pass is
//! what gets tried.

use super::{Embedder, FnvHashEmbedder};
use crate::error::SearchError;
use std::sync::Arc;
use tracing::{debug, info};

/// Factory for one embedder candidate.
pub type EmbedderFactory = Box<dyn Fn() -> Result<Arc<dyn Embedder>, SearchError>>;

/// The fast and quality embedder pair used by the orchestrator.
#[derive(Clone)]
pub struct EmbedderStack {
    /// Embedder for the INITIAL phase.
    pub fast: Arc<dyn Embedder>,
    /// Embedder for the REFINED phase, when one is available.
    pub quality: Option<Arc<dyn Embedder>>,
}

impl EmbedderStack {
    /// Stack containing only the hash fallback, no refinement tier.
    pub fn hash_only(dimension: usize) -> Self {
        Self {
            fast: Arc::new(FnvHashEmbedder::new(dimension)),
            quality: None,
        }
    }

    /// Builds a stack by trying candidate factories in order.
    ///
    /// The first fast candidate that constructs becomes the fast tier, and
    /// likewise for quality. A tier with no working candidate degrades: a
    /// missing fast tier borrows the quality embedder if there is one,
    /// otherwise falls back to [`FnvHashEmbedder`] with `fallback_dimension`.
    pub fn from_factories(
        fast_candidates: &[EmbedderFactory],
        quality_candidates: &[EmbedderFactory],
        fallback_dimension: usize,
    ) -> Self {
        let fast = first_available(fast_candidates);
        let quality = first_available(quality_candidates);

        match (fast, quality) {
            (Some(fast), Some(quality)) => {
                info!(fast = fast.model_id(), quality = quality.model_id(), "embedder stack ready");
                Self {
                    fast,
                    quality: Some(quality),
                }
            }
            (Some(fast), None) => {
                info!(fast = fast.model_id(), "fast embedder only, no refinement tier");
                Self { fast, quality: None }
            }
            (None, Some(quality)) => {
                info!(model = quality.model_id(), "quality embedder serving both tiers");
                Self {
                    fast: quality,
                    quality: None,
                }
            }
            (None, None) => {
                info!("no model embedders available, using hash fallback");
                Self::hash_only(fallback_dimension)
            }
        }
    }
}

fn first_available(candidates: &[EmbedderFactory]) -> Option<Arc<dyn Embedder>> {
    for factory in candidates {
        match factory() {
            Ok(embedder) => return Some(embedder),
            Err(err) => debug!(error = %err, "embedder candidate unavailable"),
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::ModelCategory;

    fn working(id: &'static str, dim: usize) -> EmbedderFactory {
        Box::new(move || Ok(Arc::new(NamedEmbedder { id, dim }) as Arc<dyn Embedder>))
    }

    fn broken(id: &'static str) -> EmbedderFactory {
        Box::new(move || {
            Err(SearchError::EmbedderUnavailable {
                model: id.to_string(),
                reason: "not installed".to_string(),
            })
        })
    }

    struct NamedEmbedder {
        id: &'static str,
        dim: usize,
    }

    impl Embedder for NamedEmbedder {
        fn model_id(&self) -> &str {
            self.id
        }
        fn dimension(&self) -> usize {
            self.dim
        }
        fn embed(&self, _text: &str) -> Result<Vec<f32>, SearchError> {
            Ok(vec![0.0; self.dim])
        }
        fn is_semantic(&self) -> bool {
            true
        }
        fn category(&self) -> ModelCategory {
            ModelCategory::Fast
        }
    }

    #[test]
    fn first_working_candidate_wins() {
        let stack = EmbedderStack::from_factories(
            &[broken("missing"), working("fast-a", 64), working("fast-b", 64)],
            &[],
            384,
        );
        assert_eq!(stack.fast.model_id(), "fast-a");
        assert!(stack.quality.is_none());
    }

    #[test]
    fn quality_serves_both_tiers_when_fast_missing() {
        let stack =
            EmbedderStack::from_factories(&[broken("missing")], &[working("quality", 384)], 384);
        assert_eq!(stack.fast.model_id(), "quality");
        assert!(stack.quality.is_none());
    }

    #[test]
    fn hash_fallback_when_nothing_constructs() {
        let stack = EmbedderStack::from_factories(&[broken("a")], &[broken("b")], 128);
        assert_eq!(stack.fast.model_id(), "fnv1a-128d");
        assert_eq!(stack.fast.category(), ModelCategory::Hash);
        assert!(stack.quality.is_none());
    }

    #[test]
    fn both_tiers_populate() {
        let stack = EmbedderStack::from_factories(
            &[working("fast", 64)],
            &[working("quality", 384)],
            384,
        );
        assert_eq!(stack.fast.model_id(), "fast");
        assert_eq!(stack.quality.as_ref().map(|q| q.model_id()), Some("quality"));
    }
}
