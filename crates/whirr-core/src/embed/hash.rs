//! FNV-1a hash embedder: zero ML dependencies, always available.

use super::{Embedder, ModelCategory};
use crate::error::SearchError;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;
const DEFAULT_DIM: usize = 384;
const DEFAULT_NGRAM: usize = 3;
const SIGN_BIT: u32 = 32;

/// Deterministic hash-based embedder.
///
/// Hashes overlapping byte n-grams (trigrams by default) with FNV-1a into a
/// signed bucket accumulator, then L2-normalizes. Not semantic, but it is a
/// dependency-free fallback that makes surface overlap measurable, and it is
/// bitwise reproducible across runs and platforms.
#[derive(Debug, Clone)]
pub struct FnvHashEmbedder {
    dimension: usize,
    ngram: usize,
    model_id: String,
}

impl FnvHashEmbedder {
    /// Embedder with the given output dimension and default trigram size.
    pub fn new(dimension: usize) -> Self {
        Self::with_ngram(dimension, DEFAULT_NGRAM)
    }

    /// Embedder with explicit n-gram size.
    pub fn with_ngram(dimension: usize, ngram: usize) -> Self {
        Self {
            dimension,
            ngram: ngram.max(1),
            model_id: format!("fnv1a-{dimension}d"),
        }
    }

    fn scatter(&self, vec: &mut [f32], gram: &[u8]) {
        let hash = fnv1a(gram);
        let bucket = (hash % self.dimension as u64) as usize;
        let sign = if (hash >> SIGN_BIT) & 1 == 1 { 1.0 } else { -1.0 };
        vec[bucket] += sign;
    }
}

impl Default for FnvHashEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIM)
    }
}

impl Embedder for FnvHashEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, SearchError> {
        let mut vec = vec![0.0f32; self.dimension];
        let bytes = text.as_bytes();
        if bytes.len() < self.ngram {
            self.scatter(&mut vec, bytes);
        } else {
            for gram in bytes.windows(self.ngram) {
                self.scatter(&mut vec, gram);
            }
        }
        l2_normalize(&mut vec);
        Ok(vec)
    }

    fn is_semantic(&self) -> bool {
        false
    }

    fn category(&self) -> ModelCategory {
        ModelCategory::Hash
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

fn l2_normalize(vec: &mut [f32]) {
    let norm = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vec.iter_mut() {
            *v /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_has_declared_dimension() {
        let embedder = FnvHashEmbedder::new(64);
        let vec = embedder.embed("hello world").unwrap();
        assert_eq!(vec.len(), 64);
        assert_eq!(embedder.dimension(), 64);
    }

    #[test]
    fn deterministic_within_process() {
        let embedder = FnvHashEmbedder::new(128);
        let a = embedder.embed("some query text").unwrap();
        let b = embedder.embed("some query text").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_texts_produce_distinct_vectors() {
        let embedder = FnvHashEmbedder::new(128);
        let a = embedder.embed("alpha").unwrap();
        let b = embedder.embed("omega").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn output_is_unit_length() {
        let embedder = FnvHashEmbedder::default();
        let vec = embedder.embed("normalize me").unwrap();
        let norm: f32 = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn empty_text_embeds_without_panicking() {
        let embedder = FnvHashEmbedder::new(32);
        let vec = embedder.embed("").unwrap();
        assert_eq!(vec.len(), 32);
    }

    #[test]
    fn short_text_below_ngram_width() {
        let embedder = FnvHashEmbedder::new(32);
        let vec = embedder.embed("ab").unwrap();
        let norm: f32 = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn shared_trigrams_raise_similarity() {
        let embedder = FnvHashEmbedder::default();
        let query = embedder.embed("oauth refresh").unwrap();
        let close = embedder.embed("bearer token refresh in oauth").unwrap();
        let far = embedder.embed("kubernetes pod scheduling").unwrap();

        let dot = |a: &[f32], b: &[f32]| a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>();
        assert!(dot(&query, &close) > dot(&query, &far));
    }

    #[test]
    fn batch_matches_single_embeds() {
        let embedder = FnvHashEmbedder::new(64);
        let texts = vec!["one".to_string(), "two".to_string()];
        let batch = embedder.embed_batch(&texts).unwrap();
        assert_eq!(batch[0], embedder.embed("one").unwrap());
        assert_eq!(batch[1], embedder.embed("two").unwrap());
    }

    #[test]
    fn model_id_encodes_dimension() {
        assert_eq!(FnvHashEmbedder::new(256).model_id(), "fnv1a-256d");
    }
}
