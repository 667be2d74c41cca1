//! Lexical (BM25) search backend.
//!
//! The orchestrator only depends on the [`LexicalBackend`] trait: a top-k
//! scorer over canonicalized documents whose ids agree with the vector
//! index's insertion order. [`Bm25Backend`] is the bundled implementation,
//! wrapping the [`bm25`](https://crates.io/crates/bm25) crate. Tokenization
//! belongs to the backend; the contract only demands corpus-wide determinism.

use bm25::{Document, Language, SearchEngineBuilder};
use tracing::debug;

/// Abstract BM25-family scorer with top-k retrieval.
///
/// Implementations are built once per corpus (no incremental mutation) and
/// must return scores in descending order with ties broken by insertion
/// order, so fusion stays deterministic.
pub trait LexicalBackend: Send + Sync {
    /// Returns up to `k` `(doc_id, score)` pairs for a canonicalized query.
    fn search(&self, query: &str, k: usize) -> Vec<(String, f32)>;
}

/// BM25 backend over an in-memory inverted index.
pub struct Bm25Backend {
    engine: bm25::SearchEngine<u32>,
    doc_ids: Vec<String>,
}

impl Bm25Backend {
    /// Builds the backend from parallel id/text slices.
    ///
    /// Document order defines the insertion-order tie-break and must agree
    /// with the vector index built from the same corpus. Ids beyond
    /// `u32::MAX` documents are not supported.
    pub fn build(doc_ids: Vec<String>, texts: &[String]) -> Self {
        debug_assert_eq!(doc_ids.len(), texts.len());
        let documents: Vec<Document<u32>> = texts
            .iter()
            .enumerate()
            .map(|(row, text)| Document {
                id: row as u32,
                contents: text.clone(),
            })
            .collect();
        let engine = SearchEngineBuilder::<u32>::with_documents(Language::English, documents).build();
        debug!(count = doc_ids.len(), "lexical backend built");
        Self { engine, doc_ids }
    }

    /// Number of indexed documents.
    pub fn len(&self) -> usize {
        self.doc_ids.len()
    }

    /// Whether the corpus is empty.
    pub fn is_empty(&self) -> bool {
        self.doc_ids.is_empty()
    }
}

impl LexicalBackend for Bm25Backend {
    fn search(&self, query: &str, k: usize) -> Vec<(String, f32)> {
        if self.doc_ids.is_empty() || query.trim().is_empty() || k == 0 {
            return Vec::new();
        }

        let mut hits: Vec<(u32, f32)> = self
            .engine
            .search(query, k)
            .into_iter()
            .map(|result| (result.document.id, result.score))
            .collect();
        // The bm25 crate sorts by score; pin the tie order to insertion row.
        hits.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

        hits.into_iter()
            .filter_map(|(row, score)| {
                self.doc_ids
                    .get(row as usize)
                    .map(|id| (id.clone(), score))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(docs: &[(&str, &str)]) -> Bm25Backend {
        let ids = docs.iter().map(|(id, _)| id.to_string()).collect();
        let texts: Vec<String> = docs.iter().map(|(_, text)| text.to_string()).collect();
        Bm25Backend::build(ids, &texts)
    }

    #[test]
    fn matches_rank_above_non_matches() {
        let backend = backend(&[
            ("a", "the quick brown fox"),
            ("b", "sleepy cats everywhere"),
            ("c", "quick brown rabbits"),
        ]);

        let hits = backend.search("quick brown", 3);
        assert!(!hits.is_empty());
        let ids: Vec<&str> = hits.iter().map(|(id, _)| id.as_str()).collect();
        assert!(ids.contains(&"a"));
        assert!(ids.contains(&"c"));
        assert!(!ids.contains(&"b"));
    }

    #[test]
    fn scores_descend() {
        let backend = backend(&[
            ("once", "rust appears here"),
            ("thrice", "rust rust rust language"),
            ("never", "python only"),
        ]);

        let hits = backend.search("rust", 3);
        for window in hits.windows(2) {
            assert!(window[0].1 >= window[1].1);
        }
    }

    #[test]
    fn empty_query_and_empty_corpus_return_nothing() {
        let built = backend(&[("a", "text")]);
        assert!(built.search("", 5).is_empty());
        assert!(built.search("   ", 5).is_empty());

        let empty = Bm25Backend::build(Vec::new(), &[]);
        assert!(empty.is_empty());
        assert!(empty.search("query", 5).is_empty());
    }

    #[test]
    fn respects_k() {
        let backend = backend(&[
            ("a", "shared term one"),
            ("b", "shared term two"),
            ("c", "shared term three"),
        ]);
        assert!(backend.search("shared", 2).len() <= 2);
    }

    #[test]
    fn search_is_deterministic() {
        let backend = backend(&[
            ("a", "token token alpha"),
            ("b", "token token beta"),
            ("c", "token token gamma"),
        ]);
        let first = backend.search("token", 3);
        for _ in 0..20 {
            assert_eq!(backend.search("token", 3), first);
        }
    }
}
