//! # whirr-core
//!
//! Two-tier progressive hybrid search: a BM25 lexical scorer and an f16
//! dense-vector scorer fused by weighted Reciprocal Rank Fusion, with an
//! INITIAL result set delivered at fast-embedder latency and a REFINED set
//! blended from a quality embedder streaming in behind it.
//!
//! ## Modules
//!
//! - [`canonicalize`] - text normalization shared by both scorers
//! - [`query`] - query classification and fusion weight selection
//! - [`embed`] - embedder contract, hash fallback, fast/quality stack
//! - [`vector`] - exact brute-force top-k index over f16 rows, npz persistence
//! - [`lexical`] - BM25 backend contract and implementation
//! - [`fusion`] - weighted RRF, tie cascade, two-tier score blending
//! - [`two_tier`] - the progressive INITIAL/REFINED orchestrator
//! - [`config`] - immutable pipeline configuration with env overrides
//! - [`error`] - the [`SearchError`] taxonomy
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use whirr_core::{
//!     Bm25Backend, Distance, Embedder, FnvHashEmbedder, TwoTierConfig, TwoTierSearcher,
//!     VectorIndex,
//! };
//!
//! let embedder = FnvHashEmbedder::new(128);
//! let docs = vec![
//!     ("a".to_string(), "oauth 2.0 authorization flow".to_string()),
//!     ("b".to_string(), "kubernetes pod scheduling".to_string()),
//! ];
//!
//! let mut index = VectorIndex::new(128, embedder.model_id(), Distance::Cosine);
//! for (id, text) in &docs {
//!     index.add(id, &embedder.embed(text).unwrap()).unwrap();
//! }
//! let ids: Vec<String> = docs.iter().map(|(id, _)| id.clone()).collect();
//! let texts: Vec<String> = docs.iter().map(|(_, text)| text.clone()).collect();
//! let lexical = Bm25Backend::build(ids, &texts);
//!
//! let searcher = TwoTierSearcher::new(&index, Arc::new(embedder), TwoTierConfig::default())
//!     .with_lexical(&lexical);
//! for phase in searcher.search("oauth flow", 2) {
//!     let result = phase.unwrap();
//!     println!("{:?}: {} hits", result.phase, result.hits.len());
//! }
//! ```

pub mod canonicalize;
pub mod config;
pub mod embed;
pub mod error;
pub mod fusion;
pub mod lexical;
mod npy;
pub mod query;
pub mod two_tier;
pub mod vector;

pub use canonicalize::{canonicalize, canonicalize_query, CODE_SENTINEL};
pub use config::TwoTierConfig;
pub use embed::{Embedder, EmbedderFactory, EmbedderStack, FnvHashEmbedder, ModelCategory, Reranker};
pub use error::SearchError;
pub use fusion::{blend_scores, min_max_normalize, reciprocal_rank_fusion, FusedHit};
pub use lexical::{Bm25Backend, LexicalBackend};
pub use query::{classify, FusionWeights, QueryClass};
pub use two_tier::{CancelToken, SearchIter, SearchPhase, SearchResult, TwoTierSearcher};
pub use vector::{Distance, VectorHit, VectorIndex};
