//! Two-tier progressive search orchestrator.
//!
//! A search produces a lazy, finite sequence of phases: one INITIAL result
//! set computed from the fast embedder plus the lexical backend, then at
//! most one REFINED set where the top candidates are re-scored by a quality
//! embedder and blended with the fast signal. The consumer pulls phases at
//! its own pace; INITIAL always precedes REFINED and neither is emitted
//! partially.
//!
//! Failure semantics follow the phase: a fast-path embedding failure fails
//! the search (the iterator yields the error), while a quality-path failure,
//! a missed deadline, or a fired cancellation token silently truncate the
//! sequence after INITIAL.

use crate::canonicalize::{canonicalize, canonicalize_query};
use crate::config::TwoTierConfig;
use crate::embed::Embedder;
use crate::error::SearchError;
use crate::fusion::{blend_scores, reciprocal_rank_fusion, FusedHit};
use crate::lexical::LexicalBackend;
use crate::query::{classify, QueryClass};
use crate::vector::{Distance, VectorIndex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Cooperative cancellation token.
///
/// Checked at phase boundaries and around embedder calls; once fired, the
/// search sequence ends without producing further results.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Fresh, unfired token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires the token.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether the token has fired.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Which tier produced a result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchPhase {
    /// Fast-tier RRF results, delivered first.
    Initial,
    /// Quality-blended re-ranking of the INITIAL candidates.
    Refined,
}

/// One complete phase emission: an ordered list of up to `k` hits.
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// Producing phase.
    pub phase: SearchPhase,
    /// Fused hits, best first.
    pub hits: Vec<FusedHit>,
}

/// Resolves a document id to its text for quality re-embedding.
pub type TextResolver = dyn Fn(&str) -> Option<String> + Send + Sync;

/// Orchestrates two-tier progressive hybrid search.
pub struct TwoTierSearcher<'a> {
    index: &'a VectorIndex,
    fast: Arc<dyn Embedder>,
    quality: Option<Arc<dyn Embedder>>,
    lexical: Option<&'a dyn LexicalBackend>,
    config: TwoTierConfig,
    cancel: CancelToken,
    resolver: Option<Box<TextResolver>>,
}

impl<'a> TwoTierSearcher<'a> {
    /// Searcher over `index` with the fast embedder only.
    pub fn new(index: &'a VectorIndex, fast: Arc<dyn Embedder>, config: TwoTierConfig) -> Self {
        Self {
            index,
            fast,
            quality: None,
            lexical: None,
            config,
            cancel: CancelToken::new(),
            resolver: None,
        }
    }

    /// Adds the quality tier used by the REFINED phase.
    pub fn with_quality(mut self, quality: Arc<dyn Embedder>) -> Self {
        self.quality = Some(quality);
        self
    }

    /// Adds a lexical backend for the fast path.
    pub fn with_lexical(mut self, lexical: &'a dyn LexicalBackend) -> Self {
        self.lexical = Some(lexical);
        self
    }

    /// Attaches a caller-held cancellation token.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Registers the candidate text resolver.
    ///
    /// Required when the index was built by a different embedder than the
    /// quality tier: REFINED then re-embeds candidate texts supplied by this
    /// callback. Candidates it cannot resolve keep a zero quality score.
    pub fn with_text_resolver(
        mut self,
        resolver: impl Fn(&str) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.resolver = Some(Box::new(resolver));
        self
    }

    /// Starts a progressive search; phases are computed as they are pulled.
    pub fn search(&self, query: &str, k: usize) -> SearchIter<'_> {
        SearchIter {
            searcher: self,
            query: canonicalize_query(query),
            k,
            stage: Stage::Fast,
            initial: Vec::new(),
            fast_query: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Fast,
    Refine,
    Done,
}

/// Lazy phase sequence returned by [`TwoTierSearcher::search`].
pub struct SearchIter<'s> {
    searcher: &'s TwoTierSearcher<'s>,
    query: String,
    k: usize,
    stage: Stage,
    initial: Vec<FusedHit>,
    fast_query: Vec<f32>,
}

impl Iterator for SearchIter<'_> {
    type Item = Result<SearchResult, SearchError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.stage {
            Stage::Fast => {
                self.stage = Stage::Refine;
                self.run_fast_phase()
            }
            Stage::Refine => {
                self.stage = Stage::Done;
                self.run_refinement().map(Ok)
            }
            Stage::Done => None,
        }
    }
}

impl SearchIter<'_> {
    fn run_fast_phase(&mut self) -> Option<Result<SearchResult, SearchError>> {
        let searcher = self.searcher;
        if searcher.cancel.is_cancelled() {
            self.stage = Stage::Done;
            return None;
        }

        let class = classify(&self.query);
        if class == QueryClass::Empty {
            self.stage = Stage::Done;
            return Some(Ok(SearchResult {
                phase: SearchPhase::Initial,
                hits: Vec::new(),
            }));
        }

        let weights = class.weights();
        let pool = self.k.saturating_mul(searcher.config.candidate_multiplier);
        let started = Instant::now();
        let query = self.query.as_str();

        // Fast embed + vector top-k and lexical top-k run concurrently;
        // fusion needs both, so this is a join point.
        let (semantic, lexical) = thread::scope(|scope| {
            let semantic = scope.spawn(|| {
                let query_vec = searcher.fast.embed(query)?;
                let hits = searcher.index.search(&query_vec, pool)?;
                Ok::<_, SearchError>((query_vec, hits))
            });
            let lexical = scope.spawn(|| {
                searcher
                    .lexical
                    .map(|backend| backend.search(query, pool))
                    .unwrap_or_default()
            });
            (
                semantic.join().expect("semantic search thread panicked"),
                lexical.join().expect("lexical search thread panicked"),
            )
        });

        let (fast_query, vector_hits) = match semantic {
            Ok(pair) => pair,
            Err(err) => {
                warn!(error = %err, "fast path failed");
                self.stage = Stage::Done;
                return Some(Err(err));
            }
        };

        let semantic_pairs: Vec<(String, f32)> = vector_hits
            .into_iter()
            .map(|hit| (hit.doc_id, hit.score))
            .collect();

        let mut fused =
            reciprocal_rank_fusion(&lexical, &semantic_pairs, searcher.config.rrf_k, weights);
        fused.truncate(self.k);

        debug!(
            class = ?class,
            latency_ms = started.elapsed().as_millis() as u64,
            hits = fused.len(),
            "initial phase complete"
        );

        if searcher.cancel.is_cancelled() {
            self.stage = Stage::Done;
            return None;
        }

        self.initial = fused.clone();
        self.fast_query = fast_query;
        Some(Ok(SearchResult {
            phase: SearchPhase::Initial,
            hits: fused,
        }))
    }

    fn run_refinement(&mut self) -> Option<SearchResult> {
        let searcher = self.searcher;
        if searcher.config.fast_only || self.initial.is_empty() {
            return None;
        }
        let quality = searcher.quality.clone()?;
        if searcher.cancel.is_cancelled() {
            return None;
        }

        let started = Instant::now();
        let deadline = started + Duration::from_millis(searcher.config.quality_timeout_ms);

        let query = self.query.clone();
        let embedder = quality.clone();
        let query_vec = match run_with_deadline(deadline, move || embedder.embed(&query)) {
            Some(Ok(vec)) => vec,
            Some(Err(err)) => {
                warn!(error = %err, "quality embedding failed, keeping initial results");
                return None;
            }
            None => {
                debug!("quality phase missed its deadline");
                return None;
            }
        };

        let candidate_ids: Vec<String> =
            self.initial.iter().map(|hit| hit.doc_id.clone()).collect();

        // Stored rows are reusable only when they came from this embedder;
        // otherwise candidates are re-embedded from their canonical text.
        let quality_scores = if searcher.index.embedder_id() == quality.model_id() {
            match searcher.index.scores_for(&query_vec, &candidate_ids) {
                Ok(scores) => scores,
                Err(err) => {
                    warn!(error = %err, "quality scoring failed, keeping initial results");
                    return None;
                }
            }
        } else {
            self.reembedded_scores(&quality, &query_vec, &candidate_ids, deadline)?
        };

        if searcher.cancel.is_cancelled() {
            return None;
        }

        let fast_scores = match searcher.index.scores_for(&self.fast_query, &candidate_ids) {
            Ok(scores) => scores,
            Err(err) => {
                warn!(error = %err, "fast re-scoring failed, keeping initial results");
                return None;
            }
        };

        let blended = blend_scores(
            &self.initial,
            &fast_scores,
            &quality_scores,
            searcher.config.quality_weight,
        );

        debug!(
            latency_ms = started.elapsed().as_millis() as u64,
            hits = blended.len(),
            "refined phase complete"
        );
        Some(SearchResult {
            phase: SearchPhase::Refined,
            hits: blended,
        })
    }

    fn reembedded_scores(
        &self,
        quality: &Arc<dyn Embedder>,
        query_vec: &[f32],
        candidate_ids: &[String],
        deadline: Instant,
    ) -> Option<Vec<f32>> {
        let searcher = self.searcher;
        let Some(resolver) = searcher.resolver.as_ref() else {
            warn!("no text resolver registered, cannot re-embed candidates for quality scoring");
            return None;
        };

        let mut resolved: Vec<(usize, String)> = Vec::new();
        for (position, doc_id) in candidate_ids.iter().enumerate() {
            if let Some(text) = resolver(doc_id) {
                resolved.push((position, canonicalize(&text)));
            }
        }

        let mut scores = vec![0.0f32; candidate_ids.len()];
        if resolved.is_empty() {
            return Some(scores);
        }

        let texts: Vec<String> = resolved.iter().map(|(_, text)| text.clone()).collect();
        let embedder = quality.clone();
        let vectors = match run_with_deadline(deadline, move || embedder.embed_batch(&texts)) {
            Some(Ok(vectors)) => vectors,
            Some(Err(err)) => {
                warn!(error = %err, "candidate re-embedding failed, keeping initial results");
                return None;
            }
            None => {
                debug!("quality phase missed its deadline");
                return None;
            }
        };

        for ((position, _), vector) in resolved.iter().zip(vectors.iter()) {
            scores[*position] = pair_score(searcher.index.distance(), query_vec, vector);
        }
        Some(scores)
    }
}

/// Runs `task` on a worker thread, abandoning it past `deadline`.
///
/// Only embedder calls go through here: they are the one thing in a phase
/// allowed to block. An abandoned worker finishes in the background and its
/// result is discarded.
fn run_with_deadline<T, F>(deadline: Instant, task: F) -> Option<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (sender, receiver) = mpsc::channel();
    thread::spawn(move || {
        let _ = sender.send(task());
    });
    let remaining = deadline.saturating_duration_since(Instant::now());
    receiver.recv_timeout(remaining).ok()
}

fn pair_score(distance: Distance, query: &[f32], candidate: &[f32]) -> f32 {
    if query.len() != candidate.len() {
        return 0.0;
    }
    let dot: f32 = query.iter().zip(candidate).map(|(a, b)| a * b).sum();
    let score = match distance {
        Distance::Dot => dot,
        Distance::Cosine => {
            let query_norm = query.iter().map(|v| v * v).sum::<f32>().sqrt();
            let candidate_norm = candidate.iter().map(|v| v * v).sum::<f32>().sqrt();
            if query_norm > 0.0 && candidate_norm > 0.0 {
                dot / (query_norm * candidate_norm)
            } else {
                0.0
            }
        }
    };
    if score.is_nan() {
        0.0
    } else {
        score
    }
}
