//! Rank fusion: weighted RRF, min-max normalization, two-tier blending.
//!
//! Fusion is where determinism is won or lost, so every ordering here goes
//! through one four-level tie cascade: fused score descending, presence in
//! both sources, raw lexical score descending, document id ascending. The
//! last key is a total order over distinct documents, which makes the whole
//! cascade a total order.

use crate::query::FusionWeights;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Hybrid hit combining lexical and semantic evidence for one document.
#[derive(Debug, Clone, PartialEq)]
pub struct FusedHit {
    /// Document id.
    pub doc_id: String,
    /// Weighted RRF sum, or the blended score after refinement.
    pub rrf_score: f32,
    /// 0-based rank in the lexical list, when present.
    pub lexical_rank: Option<usize>,
    /// Raw lexical (BM25) score, when present.
    pub lexical_score: Option<f32>,
    /// 0-based rank in the semantic list, when present.
    pub semantic_rank: Option<usize>,
    /// Raw semantic (vector) score, when present.
    pub semantic_score: Option<f32>,
    /// Whether the document appeared in both source lists.
    pub in_both: bool,
}

/// Fuses a lexical and a semantic ranked list with weighted RRF.
///
/// Each document accumulates `weight * 1 / (rrf_k + rank)` per source, with
/// 1-based ranks. Output is sorted by the tie cascade and is a pure function
/// of its inputs.
pub fn reciprocal_rank_fusion(
    lexical: &[(String, f32)],
    semantic: &[(String, f32)],
    rrf_k: f32,
    weights: FusionWeights,
) -> Vec<FusedHit> {
    let mut accum: HashMap<&str, FusedHit> = HashMap::new();

    for (rank, (doc_id, score)) in lexical.iter().enumerate() {
        let entry = accum
            .entry(doc_id.as_str())
            .or_insert_with(|| empty_hit(doc_id));
        entry.rrf_score += weights.lexical / (rrf_k + rank as f32 + 1.0);
        entry.lexical_rank = Some(rank);
        entry.lexical_score = Some(*score);
    }

    for (rank, (doc_id, score)) in semantic.iter().enumerate() {
        let entry = accum
            .entry(doc_id.as_str())
            .or_insert_with(|| empty_hit(doc_id));
        entry.rrf_score += weights.semantic / (rrf_k + rank as f32 + 1.0);
        entry.semantic_rank = Some(rank);
        entry.semantic_score = Some(*score);
    }

    let mut fused: Vec<FusedHit> = accum
        .into_values()
        .map(|mut hit| {
            hit.in_both = hit.lexical_rank.is_some() && hit.semantic_rank.is_some();
            hit
        })
        .collect();
    fused.sort_by(compare_hits);
    fused
}

/// The four-level tie cascade shared by fusion and blending.
pub(crate) fn compare_hits(a: &FusedHit, b: &FusedHit) -> Ordering {
    b.rrf_score
        .total_cmp(&a.rrf_score)
        .then_with(|| b.in_both.cmp(&a.in_both))
        .then_with(|| {
            let a_lex = a.lexical_score.unwrap_or(f32::NEG_INFINITY);
            let b_lex = b.lexical_score.unwrap_or(f32::NEG_INFINITY);
            b_lex.total_cmp(&a_lex)
        })
        .then_with(|| a.doc_id.cmp(&b.doc_id))
}

/// Min-max normalizes scores into `[0, 1]`.
///
/// Constant and singleton sets are ill-conditioned for min-max; every score
/// in such a set maps to 0.5.
pub fn min_max_normalize(scores: &[f32]) -> Vec<f32> {
    if scores.is_empty() {
        return Vec::new();
    }

    let lo = scores.iter().copied().fold(f32::INFINITY, f32::min);
    let hi = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let span = hi - lo;

    if scores.len() == 1 || span.abs() < f32::EPSILON {
        return vec![0.5; scores.len()];
    }
    scores.iter().map(|score| (score - lo) / span).collect()
}

/// Blends fast and quality vector scores over one candidate set.
///
/// `blended = quality_weight * norm(quality) + (1 - quality_weight) * norm(fast)`
/// replaces each hit's `rrf_score`; ranks, raw scores, and the `in_both`
/// flag carry over so cascade levels 2 to 4 still order equal blends. The
/// three slices are parallel over the same candidates.
pub fn blend_scores(
    candidates: &[FusedHit],
    fast_scores: &[f32],
    quality_scores: &[f32],
    quality_weight: f32,
) -> Vec<FusedHit> {
    debug_assert_eq!(candidates.len(), fast_scores.len());
    debug_assert_eq!(candidates.len(), quality_scores.len());

    let fast_norm = min_max_normalize(fast_scores);
    let quality_norm = min_max_normalize(quality_scores);

    let mut blended: Vec<FusedHit> = candidates
        .iter()
        .zip(fast_norm.iter().zip(quality_norm.iter()))
        .map(|(hit, (fast, quality))| {
            let mut updated = hit.clone();
            updated.rrf_score = quality_weight * quality + (1.0 - quality_weight) * fast;
            updated
        })
        .collect();
    blended.sort_by(compare_hits);
    blended
}

fn empty_hit(doc_id: &str) -> FusedHit {
    FusedHit {
        doc_id: doc_id.to_string(),
        rrf_score: 0.0,
        lexical_rank: None,
        lexical_score: None,
        semantic_rank: None,
        semantic_score: None,
        in_both: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EVEN: FusionWeights = FusionWeights {
        lexical: 0.5,
        semantic: 0.5,
    };

    fn pairs(entries: &[(&str, f32)]) -> Vec<(String, f32)> {
        entries
            .iter()
            .map(|(id, score)| (id.to_string(), *score))
            .collect()
    }

    #[test]
    fn accumulates_weighted_rank_contributions() {
        let lexical = pairs(&[("a", 5.0)]);
        let semantic = pairs(&[("a", 0.5)]);
        let fused = reciprocal_rank_fusion(&lexical, &semantic, 60.0, EVEN);

        // rank 1 in both sources at weight 0.5: 2 * 0.5 / 61
        assert_eq!(fused.len(), 1);
        assert!((fused[0].rrf_score - 1.0 / 61.0).abs() < 1e-6);
        assert!(fused[0].in_both);
    }

    #[test]
    fn marks_single_source_documents() {
        let fused = reciprocal_rank_fusion(
            &pairs(&[("lex", 3.0)]),
            &pairs(&[("sem", 0.9)]),
            60.0,
            EVEN,
        );
        assert!(fused.iter().all(|hit| !hit.in_both));
        let lex = fused.iter().find(|h| h.doc_id == "lex").unwrap();
        assert_eq!(lex.lexical_rank, Some(0));
        assert_eq!(lex.semantic_rank, None);
    }

    #[test]
    fn in_both_documents_outrank_equal_singles() {
        // "both" is rank 2 in each list, "solo" is rank 1 in one list.
        // With k=1 even weights: both = 0.5/3 + 0.5/3 = 1/3, solo = 0.5/2 = 1/4.
        let fused = reciprocal_rank_fusion(
            &pairs(&[("other", 9.0), ("both", 5.0)]),
            &pairs(&[("solo", 0.9), ("both", 0.8)]),
            1.0,
            EVEN,
        );
        let both_pos = fused.iter().position(|h| h.doc_id == "both").unwrap();
        let solo_pos = fused.iter().position(|h| h.doc_id == "solo").unwrap();
        assert!(both_pos < solo_pos);
    }

    #[test]
    fn lexical_score_breaks_equal_rrf() {
        // Same single rank on each side with even weights: equal RRF sums,
        // neither in both, so the raw lexical score decides.
        let fused = reciprocal_rank_fusion(
            &pairs(&[("haslex", 5.0)]),
            &pairs(&[("nolex", 0.9)]),
            60.0,
            EVEN,
        );
        assert_eq!(fused[0].doc_id, "haslex");
        assert_eq!(fused[1].doc_id, "nolex");
    }

    #[test]
    fn doc_id_is_the_last_resort() {
        // Two docs at the same semantic-only position via duplicate scores
        // cannot share a rank, so construct equality with two sources.
        let fused = reciprocal_rank_fusion(
            &pairs(&[("zeta", 5.0), ("alpha", 5.0)]),
            &pairs(&[("alpha", 0.5), ("zeta", 0.5)]),
            60.0,
            EVEN,
        );
        // zeta: lex rank 1 + sem rank 2; alpha: lex rank 2 + sem rank 1.
        // Equal sums, both in both, equal lexical scores: id decides.
        assert_eq!(fused[0].doc_id, "alpha");
        assert_eq!(fused[1].doc_id, "zeta");
    }

    #[test]
    fn deterministic_across_runs() {
        let lexical = pairs(&[("a", 9.0), ("b", 8.0), ("c", 7.0), ("d", 6.0)]);
        let semantic = pairs(&[("c", 0.9), ("e", 0.8), ("a", 0.7), ("f", 0.6)]);
        let first = reciprocal_rank_fusion(&lexical, &semantic, 60.0, EVEN);
        for _ in 0..50 {
            assert_eq!(
                reciprocal_rank_fusion(&lexical, &semantic, 60.0, EVEN),
                first
            );
        }
    }

    #[test]
    fn raising_a_side_weight_never_demotes_its_documents() {
        let lexical = pairs(&[("shared", 5.0), ("lexonly", 4.0)]);
        let semantic = pairs(&[("shared", 0.9), ("semonly", 0.8)]);

        let rank_of = |weights: FusionWeights, id: &str| {
            reciprocal_rank_fusion(&lexical, &semantic, 60.0, weights)
                .iter()
                .position(|h| h.doc_id == id)
                .unwrap()
        };

        let low = rank_of(
            FusionWeights {
                lexical: 0.3,
                semantic: 0.5,
            },
            "lexonly",
        );
        let high = rank_of(
            FusionWeights {
                lexical: 0.9,
                semantic: 0.5,
            },
            "lexonly",
        );
        assert!(high <= low);
    }

    #[test]
    fn empty_inputs_fuse_to_nothing() {
        assert!(reciprocal_rank_fusion(&[], &[], 60.0, EVEN).is_empty());
    }

    #[test]
    fn normalize_spreads_to_unit_interval() {
        let normalized = min_max_normalize(&[0.8, 0.6, 0.4, 0.2]);
        assert!((normalized[0] - 1.0).abs() < 1e-6);
        assert!((normalized[3]).abs() < 1e-6);
    }

    #[test]
    fn normalize_maps_ill_conditioned_sets_to_half() {
        assert_eq!(min_max_normalize(&[0.7, 0.7, 0.7]), vec![0.5, 0.5, 0.5]);
        assert_eq!(min_max_normalize(&[42.0]), vec![0.5]);
        assert!(min_max_normalize(&[]).is_empty());
    }

    #[test]
    fn blend_weighting_moves_the_winner() {
        let candidates = vec![
            FusedHit {
                semantic_score: Some(1.0),
                ..hit("fast-favorite")
            },
            FusedHit {
                semantic_score: Some(0.2),
                ..hit("quality-favorite")
            },
        ];
        let fast = [1.0, 0.2];
        let quality = [0.2, 1.0];

        let fast_heavy = blend_scores(&candidates, &fast, &quality, 0.1);
        assert_eq!(fast_heavy[0].doc_id, "fast-favorite");

        let quality_heavy = blend_scores(&candidates, &fast, &quality, 0.9);
        assert_eq!(quality_heavy[0].doc_id, "quality-favorite");
    }

    #[test]
    fn blend_preserves_candidate_set() {
        let candidates = vec![hit("a"), hit("b"), hit("c")];
        let blended = blend_scores(&candidates, &[0.1, 0.5, 0.9], &[0.9, 0.5, 0.1], 0.7);
        let mut ids: Vec<&str> = blended.iter().map(|h| h.doc_id.as_str()).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn blend_of_constant_sets_falls_back_to_cascade() {
        let candidates = vec![
            FusedHit {
                lexical_score: Some(2.0),
                ..hit("strong-lex")
            },
            hit("aaa"),
        ];
        let blended = blend_scores(&candidates, &[0.5, 0.5], &[0.5, 0.5], 0.7);
        // All blends are 0.5; the lexical raw score decides.
        assert_eq!(blended[0].doc_id, "strong-lex");
    }

    fn hit(doc_id: &str) -> FusedHit {
        FusedHit {
            doc_id: doc_id.to_string(),
            rrf_score: 0.0,
            lexical_rank: None,
            lexical_score: None,
            semantic_rank: None,
            semantic_score: None,
            in_both: false,
        }
    }
}
