//! Output formatting for phased search results.
//!
//! Human output prints each phase as it was emitted; JSON carries enough
//! structure for scripting, including the per-source scores when present.

use serde::Serialize;
use whirr_core::{SearchPhase, SearchResult};

#[derive(Serialize)]
struct JsonOutput<'a> {
    query: &'a str,
    phases: Vec<JsonPhase>,
}

#[derive(Serialize)]
struct JsonPhase {
    phase: &'static str,
    hits: Vec<JsonHit>,
}

#[derive(Serialize)]
struct JsonHit {
    doc_id: String,
    score: f32,
    lexical_score: Option<f32>,
    semantic_score: Option<f32>,
    in_both: bool,
}

fn phase_name(phase: SearchPhase) -> &'static str {
    match phase {
        SearchPhase::Initial => "initial",
        SearchPhase::Refined => "refined",
    }
}

/// Formats phased results as JSON.
pub fn format_json(query: &str, phases: &[SearchResult]) -> String {
    let output = JsonOutput {
        query,
        phases: phases
            .iter()
            .map(|result| JsonPhase {
                phase: phase_name(result.phase),
                hits: result
                    .hits
                    .iter()
                    .map(|hit| JsonHit {
                        doc_id: hit.doc_id.clone(),
                        score: hit.rrf_score,
                        lexical_score: hit.lexical_score,
                        semantic_score: hit.semantic_score,
                        in_both: hit.in_both,
                    })
                    .collect(),
            })
            .collect(),
    };
    serde_json::to_string_pretty(&output).unwrap_or_else(|_| "{}".to_string())
}

/// Formats phased results for the terminal.
pub fn format_human(query: &str, phases: &[SearchResult]) -> String {
    let mut out = String::new();
    out.push_str(&format!("Results for \"{query}\"\n"));
    for result in phases {
        out.push_str(&format!("\n[{}]\n", phase_name(result.phase)));
        if result.hits.is_empty() {
            out.push_str("  (no hits)\n");
            continue;
        }
        for (position, hit) in result.hits.iter().enumerate() {
            out.push_str(&format!(
                "  {:>2}. {:<24} {:.4}\n",
                position + 1,
                hit.doc_id,
                hit.rrf_score
            ));
        }
    }
    out
}
