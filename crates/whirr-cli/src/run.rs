//! Subcommand implementations.

use crate::docs::{self, DocEntry, DocSidecar};
use crate::output;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use whirr_core::{
    canonicalize, Bm25Backend, Distance, Embedder, FnvHashEmbedder, SearchResult, TwoTierConfig,
    TwoTierSearcher, VectorIndex,
};

/// Builds a vector index plus document sidecar from stdin lines.
pub fn index(stem: &Path) -> Result<()> {
    let embedder = FnvHashEmbedder::default();
    let mut index = VectorIndex::new(embedder.dimension(), embedder.model_id(), Distance::Cosine);
    let mut sidecar = DocSidecar::default();

    let stdin = std::io::stdin();
    for (line_number, line) in stdin.lock().lines().enumerate() {
        let line = line.context("failed to read stdin")?;
        let text = canonicalize(&line);
        if text.is_empty() {
            continue;
        }
        let doc_id = format!("doc-{line_number}");
        let vector = embedder
            .embed(&text)
            .with_context(|| format!("failed to embed {doc_id}"))?;
        index
            .add(&doc_id, &vector)
            .with_context(|| format!("failed to add {doc_id}"))?;
        sidecar.documents.push(DocEntry { doc_id, text });
    }

    index
        .save(stem)
        .with_context(|| format!("failed to save index at {}", stem.display()))?;
    docs::save(stem, &sidecar)?;

    println!("Indexed {} documents -> {}", index.count(), stem.display());
    Ok(())
}

/// Loads an index and runs a progressive search, printing each phase.
pub fn search(stem: &Path, query: &str, k: usize, json: bool) -> Result<()> {
    let embedder = FnvHashEmbedder::default();
    let index = VectorIndex::load(stem, Some(embedder.model_id()))
        .with_context(|| format!("failed to load index at {}", stem.display()))?;
    info!(count = index.count(), "index loaded");

    let sidecar = docs::load(stem)?;
    let lexical = sidecar.as_ref().map(|sidecar| {
        let ids = sidecar
            .documents
            .iter()
            .map(|doc| doc.doc_id.clone())
            .collect();
        let texts: Vec<String> = sidecar
            .documents
            .iter()
            .map(|doc| doc.text.clone())
            .collect();
        Bm25Backend::build(ids, &texts)
    });

    let texts: HashMap<String, String> = sidecar
        .as_ref()
        .map(|sidecar| {
            sidecar
                .documents
                .iter()
                .map(|doc| (doc.doc_id.clone(), doc.text.clone()))
                .collect()
        })
        .unwrap_or_default();

    let config = TwoTierConfig::from_env();
    let mut searcher = TwoTierSearcher::new(&index, Arc::new(embedder), config)
        .with_text_resolver(move |doc_id| texts.get(doc_id).cloned());
    if let Some(backend) = lexical.as_ref() {
        searcher = searcher.with_lexical(backend);
    }

    let phases: Vec<SearchResult> = searcher
        .search(query, k)
        .collect::<Result<_, _>>()
        .context("search failed")?;

    let rendered = if json {
        output::format_json(query, &phases)
    } else {
        output::format_human(query, &phases)
    };
    println!("{rendered}");
    Ok(())
}

/// Prints index metadata; load failures exit non-zero.
pub fn info(stem: &Path) -> Result<()> {
    let index = VectorIndex::load(stem, None)
        .with_context(|| format!("failed to load index at {}", stem.display()))?;

    println!("Documents: {}", index.count());
    println!("Dimension: {}", index.dimension());
    println!("Embedder:  {}", index.embedder_id());
    println!("Distance:  {}", index.distance().as_str());
    Ok(())
}
