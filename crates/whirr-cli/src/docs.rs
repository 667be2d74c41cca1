//! Document text sidecar.
//!
//! The core index persists only vectors and ids. The CLI keeps the
//! canonicalized document texts in a `<name>.docs.json` sidecar so `search`
//! can rebuild the BM25 backend and resolve candidate texts for quality
//! re-embedding. Entries preserve insertion order, which both backends
//! require to agree on.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Serialize, Deserialize)]
pub struct DocEntry {
    pub doc_id: String,
    pub text: String,
}

#[derive(Serialize, Deserialize, Default)]
pub struct DocSidecar {
    pub documents: Vec<DocEntry>,
}

fn sidecar_path(stem: &Path) -> PathBuf {
    stem.with_extension("docs.json")
}

pub fn save(stem: &Path, sidecar: &DocSidecar) -> Result<()> {
    let path = sidecar_path(stem);
    let bytes = serde_json::to_vec_pretty(sidecar)?;
    std::fs::write(&path, bytes)
        .with_context(|| format!("failed to write document sidecar {}", path.display()))
}

/// Loads the sidecar when present; a missing file is not an error, the
/// search then runs vector-only.
pub fn load(stem: &Path) -> Result<Option<DocSidecar>> {
    let path = sidecar_path(stem);
    if !path.exists() {
        return Ok(None);
    }
    let bytes = std::fs::read(&path)
        .with_context(|| format!("failed to read document sidecar {}", path.display()))?;
    let sidecar = serde_json::from_slice(&bytes)
        .with_context(|| format!("invalid document sidecar {}", path.display()))?;
    Ok(Some(sidecar))
}
