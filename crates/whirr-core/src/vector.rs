//! Dense vector index: exact brute-force top-k over f16 rows.
//!
//! The index owns an append-only row-major matrix of f16 vectors keyed by
//! document id. Search scores the query against every row (O(count * D))
//! and returns the exact top-k; there is no approximate structure and no
//! recall tuning, exactness is the contract. Cosine indexes store rows
//! L2-normalized so scoring reduces to a dot product.
//!
//! Persistence is a two-file layout per index stem: `stem.npz` (a ZIP
//! archive with `vectors.npy` and `doc_ids.npy` members) and `stem.json`
//! (scalar metadata including the `embedder_id` compatibility tag).

use crate::error::SearchError;
use crate::npy;
use half::f16;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::io::{Cursor, Read, Write};
use std::path::Path;
use tracing::{debug, info};
use wide::f32x8;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const FORMAT_VERSION: u32 = 1;
const VECTORS_MEMBER: &str = "vectors.npy";
const DOC_IDS_MEMBER: &str = "doc_ids.npy";

/// Similarity kind used when scoring rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Distance {
    /// Angular similarity in `[-1, 1]`; rows stored normalized.
    Cosine,
    /// Raw inner product; rows stored as provided.
    Dot,
}

impl Distance {
    /// Wire name used in the metadata sidecar.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cosine => "cosine",
            Self::Dot => "dot",
        }
    }

    fn parse(name: &str) -> Option<Self> {
        match name {
            "cosine" => Some(Self::Cosine),
            "dot" => Some(Self::Dot),
            _ => None,
        }
    }
}

/// Raw vector similarity hit.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorHit {
    /// Internal row index (insertion order).
    pub index: usize,
    /// Document id of the row.
    pub doc_id: String,
    /// Similarity score under the index distance.
    pub score: f32,
}

#[derive(Serialize, Deserialize)]
struct IndexMeta {
    dimension: usize,
    count: usize,
    embedder_id: String,
    distance: String,
    format_version: u32,
}

/// In-memory vector index with f16 quantization and brute-force search.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    dimension: usize,
    distance: Distance,
    embedder_id: String,
    doc_ids: Vec<String>,
    rows: HashMap<String, usize>,
    vectors: Vec<f16>,
}

impl VectorIndex {
    /// Creates an empty index.
    ///
    /// `embedder_id` records which embedder produced the vectors and is
    /// compared on [`VectorIndex::load`] when the caller requests the check.
    pub fn new(dimension: usize, embedder_id: impl Into<String>, distance: Distance) -> Self {
        Self {
            dimension,
            distance,
            embedder_id: embedder_id.into(),
            doc_ids: Vec::new(),
            rows: HashMap::new(),
            vectors: Vec::new(),
        }
    }

    /// Embedding dimension of every row.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of indexed documents.
    pub fn count(&self) -> usize {
        self.doc_ids.len()
    }

    /// Whether the index holds no documents.
    pub fn is_empty(&self) -> bool {
        self.doc_ids.is_empty()
    }

    /// Embedder that produced the stored vectors.
    pub fn embedder_id(&self) -> &str {
        &self.embedder_id
    }

    /// Similarity kind of this index.
    pub fn distance(&self) -> Distance {
        self.distance
    }

    /// Document ids in insertion (row) order.
    pub fn doc_ids(&self) -> &[String] {
        &self.doc_ids
    }

    /// Adds one document vector.
    ///
    /// # Errors
    ///
    /// [`SearchError::DuplicateDocument`] if the id is already indexed,
    /// [`SearchError::DimensionMismatch`] if the vector length is wrong.
    /// The index is unchanged on failure.
    pub fn add(&mut self, doc_id: &str, vector: &[f32]) -> Result<(), SearchError> {
        if self.rows.contains_key(doc_id) {
            return Err(SearchError::DuplicateDocument(doc_id.to_string()));
        }
        if vector.len() != self.dimension {
            return Err(SearchError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }

        let row = self.doc_ids.len();
        self.rows.insert(doc_id.to_string(), row);
        self.doc_ids.push(doc_id.to_string());
        self.quantize_into(vector);
        Ok(())
    }

    /// Adds several documents at once.
    ///
    /// The whole batch is validated before anything is committed: a
    /// duplicate id (against the index or within the batch) or a wrong
    /// dimension rejects the batch and leaves the index unchanged.
    pub fn add_batch<'a, I>(&mut self, entries: I) -> Result<(), SearchError>
    where
        I: IntoIterator<Item = (&'a str, &'a [f32])>,
    {
        let entries: Vec<(&str, &[f32])> = entries.into_iter().collect();

        let mut batch_ids: HashSet<&str> = HashSet::with_capacity(entries.len());
        for (doc_id, vector) in &entries {
            if self.rows.contains_key(*doc_id) || !batch_ids.insert(*doc_id) {
                return Err(SearchError::DuplicateDocument((*doc_id).to_string()));
            }
            if vector.len() != self.dimension {
                return Err(SearchError::DimensionMismatch {
                    expected: self.dimension,
                    actual: vector.len(),
                });
            }
        }

        for (doc_id, vector) in entries {
            let row = self.doc_ids.len();
            self.rows.insert(doc_id.to_string(), row);
            self.doc_ids.push(doc_id.to_string());
            self.quantize_into(vector);
        }
        Ok(())
    }

    /// Exact top-k search.
    ///
    /// Returns `min(k, count)` hits sorted by descending score, ties broken
    /// by ascending row index (insertion order). NaN scores sort below every
    /// finite score.
    ///
    /// # Errors
    ///
    /// [`SearchError::DimensionMismatch`] if the query length is wrong.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<VectorHit>, SearchError> {
        let prepared = self.prepare_query(query)?;
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, f32)> = (0..self.count())
            .map(|row| {
                let score = dot_f16(self.row(row), &prepared);
                (row, if score.is_nan() { f32::NEG_INFINITY } else { score })
            })
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.truncate(k.min(self.count()));

        Ok(scored
            .into_iter()
            .map(|(row, score)| VectorHit {
                index: row,
                doc_id: self.doc_ids[row].clone(),
                score,
            })
            .collect())
    }

    /// Scores a query against a specific set of documents.
    ///
    /// Ids not present in the index score 0.0, as do NaN results. Used by
    /// the refinement phase to re-score INITIAL candidates.
    pub fn scores_for(&self, query: &[f32], doc_ids: &[String]) -> Result<Vec<f32>, SearchError> {
        let prepared = self.prepare_query(query)?;
        Ok(doc_ids
            .iter()
            .map(|id| {
                self.rows
                    .get(id)
                    .map(|row| {
                        let score = dot_f16(self.row(*row), &prepared);
                        if score.is_nan() {
                            0.0
                        } else {
                            score
                        }
                    })
                    .unwrap_or(0.0)
            })
            .collect())
    }

    /// Saves the index under `stem` as `stem.npz` + `stem.json`.
    ///
    /// Both files are written to a temporary name and renamed on completion,
    /// so a failed save never leaves a partially written index behind.
    pub fn save(&self, stem: &Path) -> Result<(), SearchError> {
        let npz_path = stem.with_extension("npz");
        let json_path = stem.with_extension("json");

        let mut archive = Vec::new();
        {
            let mut writer = ZipWriter::new(Cursor::new(&mut archive));
            let options =
                SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

            writer.start_file(VECTORS_MEMBER, options)?;
            writer.write_all(&npy::encode_f16_2d(
                self.count(),
                self.dimension,
                &self.vectors,
            ))?;

            let ids: Vec<&str> = self.doc_ids.iter().map(String::as_str).collect();
            writer.start_file(DOC_IDS_MEMBER, options)?;
            writer.write_all(&npy::encode_bytes_1d(&ids))?;

            writer.finish()?;
        }
        write_atomic(&npz_path, &archive)?;

        let meta = IndexMeta {
            dimension: self.dimension,
            count: self.count(),
            embedder_id: self.embedder_id.clone(),
            distance: self.distance.as_str().to_string(),
            format_version: FORMAT_VERSION,
        };
        write_atomic(&json_path, &serde_json::to_vec_pretty(&meta)?)?;

        info!(stem = %stem.display(), count = self.count(), "vector index saved");
        Ok(())
    }

    /// Loads an index saved by [`VectorIndex::save`].
    ///
    /// When `expected_embedder` is given, the stored `embedder_id` must match
    /// or loading fails with [`SearchError::EmbedderMismatch`].
    pub fn load(stem: &Path, expected_embedder: Option<&str>) -> Result<Self, SearchError> {
        let npz_path = stem.with_extension("npz");
        let json_path = stem.with_extension("json");

        let meta_bytes = std::fs::read(&json_path).map_err(|err| SearchError::IndexMissing {
            path: json_path.clone(),
            detail: format!("metadata sidecar not readable: {err}"),
        })?;
        let meta: IndexMeta =
            serde_json::from_slice(&meta_bytes).map_err(|err| SearchError::IndexCorrupted {
                path: json_path.clone(),
                detail: format!("invalid metadata: {err}"),
            })?;

        if meta.format_version != FORMAT_VERSION {
            return Err(SearchError::VersionMismatch {
                expected: FORMAT_VERSION,
                found: meta.format_version,
            });
        }
        if let Some(requested) = expected_embedder {
            if requested != meta.embedder_id {
                return Err(SearchError::EmbedderMismatch {
                    indexed: meta.embedder_id,
                    requested: requested.to_string(),
                });
            }
        }
        let distance =
            Distance::parse(&meta.distance).ok_or_else(|| SearchError::IndexCorrupted {
                path: json_path.clone(),
                detail: format!("unknown distance '{}'", meta.distance),
            })?;

        let archive_bytes =
            std::fs::read(&npz_path).map_err(|err| SearchError::IndexMissing {
                path: npz_path.clone(),
                detail: format!("vector archive not readable: {err}"),
            })?;
        let mut archive = ZipArchive::new(Cursor::new(archive_bytes.as_slice()))?;

        let corrupted = |detail: String| SearchError::IndexCorrupted {
            path: npz_path.clone(),
            detail,
        };

        let vector_bytes = read_member(&mut archive, VECTORS_MEMBER)
            .map_err(|detail| corrupted(detail))?;
        let (rows, cols, vectors) = npy::decode_f16_2d(&vector_bytes).map_err(&corrupted)?;

        let id_bytes =
            read_member(&mut archive, DOC_IDS_MEMBER).map_err(|detail| corrupted(detail))?;
        let doc_ids = npy::decode_bytes_1d(&id_bytes).map_err(&corrupted)?;

        if rows != meta.count || cols != meta.dimension {
            return Err(corrupted(format!(
                "vector shape ({rows}, {cols}) disagrees with metadata ({}, {})",
                meta.count, meta.dimension
            )));
        }
        if doc_ids.len() != meta.count {
            return Err(corrupted(format!(
                "{} doc ids for {} rows",
                doc_ids.len(),
                meta.count
            )));
        }

        let mut row_map = HashMap::with_capacity(doc_ids.len());
        for (row, id) in doc_ids.iter().enumerate() {
            if row_map.insert(id.clone(), row).is_some() {
                return Err(corrupted(format!("duplicate doc id '{id}'")));
            }
        }

        debug!(stem = %stem.display(), count = meta.count, "vector index loaded");
        Ok(Self {
            dimension: meta.dimension,
            distance,
            embedder_id: meta.embedder_id,
            doc_ids,
            rows: row_map,
            vectors,
        })
    }

    /// Stored f16 row by insertion index.
    pub(crate) fn row(&self, index: usize) -> &[f16] {
        let start = index * self.dimension;
        &self.vectors[start..start + self.dimension]
    }

    fn quantize_into(&mut self, vector: &[f32]) {
        match self.distance {
            Distance::Cosine => {
                let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
                if norm > 0.0 {
                    self.vectors
                        .extend(vector.iter().map(|v| f16::from_f32(v / norm)));
                } else {
                    // Zero vectors stay zero and score 0 against everything.
                    self.vectors.extend(vector.iter().map(|v| f16::from_f32(*v)));
                }
            }
            Distance::Dot => {
                self.vectors.extend(vector.iter().map(|v| f16::from_f32(*v)));
            }
        }
    }

    fn prepare_query(&self, query: &[f32]) -> Result<Vec<f32>, SearchError> {
        if query.len() != self.dimension {
            return Err(SearchError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        match self.distance {
            Distance::Cosine => {
                let norm = query.iter().map(|v| v * v).sum::<f32>().sqrt();
                if norm > 0.0 {
                    Ok(query.iter().map(|v| v / norm).collect())
                } else {
                    Ok(query.to_vec())
                }
            }
            Distance::Dot => Ok(query.to_vec()),
        }
    }
}

/// SIMD dot product between a stored f16 row and an f32 query.
pub(crate) fn dot_f16(row: &[f16], query: &[f32]) -> f32 {
    let mut acc = f32x8::ZERO;
    let mut row_lanes = row.chunks_exact(8);
    let mut query_lanes = query.chunks_exact(8);
    for (r, q) in row_lanes.by_ref().zip(query_lanes.by_ref()) {
        let mut widened = [0.0f32; 8];
        for (w, v) in widened.iter_mut().zip(r) {
            *w = f32::from(*v);
        }
        let mut lane = [0.0f32; 8];
        lane.copy_from_slice(q);
        acc += f32x8::from(widened) * f32x8::from(lane);
    }
    let mut sum = acc.reduce_add();
    for (r, q) in row_lanes.remainder().iter().zip(query_lanes.remainder()) {
        sum += f32::from(*r) * q;
    }
    sum
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), SearchError> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!("{file_name}.tmp"));
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

fn read_member(
    archive: &mut ZipArchive<Cursor<&[u8]>>,
    name: &str,
) -> Result<Vec<u8>, String> {
    let mut member = archive
        .by_name(name)
        .map_err(|err| format!("archive member '{name}' unavailable: {err}"))?;
    let mut bytes = Vec::with_capacity(member.size() as usize);
    member
        .read_to_end(&mut bytes)
        .map_err(|err| format!("archive member '{name}' unreadable: {err}"))?;
    Ok(bytes)
}
