//! Error types for whirr-core.
//!
//! A single [`SearchError`] enum covers the whole library: validation
//! failures (duplicate ids, dimension mismatches), persistence and archive
//! I/O, embedder-compatibility checks, embedder failures, and cancellation.
//!
//! Phase-level conditions that are not errors to the consumer (a quality
//! deadline expiring, a fired cancellation token mid-sequence) are observable
//! as a truncated result sequence instead; see [`crate::two_tier`].

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during indexing, persistence, and search.
#[derive(Debug, Error)]
pub enum SearchError {
    /// A document id was added twice to the same vector index.
    #[error("duplicate document id: {0}")]
    DuplicateDocument(String),

    /// Vector length disagrees with the index dimension.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension the index was created with
        expected: usize,
        /// Dimension of the offending vector
        actual: usize,
    },

    /// A persisted index file is absent.
    #[error("index missing at {path}: {detail}")]
    IndexMissing {
        /// Path of the missing file
        path: PathBuf,
        /// Which part of the layout was not found
        detail: String,
    },

    /// A persisted index file exists but its contents are invalid.
    #[error("index corrupted at {path}: {detail}")]
    IndexCorrupted {
        /// Path of the offending file
        path: PathBuf,
        /// What disagreed (shape, count, header, encoding)
        detail: String,
    },

    /// The on-disk format version is not one this build understands.
    #[error("unsupported index format version {found} (expected {expected})")]
    VersionMismatch {
        /// Version this build writes and reads
        expected: u32,
        /// Version found in the metadata sidecar
        found: u32,
    },

    /// The index was built by a different embedder than the caller expects.
    #[error("embedder mismatch: index built with '{indexed}', caller expects '{requested}'")]
    EmbedderMismatch {
        /// `embedder_id` recorded in the index metadata
        indexed: String,
        /// Embedder id the caller asked to verify
        requested: String,
    },

    /// A requested embedder model could not be constructed.
    #[error("embedder unavailable: {model}: {reason}")]
    EmbedderUnavailable {
        /// Model identifier
        model: String,
        /// Why construction failed
        reason: String,
    },

    /// An embedder failed to produce a vector.
    #[error("embedding failed for model {model}: {detail}")]
    EmbeddingFailed {
        /// Model identifier
        model: String,
        /// Failure detail from the embedder
        detail: String,
    },

    /// The caller's cancellation token fired.
    #[error("search cancelled")]
    Cancelled,

    /// Filesystem error during persistence.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Metadata sidecar could not be serialized or deserialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The npz archive container could not be read or written.
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
}
