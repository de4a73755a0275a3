//! Error taxonomy for the retrieval and preference subsystem.
//!
//! Library modules return [`AdvisorError`]; the CLI and server layers wrap it
//! in `anyhow` with context.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdvisorError {
    /// The embedding model (or its tokenizer) could not be loaded.
    #[error("embedding model unavailable: {0}")]
    ModelUnavailable(String),

    /// A query was issued against an index holding no vectors.
    #[error("similarity index is empty")]
    EmptyIndex,

    /// The catalog index has not been built yet.
    #[error("catalog index is not ready, run `barkeep build-index` first")]
    IndexNotReady,

    #[error("catalog not found at {}", .0.display())]
    CatalogNotFound(PathBuf),

    #[error("catalog contains no records")]
    EmptyCatalog,

    /// An index was asked for a dimension outside `1..=MAX_DIMENSION`.
    #[error("unsupported index dimension {0} (must be 1..={max})", max = crate::index::MAX_DIMENSION)]
    InvalidDimension(usize),

    #[error("vector has {got} dimensions, index expects {expected}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("corrupt index file {}: {reason}", path.display())]
    CorruptIndex { path: PathBuf, reason: String },

    /// Inference failed on an otherwise loaded model.
    #[error("embedding failed: {0:#}")]
    Embedding(anyhow::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("failed to read catalog: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T, E = AdvisorError> = std::result::Result<T, E>;
