//! Typed errors for the ingestion and retrieval pipeline.
//!
//! Each stage has its own error enum so callers can tell recoverable
//! per-document failures apart from fatal configuration drift. The
//! orchestration layers (`ingest`, `query`, CLI) wrap these in `anyhow`
//! for reporting.

use std::path::PathBuf;
use thiserror::Error;

/// Failure loading a single source file. Recovered locally: the document
/// is skipped and reported in the ingest summary, never aborting the batch.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The file could not be read from disk.
    #[error("unreadable file {path:?}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file extension maps to no supported format.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The bytes were read but could not be parsed as the claimed format.
    #[error("corrupt {format} content in {path:?}: {detail}")]
    Corrupt {
        format: &'static str,
        path: PathBuf,
        detail: String,
    },
}

/// Failure talking to the embedding collaborator.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// No provider configured; ingestion and semantic query both need one.
    #[error("embedding provider is disabled")]
    Disabled,

    /// Provider misconfiguration detected before any call was made.
    #[error("embedding configuration error: {0}")]
    Config(String),

    /// Transient or permanent provider failure, after retries were exhausted.
    #[error("embedding service error: {0}")]
    Service(String),

    /// The provider returned vectors of a different dimension than the
    /// index was built with. Fatal: ingestion-time and query-time
    /// configurations have drifted and results would be meaningless.
    #[error("embedding dimension mismatch: index expects {expected}, provider returned {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

/// Failure inside the vector index.
#[derive(Debug, Error)]
pub enum IndexError {
    /// A write failed; only the affected document's upsert is aborted.
    #[error("index write failed: {0}")]
    Write(#[from] sqlx::Error),

    /// The index holds vectors from a different model or dimension than
    /// the configured provider. Fatal configuration error.
    #[error("index model mismatch: index holds {indexed_model} ({indexed_dims}d), provider is {model} ({dims}d)")]
    ModelMismatch {
        indexed_model: String,
        indexed_dims: usize,
        model: String,
        dims: usize,
    },
}

/// Failure talking to the generation collaborator. Surfaced to the caller
/// with the composed prompt still available, so generation can be retried
/// without re-running retrieval.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation provider is disabled")]
    Disabled,

    #[error("generation configuration error: {0}")]
    Config(String),

    #[error("generation service error: {0}")]
    Service(String),
}
