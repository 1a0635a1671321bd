//! Error taxonomy shared across the sync pipeline.

use thiserror::Error;

/// Failures surfaced by projection, embedding, and storage operations.
///
/// Per-record failures of any variant are contained at the pipeline's
/// record boundary; `Config` is fatal at startup.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Projection produced text the embedding model cannot accept.
    /// Never retried; the input will not get better.
    #[error("invalid embedding input: {0}")]
    Input(String),

    /// The embedding model kept failing until the retry budget ran out.
    #[error("embedding failed after {attempts} attempt(s): {source}")]
    Embedding {
        /// Attempts consumed before giving up.
        attempts: usize,
        /// The last failure returned by the model.
        #[source]
        source: anyhow::Error,
    },

    /// A statement against either the source or the vector schema failed.
    #[error("store error: {0}")]
    Store(#[from] tokio_postgres::Error),

    /// Settings that cannot produce a working pipeline.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SyncError>;
