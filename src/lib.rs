#![warn(missing_docs)]
//! Core library for the tracesync embedding synchronizer.
//!
//! Keeps the pgvector tables in the `vectors` schema aligned with the
//! `trace` course-evaluation schema: stale rows are detected via a
//! per-record flag, projected to canonical text, embedded, and upserted,
//! one transaction per record.

pub mod config;
pub mod dirty;
pub mod embedder;
pub mod error;
pub mod pipeline;
pub mod probe;
pub mod projection;
pub mod records;
pub mod schema;
pub mod store;

pub use config::{Cli, SyncConfig};
pub use dirty::SourceTables;
pub use embedder::{EmbedModel, EmbeddingClient, HttpEmbedder};
pub use error::SyncError;
pub use pipeline::{KindReport, RecordFailure, SyncPipeline, SyncReport};
pub use probe::SimilarityProbe;
pub use records::{
    CommentRecord, CourseRecord, EntityKind, InstructorRecord, RatingRecord, StaleRecord,
};
pub use store::{Neighbor, TableName, VectorStore, VectorTable};
