//! Command-line and environment configuration.
//!
//! Every knob is env-backed with a default so the tool runs unattended;
//! the parsed CLI is folded into an immutable [`SyncConfig`] once at
//! startup and passed by reference into each component.

use std::time::Duration;

use clap::Parser;

use crate::dirty::SourceTables;
use crate::error::{Result, SyncError};
use crate::records::EntityKind;
use crate::store::{TableName, VectorStore};

/// Command-line interface for the sync tool.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "tracesync",
    about = "Keep pgvector embedding tables in sync with the trace course-evaluation schema"
)]
pub struct Cli {
    /// Mark every record stale before processing (full rebuild)
    #[arg(long, default_value_t = false)]
    pub rebuild: bool,

    /// Run the similarity probes only, without mutating anything
    #[arg(long, alias = "test", default_value_t = false)]
    pub verify: bool,

    /// Process comments (combinable with the other kind flags)
    #[arg(long, default_value_t = false)]
    pub comments: bool,

    /// Process ratings
    #[arg(long, default_value_t = false)]
    pub ratings: bool,

    /// Process instructors
    #[arg(long, default_value_t = false)]
    pub instructors: bool,

    /// Process courses
    #[arg(long, default_value_t = false)]
    pub courses: bool,

    /// Free-text probe query overriding the built-in samples
    #[arg(long, env = "PROBE_QUERY")]
    pub probe_query: Option<String>,

    /// Matches reported per similarity probe
    #[arg(long, env = "PROBE_TOP_K", default_value_t = 3)]
    pub top_k: usize,

    /// Database host
    #[arg(long, env = "DB_HOST", default_value = "localhost")]
    pub db_host: String,

    /// Database port
    #[arg(long, env = "DB_PORT", default_value_t = 5432)]
    pub db_port: u16,

    /// Database name
    #[arg(long, env = "DB_NAME", default_value = "trace")]
    pub db_name: String,

    /// Database user
    #[arg(long, env = "DB_USER", default_value = "postgres")]
    pub db_user: String,

    /// Database password (empty for trust/peer auth)
    #[arg(long, env = "DB_PASSWORD", default_value = "")]
    pub db_password: String,

    /// Embedding model identifier
    #[arg(long, env = "EMBEDDING_MODEL", default_value = "all-MiniLM-L6-v2")]
    pub model: String,

    /// Expected embedding dimension
    #[arg(long, env = "EMBEDDING_DIM", default_value_t = 384)]
    pub dimension: usize,

    /// Base URL of the OpenAI-compatible embedding endpoint
    #[arg(long, env = "EMBEDDING_BASE_URL", default_value = "http://localhost:8080/v1")]
    pub base_url: String,

    /// Optional bearer token for the embedding endpoint
    #[arg(long, env = "EMBEDDING_API_KEY")]
    pub api_key: Option<String>,

    /// Seconds to wait for each embedding request
    #[arg(long, env = "EMBEDDING_TIMEOUT_SECS", default_value_t = 30)]
    pub timeout_secs: u64,

    /// Maximum embedding attempts per record
    #[arg(long, env = "MAX_RETRIES", default_value_t = 3)]
    pub max_retries: usize,

    /// Seconds between embedding attempts
    #[arg(long, env = "RETRY_DELAY", default_value_t = 5)]
    pub retry_delay_secs: u64,

    /// Records between progress log lines
    #[arg(long, env = "BATCH_SIZE", default_value_t = 32)]
    pub batch_size: usize,

    /// Schema holding the source-of-record tables
    #[arg(long, env = "SOURCE_SCHEMA", default_value = "trace")]
    pub source_schema: String,

    /// Schema holding the vector tables
    #[arg(long, env = "VECTOR_SCHEMA", default_value = "vectors")]
    pub vector_schema: String,

    /// Vector table for comment embeddings
    #[arg(long, env = "COMMENT_EMBEDDING_TABLE", default_value = "comment_embeddings")]
    pub comment_table: String,

    /// Vector table for rating embeddings
    #[arg(long, env = "RATING_EMBEDDING_TABLE", default_value = "rating_embeddings")]
    pub rating_table: String,

    /// Vector table for instructor embeddings
    #[arg(long, env = "INSTRUCTOR_EMBEDDING_TABLE", default_value = "instructor_embeddings")]
    pub instructor_table: String,

    /// Vector table for course embeddings
    #[arg(long, env = "COURSE_EMBEDDING_TABLE", default_value = "course_embeddings")]
    pub course_table: String,
}

impl Cli {
    /// Entity kinds selected by the flags; all kinds when none are set.
    pub fn selected_kinds(&self) -> Vec<EntityKind> {
        let flags = [
            (EntityKind::Comment, self.comments),
            (EntityKind::Rating, self.ratings),
            (EntityKind::Instructor, self.instructors),
            (EntityKind::Course, self.courses),
        ];
        if flags.iter().any(|(_, selected)| *selected) {
            flags
                .into_iter()
                .filter_map(|(kind, selected)| selected.then_some(kind))
                .collect()
        } else {
            EntityKind::ALL.to_vec()
        }
    }

    /// Builds the immutable runtime configuration.
    pub fn build_config(&self) -> Result<SyncConfig> {
        if self.dimension == 0 {
            return Err(SyncError::Config("embedding dimension must be positive".to_string()));
        }
        if self.db_name.trim().is_empty() {
            return Err(SyncError::Config("database name is required".to_string()));
        }
        if self.db_user.trim().is_empty() {
            return Err(SyncError::Config("database user is required".to_string()));
        }
        Ok(SyncConfig {
            db_host: self.db_host.clone(),
            db_port: self.db_port,
            db_name: self.db_name.clone(),
            db_user: self.db_user.clone(),
            db_password: self.db_password.clone(),
            model: self.model.clone(),
            dimension: self.dimension,
            base_url: self.base_url.clone(),
            api_key: self.api_key.clone(),
            timeout: Duration::from_secs(self.timeout_secs.max(1)),
            max_retries: self.max_retries.max(1),
            retry_delay: Duration::from_secs(self.retry_delay_secs),
            batch_size: self.batch_size.max(1),
            top_k: self.top_k.max(1),
            probe_query: self.probe_query.clone(),
            source_schema: self.source_schema.clone(),
            vector_schema: self.vector_schema.clone(),
            comment_table: self.comment_table.clone(),
            rating_table: self.rating_table.clone(),
            instructor_table: self.instructor_table.clone(),
            course_table: self.course_table.clone(),
        })
    }
}

/// Immutable runtime settings shared by every component.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    db_host: String,
    db_port: u16,
    db_name: String,
    db_user: String,
    db_password: String,
    model: String,
    dimension: usize,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
    max_retries: usize,
    retry_delay: Duration,
    batch_size: usize,
    top_k: usize,
    probe_query: Option<String>,
    source_schema: String,
    vector_schema: String,
    comment_table: String,
    rating_table: String,
    instructor_table: String,
    course_table: String,
}

impl SyncConfig {
    /// Database connection settings for the shared run connection.
    pub fn pg_config(&self) -> tokio_postgres::Config {
        let mut config = tokio_postgres::Config::new();
        config
            .host(&self.db_host)
            .port(self.db_port)
            .dbname(&self.db_name)
            .user(&self.db_user);
        if !self.db_password.is_empty() {
            config.password(&self.db_password);
        }
        config
    }

    /// Database host, for connection logging.
    pub fn db_host(&self) -> &str {
        &self.db_host
    }

    /// Database name, for connection logging.
    pub fn db_name(&self) -> &str {
        &self.db_name
    }

    /// Embedding model identifier.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Expected embedding dimension.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Base URL of the embedding endpoint.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Optional bearer token for the embedding endpoint.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    /// Per-request embedding timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Maximum embedding attempts per record.
    pub fn max_retries(&self) -> usize {
        self.max_retries
    }

    /// Fixed delay between embedding attempts.
    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    /// Records between progress log lines.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Matches reported per similarity probe.
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Free-text probe override, when given.
    pub fn probe_query(&self) -> Option<&str> {
        self.probe_query.as_deref()
    }

    /// Locator for the source-of-record tables.
    pub fn source_tables(&self) -> Result<SourceTables> {
        SourceTables::new(&self.source_schema)
    }

    /// Vector store over the configured per-kind tables.
    pub fn vector_store(&self) -> Result<VectorStore> {
        Ok(VectorStore::new(
            self.dimension,
            TableName::new(&self.vector_schema, &self.comment_table)?,
            TableName::new(&self.vector_schema, &self.rating_table)?,
            TableName::new(&self.vector_schema, &self.instructor_table)?,
            TableName::new(&self.vector_schema, &self.course_table)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["tracesync"];
        argv.extend_from_slice(args);
        Cli::parse_from(argv)
    }

    #[test]
    fn no_kind_flags_selects_every_kind() {
        let cli = parse(&[]);
        assert_eq!(cli.selected_kinds(), EntityKind::ALL.to_vec());
    }

    #[test]
    fn kind_flags_narrow_the_selection() {
        let cli = parse(&["--comments", "--courses"]);
        assert_eq!(
            cli.selected_kinds(),
            vec![EntityKind::Comment, EntityKind::Course]
        );
    }

    #[test]
    fn verify_keeps_its_historical_alias() {
        let cli = parse(&["--test"]);
        assert!(cli.verify);
    }

    #[test]
    fn zero_dimension_is_a_configuration_error() {
        let cli = parse(&["--dimension", "0"]);
        assert!(matches!(cli.build_config(), Err(SyncError::Config(_))));
    }

    #[test]
    fn defaults_match_the_deployment() {
        let cli = parse(&[]);
        let config = cli.build_config().expect("defaults are valid");
        assert_eq!(config.dimension(), 384);
        assert_eq!(config.max_retries(), 3);
        assert_eq!(config.retry_delay(), Duration::from_secs(5));
        let store = config.vector_store().expect("tables are valid");
        assert_eq!(
            store.table(EntityKind::Comment).table().qualified(),
            "\"vectors\".\"comment_embeddings\""
        );
    }
}
