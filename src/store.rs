//! pgvector table access: upserts, counts, and similarity queries.

use pgvector::Vector;
use tokio_postgres::GenericClient;

use crate::error::{Result, SyncError};
use crate::records::EntityKind;

/// Fully-qualified Postgres table name (schema + table).
#[derive(Debug, Clone)]
pub struct TableName {
    schema: String,
    table: String,
}

impl TableName {
    /// Builds a new table identifier.
    pub fn new<S, T>(schema: S, table: T) -> Result<Self>
    where
        S: Into<String>,
        T: Into<String>,
    {
        let schema = schema.into();
        let table = table.into();
        if schema.trim().is_empty() {
            return Err(SyncError::Config("schema name is required".to_string()));
        }
        if table.trim().is_empty() {
            return Err(SyncError::Config("table name is required".to_string()));
        }
        Ok(Self { schema, table })
    }

    /// Fully-qualified table reference with quoted identifiers.
    pub fn qualified(&self) -> String {
        format!("{}.{}", quote_ident(&self.schema), quote_ident(&self.table))
    }

    /// Returns the raw schema string.
    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Returns the raw table string.
    pub fn table(&self) -> &str {
        &self.table
    }
}

/// Quotes Postgres identifiers, escaping embedded quotes.
pub fn quote_ident(input: &str) -> String {
    let escaped = input.replace('"', "\"\"");
    format!("\"{}\"", escaped)
}

/// One similarity match returned by a nearest-neighbor query.
#[derive(Clone, Debug, PartialEq)]
pub struct Neighbor {
    /// Source-row identity of the matched vector.
    pub record_id: i64,
    /// `1 - cosine distance` against the query vector.
    pub similarity: f64,
}

/// Vector-table access for one entity kind.
#[derive(Debug, Clone)]
pub struct VectorTable {
    kind: EntityKind,
    table: TableName,
}

impl VectorTable {
    /// Binds a kind to its vector table.
    pub fn new(kind: EntityKind, table: TableName) -> Self {
        Self { kind, table }
    }

    /// Entity kind this table stores vectors for.
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// The underlying table identifier.
    pub fn table(&self) -> &TableName {
        &self.table
    }

    /// Inserts or replaces the vector stored under `record_id`.
    ///
    /// Repeated calls with the same key converge to the latest vector and
    /// refresh the row timestamp. Runs atomically on whatever client it is
    /// given; pass the record's transaction to tie it to the flag clear.
    pub async fn upsert(
        &self,
        client: &impl GenericClient,
        record_id: i64,
        vector: &[f32],
    ) -> Result<()> {
        let value = Vector::from(vector.to_vec());
        client
            .execute(&self.upsert_sql(), &[&record_id, &value])
            .await?;
        Ok(())
    }

    /// Number of vectors currently stored for this kind.
    pub async fn count(&self, client: &impl GenericClient) -> Result<i64> {
        let row = client.query_one(&self.count_sql(), &[]).await?;
        Ok(row.get(0))
    }

    /// Returns up to `k` stored vectors ranked by cosine similarity to
    /// `query`, descending, ties broken by ascending record id, with
    /// `exclude_id` filtered out when present.
    pub async fn nearest_neighbors(
        &self,
        client: &impl GenericClient,
        query: &[f32],
        exclude_id: Option<i64>,
        k: usize,
    ) -> Result<Vec<Neighbor>> {
        let value = Vector::from(query.to_vec());
        let limit = k as i64;
        let rows = client
            .query(&self.nearest_sql(), &[&value, &exclude_id, &limit])
            .await?;
        Ok(rows
            .iter()
            .map(|row| Neighbor {
                record_id: row.get("record_id"),
                similarity: row.get("similarity"),
            })
            .collect())
    }

    fn upsert_sql(&self) -> String {
        let key = self.kind.key_column();
        format!(
            "INSERT INTO {table} ({key}, embedding) VALUES ($1, $2) \
             ON CONFLICT ({key}) DO UPDATE SET \
                embedding = EXCLUDED.embedding, \
                created_at = CURRENT_TIMESTAMP",
            table = self.table.qualified(),
            key = key,
        )
    }

    fn count_sql(&self) -> String {
        format!("SELECT COUNT(*) FROM {}", self.table.qualified())
    }

    fn nearest_sql(&self) -> String {
        let key = self.kind.key_column();
        format!(
            "SELECT {key} AS record_id, 1 - (embedding <=> $1) AS similarity \
             FROM {table} \
             WHERE $2::BIGINT IS NULL OR {key} <> $2 \
             ORDER BY embedding <=> $1 ASC, {key} ASC \
             LIMIT $3",
            table = self.table.qualified(),
            key = key,
        )
    }
}

/// The full set of per-kind vector tables plus the configured dimension.
#[derive(Debug, Clone)]
pub struct VectorStore {
    dimension: usize,
    comments: VectorTable,
    ratings: VectorTable,
    instructors: VectorTable,
    courses: VectorTable,
}

impl VectorStore {
    /// Builds the store from the four per-kind table names.
    pub fn new(
        dimension: usize,
        comments: TableName,
        ratings: TableName,
        instructors: TableName,
        courses: TableName,
    ) -> Self {
        Self {
            dimension,
            comments: VectorTable::new(EntityKind::Comment, comments),
            ratings: VectorTable::new(EntityKind::Rating, ratings),
            instructors: VectorTable::new(EntityKind::Instructor, instructors),
            courses: VectorTable::new(EntityKind::Course, courses),
        }
    }

    /// Fixed embedding dimension shared by every table.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// The table storing vectors for `kind`.
    pub fn table(&self, kind: EntityKind) -> &VectorTable {
        match kind {
            EntityKind::Comment => &self.comments,
            EntityKind::Rating => &self.ratings,
            EntityKind::Instructor => &self.instructors,
            EntityKind::Course => &self.courses,
        }
    }

    /// Every table in the fixed kind order.
    pub fn tables(&self) -> [&VectorTable; 4] {
        [&self.comments, &self.ratings, &self.instructors, &self.courses]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comment_table() -> VectorTable {
        VectorTable::new(
            EntityKind::Comment,
            TableName::new("vectors", "comment_embeddings").expect("valid name"),
        )
    }

    #[test]
    fn qualified_names_are_quoted() {
        let table = TableName::new("vectors", "comment_embeddings").expect("valid name");
        assert_eq!(table.qualified(), "\"vectors\".\"comment_embeddings\"");

        let tricky = TableName::new("sch\"ema", "ta\"ble").expect("valid name");
        assert_eq!(tricky.qualified(), "\"sch\"\"ema\".\"ta\"\"ble\"");
    }

    #[test]
    fn blank_names_are_rejected() {
        assert!(TableName::new("", "comment_embeddings").is_err());
        assert!(TableName::new("vectors", "  ").is_err());
    }

    #[test]
    fn upsert_converges_on_the_key() {
        let sql = comment_table().upsert_sql();
        assert!(sql.contains("ON CONFLICT (comment_id) DO UPDATE"));
        assert!(sql.contains("embedding = EXCLUDED.embedding"));
        assert!(sql.contains("created_at = CURRENT_TIMESTAMP"));
    }

    #[test]
    fn nearest_sql_orders_by_distance_then_id() {
        let sql = comment_table().nearest_sql();
        assert!(sql.contains("1 - (embedding <=> $1) AS similarity"));
        assert!(sql.contains("ORDER BY embedding <=> $1 ASC, comment_id ASC"));
        assert!(sql.contains("$2::BIGINT IS NULL OR comment_id <> $2"));
        assert!(sql.contains("LIMIT $3"));
    }

    #[test]
    fn store_routes_kinds_to_their_tables() {
        let name = |table: &str| TableName::new("vectors", table).expect("valid name");
        let store = VectorStore::new(
            384,
            name("comment_embeddings"),
            name("rating_embeddings"),
            name("instructor_embeddings"),
            name("course_embeddings"),
        );
        assert_eq!(store.table(EntityKind::Rating).table().table(), "rating_embeddings");
        assert_eq!(store.tables()[3].kind(), EntityKind::Course);
    }
}
