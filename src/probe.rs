//! Diagnostic similarity probes over the vector tables.
//!
//! Everything here is read-only smoke testing: failures are logged and
//! never affect sync state or the process outcome.

use std::collections::HashMap;

use pgvector::Vector;
use tokio_postgres::Client;
use tracing::warn;

use crate::dirty::SourceTables;
use crate::embedder::EmbeddingClient;
use crate::error::Result;
use crate::records::EntityKind;
use crate::store::{Neighbor, VectorStore};

/// Built-in instructor probe when no query override is given.
const INSTRUCTOR_SAMPLE_QUERY: &str = "Professor who teaches Computer Science";
/// Built-in course probe when no query override is given.
const COURSE_SAMPLE_QUERY: &str = "Introduction to Computer Science";

/// Read-only similarity smoke tester.
pub struct SimilarityProbe<'a> {
    client: &'a Client,
    embedder: &'a EmbeddingClient,
    store: &'a VectorStore,
    source: &'a SourceTables,
    top_k: usize,
}

impl<'a> SimilarityProbe<'a> {
    /// Builds a probe over the shared connection.
    pub fn new(
        client: &'a Client,
        embedder: &'a EmbeddingClient,
        store: &'a VectorStore,
        source: &'a SourceTables,
        top_k: usize,
    ) -> Self {
        Self {
            client,
            embedder,
            store,
            source,
            top_k: top_k.max(1),
        }
    }

    /// Runs every probe, containing each one's failures.
    pub async fn run(&self, query_override: Option<&str>) {
        println!("--- Similarity Probe ---");
        self.report_counts().await;

        if let Err(err) = self.probe_stored_comment().await {
            warn!(error = %err, "comment self-similarity probe failed");
        }
        let probes = [
            (EntityKind::Instructor, INSTRUCTOR_SAMPLE_QUERY),
            (EntityKind::Course, COURSE_SAMPLE_QUERY),
        ];
        for (kind, sample) in probes {
            let query = query_override.unwrap_or(sample);
            if let Err(err) = self.probe_free_text(kind, query).await {
                warn!(kind = kind.as_str(), error = %err, "free-text probe failed");
            }
        }
    }

    async fn report_counts(&self) {
        for table in self.store.tables() {
            match table.count(self.client).await {
                Ok(count) => {
                    println!("{}: {} vector(s)", table.table().qualified(), count);
                }
                Err(err) => {
                    warn!(
                        table = %table.table().qualified(),
                        error = %err,
                        "could not count vectors"
                    );
                }
            }
        }
    }

    /// Fetches one stored comment vector and queries for its neighbors,
    /// excluding the comment itself.
    async fn probe_stored_comment(&self) -> Result<()> {
        let kind = EntityKind::Comment;
        let table = self.store.table(kind);
        let sql = format!(
            "SELECT ce.{key} AS record_id, c.comment_text, ce.embedding \
             FROM {vectors} ce \
             JOIN {comments} c ON ce.{key} = c.id \
             LIMIT 1",
            key = kind.key_column(),
            vectors = table.table().qualified(),
            comments = self.source.table(kind),
        );
        let Some(row) = self.client.query_opt(&sql, &[]).await? else {
            println!("comment probe: no stored vectors yet");
            return Ok(());
        };
        let record_id: i64 = row.get("record_id");
        let text: Option<String> = row.get("comment_text");
        let vector: Vector = row.get("embedding");

        println!(
            "comment probe seed {}: {}",
            record_id,
            snippet(text.as_deref().unwrap_or(""))
        );
        let neighbors = table
            .nearest_neighbors(self.client, &vector.to_vec(), Some(record_id), self.top_k)
            .await?;
        self.render_neighbors(kind, &neighbors).await?;
        Ok(())
    }

    /// Embeds a free-text query and reports its nearest stored vectors.
    async fn probe_free_text(&self, kind: EntityKind, query: &str) -> Result<()> {
        println!("{} probe query: {}", kind.as_str(), query);
        let vector = self.embedder.embed(query).await?;
        let neighbors = self
            .store
            .table(kind)
            .nearest_neighbors(self.client, &vector, None, self.top_k)
            .await?;
        self.render_neighbors(kind, &neighbors).await?;
        Ok(())
    }

    async fn render_neighbors(
        &self,
        kind: EntityKind,
        neighbors: &[Neighbor],
    ) -> Result<()> {
        if neighbors.is_empty() {
            println!("  (no matches)");
            return Ok(());
        }
        let ids: Vec<i64> = neighbors.iter().map(|n| n.record_id).collect();
        let labels = self.fetch_labels(kind, &ids).await?;
        for neighbor in neighbors {
            let label = labels
                .get(&neighbor.record_id)
                .map(|label| snippet(label))
                .unwrap_or_else(|| "<missing source row>".to_string());
            println!(
                "  {} {} (similarity {:.4}): {}",
                kind.as_str(),
                neighbor.record_id,
                neighbor.similarity,
                label
            );
        }
        Ok(())
    }

    /// Human-readable label per matched source row.
    async fn fetch_labels(&self, kind: EntityKind, ids: &[i64]) -> Result<HashMap<i64, String>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let sql = format!(
            "SELECT id, {column} AS label FROM {table} WHERE id = ANY($1)",
            column = label_column(kind),
            table = self.source.table(kind),
        );
        let rows = self.client.query(&sql, &[&ids]).await?;
        let mut labels = HashMap::with_capacity(rows.len());
        for row in rows {
            let id: i64 = row.get("id");
            let label: Option<String> = row.get("label");
            labels.insert(id, label.unwrap_or_default());
        }
        Ok(labels)
    }
}

fn label_column(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Comment => "comment_text",
        EntityKind::Rating => "question_text",
        EntityKind::Instructor => "name",
        EntityKind::Course => "course_name",
    }
}

fn snippet(text: &str) -> String {
    const MAX_CHARS: usize = 80;
    if text.chars().count() <= MAX_CHARS {
        return text.to_string();
    }
    let mut snippet = text.chars().take(MAX_CHARS).collect::<String>();
    snippet.push('…');
    snippet
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippets_are_bounded_and_lossless_when_short() {
        assert_eq!(snippet("short text"), "short text");
        let long = "x".repeat(200);
        let cut = snippet(&long);
        assert_eq!(cut.chars().count(), 81);
        assert!(cut.ends_with('…'));
    }
}
