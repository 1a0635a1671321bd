//! Orchestration of the per-kind scan → project → embed → upsert → clear cycle.

use tokio_postgres::Client;
use tracing::{error, info, warn};

use crate::dirty::{self, SourceTables};
use crate::embedder::EmbeddingClient;
use crate::error::{Result, SyncError};
use crate::projection;
use crate::records::{EntityKind, StaleRecord};
use crate::store::VectorStore;

/// Identity and reason for one record the pipeline could not process.
#[derive(Clone, Debug)]
pub struct RecordFailure {
    /// Source-row identity.
    pub id: i64,
    /// Rendered failure reason.
    pub reason: String,
}

/// Outcome of one entity kind's sync pass.
#[derive(Clone, Debug)]
pub struct KindReport {
    /// Entity kind this report covers.
    pub kind: EntityKind,
    /// Size of the stale snapshot taken at the start of the pass.
    pub stale: usize,
    /// Records embedded, stored, and cleared.
    pub processed: usize,
    /// Records left stale for the next run.
    pub failures: Vec<RecordFailure>,
    /// Set when the stale snapshot itself could not be taken.
    pub scan_error: Option<String>,
}

impl KindReport {
    /// Empty report for one kind.
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            stale: 0,
            processed: 0,
            failures: Vec::new(),
            scan_error: None,
        }
    }

    fn record_success(&mut self) {
        self.processed += 1;
    }

    fn record_failure(&mut self, id: i64, err: &SyncError) {
        self.failures.push(RecordFailure {
            id,
            reason: err.to_string(),
        });
    }
}

/// Aggregated outcome across every requested kind.
#[derive(Clone, Debug)]
pub struct SyncReport {
    /// One report per requested kind, in processing order.
    pub kinds: Vec<KindReport>,
}

impl SyncReport {
    /// Total records processed across all kinds.
    pub fn total_processed(&self) -> usize {
        self.kinds.iter().map(|report| report.processed).sum()
    }

    /// Total records left stale across all kinds.
    pub fn total_failed(&self) -> usize {
        self.kinds.iter().map(|report| report.failures.len()).sum()
    }
}

/// Sequential sync driver holding the shared connection and collaborators.
///
/// One transaction per record, never across records; a record's failure
/// rolls back only its own effects and the batch continues.
pub struct SyncPipeline<'a> {
    client: &'a mut Client,
    embedder: &'a EmbeddingClient,
    store: &'a VectorStore,
    source: &'a SourceTables,
    progress_every: usize,
}

impl<'a> SyncPipeline<'a> {
    /// Builds a pipeline over the shared connection.
    pub fn new(
        client: &'a mut Client,
        embedder: &'a EmbeddingClient,
        store: &'a VectorStore,
        source: &'a SourceTables,
        progress_every: usize,
    ) -> Self {
        Self {
            client,
            embedder,
            store,
            source,
            progress_every: progress_every.max(1),
        }
    }

    /// Processes every requested kind in order and reports the outcome.
    ///
    /// A kind whose stale snapshot cannot be taken is reported and the
    /// remaining kinds still run.
    pub async fn run(&mut self, kinds: &[EntityKind]) -> SyncReport {
        let mut reports = Vec::with_capacity(kinds.len());
        for &kind in kinds {
            let report = match self.sync_kind(kind).await {
                Ok(report) => report,
                Err(err) => {
                    error!(kind = kind.as_str(), error = %err, "stale scan failed; skipping kind");
                    let mut report = KindReport::new(kind);
                    report.scan_error = Some(err.to_string());
                    report
                }
            };
            info!(
                kind = report.kind.as_str(),
                stale = report.stale,
                processed = report.processed,
                failed = report.failures.len(),
                "kind complete"
            );
            reports.push(report);
        }
        SyncReport { kinds: reports }
    }

    async fn sync_kind(&mut self, kind: EntityKind) -> Result<KindReport> {
        let records = dirty::list_stale(&*self.client, self.source, kind).await?;
        info!(kind = kind.as_str(), stale = records.len(), "found stale records");

        let mut report = KindReport::new(kind);
        report.stale = records.len();
        for record in &records {
            match self.sync_record(record).await {
                Ok(()) => {
                    report.record_success();
                    if report.processed % self.progress_every == 0 {
                        info!(
                            kind = kind.as_str(),
                            processed = report.processed,
                            stale = report.stale,
                            "progress"
                        );
                    }
                }
                Err(err) => {
                    warn!(
                        kind = kind.as_str(),
                        id = record.id(),
                        error = %err,
                        "record failed; leaving stale for the next run"
                    );
                    report.record_failure(record.id(), &err);
                }
            }
        }
        Ok(report)
    }

    /// Projects, embeds, and commits one record.
    ///
    /// The vector upsert and the flag clear share one transaction:
    /// either both land or the record stays stale.
    async fn sync_record(&mut self, record: &StaleRecord) -> Result<()> {
        let kind = record.kind();
        let text = projection::project(record);
        let vector = self.embedder.embed(&text).await?;

        let transaction = self.client.transaction().await?;
        self.store
            .table(kind)
            .upsert(&transaction, record.id(), &vector)
            .await?;
        dirty::clear_stale(&transaction, self.source, kind, record.id()).await?;
        transaction.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_fold_successes_and_failures_independently() {
        let mut report = KindReport::new(EntityKind::Comment);
        report.stale = 3;
        report.record_success();
        report.record_failure(2, &SyncError::Input("projection text is blank".to_string()));
        report.record_success();

        assert_eq!(report.processed, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].id, 2);
        assert!(report.failures[0].reason.contains("invalid embedding input"));
    }

    #[test]
    fn sync_report_totals_span_kinds() {
        let mut comments = KindReport::new(EntityKind::Comment);
        comments.record_success();
        comments.record_success();
        let mut courses = KindReport::new(EntityKind::Course);
        courses.record_failure(
            9,
            &SyncError::Embedding {
                attempts: 3,
                source: anyhow::anyhow!("model down"),
            },
        );

        let report = SyncReport {
            kinds: vec![comments, courses],
        };
        assert_eq!(report.total_processed(), 2);
        assert_eq!(report.total_failed(), 1);
    }
}
