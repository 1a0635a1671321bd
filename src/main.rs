use anyhow::{Context, Result};
use clap::Parser;
use tokio_postgres::NoTls;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use tracesync::config::Cli;
use tracesync::dirty;
use tracesync::embedder::{EmbeddingClient, HttpEmbedder};
use tracesync::pipeline::{SyncPipeline, SyncReport};
use tracesync::probe::SimilarityProbe;
use tracesync::records::EntityKind;
use tracesync::schema;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = cli.build_config().context("invalid configuration")?;
    let source = config.source_tables().context("invalid source schema")?;
    let store = config
        .vector_store()
        .context("invalid vector table configuration")?;

    let transport = HttpEmbedder::new(
        config.base_url(),
        config.model(),
        config.api_key(),
        config.timeout(),
    )
    .context("failed to build embedding transport")?;
    let embedder = EmbeddingClient::new(
        Box::new(transport),
        config.dimension(),
        config.max_retries(),
        config.retry_delay(),
    );

    info!(
        host = config.db_host(),
        dbname = config.db_name(),
        "connecting to Postgres"
    );
    let (mut client, connection) = config
        .pg_config()
        .connect(NoTls)
        .await
        .context("failed to connect to Postgres")?;
    tokio::spawn(async move {
        if let Err(err) = connection.await {
            error!(error = %err, "postgres connection error");
        }
    });

    embedder
        .verify_dimension()
        .await
        .context("embedding model verification failed")?;

    if cli.verify {
        info!("verification mode: running similarity probes only");
        SimilarityProbe::new(&client, &embedder, &store, &source, config.top_k())
            .run(config.probe_query())
            .await;
        return Ok(());
    }

    schema::prepare(&client, &source, &store)
        .await
        .context("failed to prepare schemas")?;

    if cli.rebuild {
        for kind in EntityKind::ALL {
            dirty::mark_all_stale(&client, &source, kind)
                .await
                .with_context(|| format!("failed to mark {} records stale", kind.as_str()))?;
        }
        info!("marked all records stale for a full rebuild");
    }

    let kinds = cli.selected_kinds();
    let report = SyncPipeline::new(&mut client, &embedder, &store, &source, config.batch_size())
        .run(&kinds)
        .await;
    render_report(&report);

    if report.total_processed() > 0 {
        SimilarityProbe::new(&client, &embedder, &store, &source, config.top_k())
            .run(config.probe_query())
            .await;
    }
    Ok(())
}

fn render_report(report: &SyncReport) {
    println!("--- Sync Summary ---");
    for kind in &report.kinds {
        match &kind.scan_error {
            Some(reason) => println!("{}: stale scan failed ({reason})", kind.kind.as_str()),
            None => println!(
                "{}: {} of {} stale record(s) processed, {} failed",
                kind.kind.as_str(),
                kind.processed,
                kind.stale,
                kind.failures.len()
            ),
        }
    }
    println!("total processed: {}", report.total_processed());
}
