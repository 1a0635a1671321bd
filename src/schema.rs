//! Idempotent startup preparation of the source and vector schemas.
//!
//! The pipeline itself never mutates schema; everything here runs once
//! before the first record is processed and tolerates re-runs.

use tokio_postgres::GenericClient;
use tracing::debug;

use crate::dirty::{SourceTables, STALE_COLUMN};
use crate::error::Result;
use crate::records::EntityKind;
use crate::store::{quote_ident, VectorStore, VectorTable};

/// Runs every migration the pipeline depends on.
pub async fn prepare(
    client: &impl GenericClient,
    source: &SourceTables,
    store: &VectorStore,
) -> Result<()> {
    ensure_vector_extension(client).await?;
    for table in store.tables() {
        ensure_schema(client, table.table().schema()).await?;
        ensure_vector_table(client, table, store.dimension()).await?;
    }
    for kind in EntityKind::ALL {
        ensure_stale_column(client, source, kind).await?;
    }
    Ok(())
}

async fn ensure_vector_extension(client: &impl GenericClient) -> Result<()> {
    client
        .execute("CREATE EXTENSION IF NOT EXISTS vector", &[])
        .await?;
    Ok(())
}

async fn ensure_schema(client: &impl GenericClient, schema: &str) -> Result<()> {
    let sql = format!("CREATE SCHEMA IF NOT EXISTS {}", quote_ident(schema));
    client.execute(&sql, &[]).await?;
    Ok(())
}

async fn ensure_vector_table(
    client: &impl GenericClient,
    table: &VectorTable,
    dimension: usize,
) -> Result<()> {
    let sql = format!(
        "CREATE TABLE IF NOT EXISTS {table} (\
            {key} BIGINT PRIMARY KEY, \
            embedding VECTOR({dimension}) NOT NULL, \
            created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP\
         )",
        table = table.table().qualified(),
        key = table.kind().key_column(),
        dimension = dimension,
    );
    client.execute(&sql, &[]).await?;
    debug!(table = %table.table().qualified(), "vector table ready");
    Ok(())
}

async fn ensure_stale_column(
    client: &impl GenericClient,
    source: &SourceTables,
    kind: EntityKind,
) -> Result<()> {
    let sql = format!(
        "ALTER TABLE {table} ADD COLUMN IF NOT EXISTS {flag} BOOLEAN DEFAULT TRUE",
        table = source.table(kind),
        flag = STALE_COLUMN,
    );
    client.execute(&sql, &[]).await?;
    debug!(table = %source.table(kind), "staleness column ready");
    Ok(())
}
