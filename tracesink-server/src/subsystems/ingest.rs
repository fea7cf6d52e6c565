//! Ingestion service: validate, transform, and bulk-insert one batch.
//!
//! A batch is written with multi-row `INSERT ... VALUES` statements inside a
//! single transaction on one pooled connection, so either every row of the
//! request is persisted or none is. Empty batches never touch the pool.

use sqlx::query_builder::Separated;
use sqlx::{Postgres, QueryBuilder};
use tracesink_core::transform::{
    to_graph_rows, to_trace_rows, GraphRow, TraceRow, GRAPH_COLUMNS, TRACE_COLUMNS,
};
use tracesink_core::validate::{validate_graph_batch, validate_trace_batch};
use tracesink_core::{EventPool, TracesinkError};

pub const TRACE_TABLE: &str = "events";
pub const GRAPH_TABLE: &str = "graph_events";

/// Postgres wire protocol limit on bind parameters per statement.
const MAX_BIND_PARAMS: usize = 65_535;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestReport {
    pub inserted: u64,
}

pub async fn ingest_trace(pool: &EventPool, body: &[u8]) -> Result<IngestReport, TracesinkError> {
    let events = validate_trace_batch(body)?;
    insert_trace_rows(pool, to_trace_rows(events)).await
}

pub async fn ingest_graph(pool: &EventPool, body: &[u8]) -> Result<IngestReport, TracesinkError> {
    let events = validate_graph_batch(body)?;
    insert_graph_rows(pool, to_graph_rows(events)).await
}

pub async fn insert_trace_rows(
    pool: &EventPool,
    rows: Vec<TraceRow>,
) -> Result<IngestReport, TracesinkError> {
    insert_batch(pool, TRACE_TABLE, &TRACE_COLUMNS, rows, |mut b, row| {
        b.push_bind(row.0)
            .push_bind(row.1)
            .push_bind(row.2)
            .push_bind(row.3)
            .push_bind(row.4)
            .push_bind(row.5)
            .push_bind(row.6)
            .push_bind(row.7)
            .push_bind(row.8)
            .push_bind(row.9)
            .push_bind(row.10)
            .push_bind(row.11);
    })
    .await
}

pub async fn insert_graph_rows(
    pool: &EventPool,
    rows: Vec<GraphRow>,
) -> Result<IngestReport, TracesinkError> {
    insert_batch(pool, GRAPH_TABLE, &GRAPH_COLUMNS, rows, |mut b, row| {
        b.push_bind(row.0)
            .push_bind(row.1)
            .push_bind(row.2)
            .push_bind(row.3)
            .push_bind(row.4)
            .push_bind(row.5)
            .push_bind(row.6)
            .push_bind(row.7)
            .push_bind(row.8)
            .push_bind(row.9)
            .push_bind(row.10)
            .push_bind(row.11)
            .push_bind(row.12)
            .push_bind(row.13)
            .push_bind(row.14)
            .push_bind(row.15)
            // payload arrives as canonical JSON text
            .push_bind(row.16)
            .push_unseparated("::jsonb");
    })
    .await
}

/// Rows that fit in one statement for a table with `columns` columns.
pub fn rows_per_statement(columns: usize) -> usize {
    (MAX_BIND_PARAMS / columns.max(1)).max(1)
}

async fn insert_batch<R, F>(
    pool: &EventPool,
    table: &str,
    columns: &[&str],
    rows: Vec<R>,
    mut bind_row: F,
) -> Result<IngestReport, TracesinkError>
where
    F: for<'qb> FnMut(Separated<'qb, 'static, Postgres, &'static str>, R),
{
    if rows.is_empty() {
        return Ok(IngestReport { inserted: 0 });
    }
    let inserted = rows.len() as u64;
    let chunk_size = rows_per_statement(columns.len());
    let prefix = format!("INSERT INTO {} ({}) ", table, columns.join(", "));

    let mut conn = pool.acquire().await?;
    let mut tx = conn.begin().await?;

    let mut rows = rows.into_iter().peekable();
    while rows.peek().is_some() {
        let chunk: Vec<R> = rows.by_ref().take(chunk_size).collect();
        let mut qb: QueryBuilder<'static, Postgres> = QueryBuilder::new(prefix.as_str());
        qb.push_values(chunk, &mut bind_row);
        qb.build()
            .execute(&mut *tx)
            .await
            .map_err(TracesinkError::from_query)?;
    }

    tx.commit().await.map_err(TracesinkError::from_query)?;
    tracing::debug!(table, inserted, "Batch committed");

    Ok(IngestReport { inserted })
}
