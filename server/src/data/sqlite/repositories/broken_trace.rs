//! Broken trace repository
//!
//! Keyed by trace id; a trace flagged again in a later cycle overwrites its
//! previous row. Traces that become complete are not deleted here.

use sqlx::SqlitePool;

use crate::data::sqlite::SqliteError;
use crate::data::types::{BrokenTraceRecord, BrokenTraceRow};
use crate::utils::time::now_secs;

use super::{decode_list, encode_list};

type BrokenTraceTuple = (String, Option<String>, String, String, String, i64, i64);

const BROKEN_TRACE_COLUMNS: &str =
    "trace_id, root_service, reason, expected, missing, span_count, detected_at";

fn from_tuple(t: BrokenTraceTuple) -> Result<BrokenTraceRow, SqliteError> {
    let (trace_id, root_service, reason, expected, missing, span_count, detected_at) = t;
    Ok(BrokenTraceRow {
        trace_id,
        root_service,
        reason,
        expected: decode_list("broken_traces", "expected", &expected)?,
        missing: decode_list("broken_traces", "missing", &missing)?,
        span_count,
        detected_at,
    })
}

/// Upsert analyzer results in a single transaction
pub async fn upsert_broken_traces(
    pool: &SqlitePool,
    records: &[BrokenTraceRecord],
) -> Result<u64, SqliteError> {
    if records.is_empty() {
        return Ok(0);
    }
    let now = now_secs();

    let mut tx = pool.begin().await?;
    for record in records {
        sqlx::query(
            r#"
            INSERT INTO broken_traces (trace_id, root_service, reason, expected, missing, span_count, detected_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(trace_id) DO UPDATE SET
                root_service = excluded.root_service,
                reason = excluded.reason,
                expected = excluded.expected,
                missing = excluded.missing,
                span_count = excluded.span_count,
                detected_at = excluded.detected_at
            "#,
        )
        .bind(&record.trace_id)
        .bind(&record.root_service)
        .bind(&record.reason)
        .bind(encode_list(&record.expected))
        .bind(encode_list(&record.missing))
        .bind(record.span_count)
        .bind(now)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    Ok(records.len() as u64)
}

pub async fn get_broken_trace(
    pool: &SqlitePool,
    trace_id: &str,
) -> Result<Option<BrokenTraceRow>, SqliteError> {
    let sql = format!(
        "SELECT {} FROM broken_traces WHERE trace_id = ?",
        BROKEN_TRACE_COLUMNS
    );
    let row = sqlx::query_as::<_, BrokenTraceTuple>(&sql)
        .bind(trace_id)
        .fetch_optional(pool)
        .await?;

    row.map(from_tuple).transpose()
}

/// List broken traces newest first, optionally restricted to those rooted at
/// or missing `service`
pub async fn list_broken_traces(
    pool: &SqlitePool,
    service: Option<&str>,
    page: u32,
    limit: u32,
) -> Result<(Vec<BrokenTraceRow>, u64), SqliteError> {
    let offset = (page.saturating_sub(1)) * limit;
    let where_clause = if service.is_some() {
        " WHERE root_service = ? OR EXISTS (SELECT 1 FROM json_each(broken_traces.missing) WHERE json_each.value = ?)"
    } else {
        ""
    };

    let sql = format!(
        "SELECT {} FROM broken_traces{} ORDER BY detected_at DESC, trace_id LIMIT ? OFFSET ?",
        BROKEN_TRACE_COLUMNS, where_clause
    );
    let mut query = sqlx::query_as::<_, BrokenTraceTuple>(&sql);
    if let Some(service) = service {
        query = query.bind(service).bind(service);
    }
    let rows = query.bind(limit).bind(offset).fetch_all(pool).await?;

    let count_sql = format!("SELECT COUNT(*) FROM broken_traces{}", where_clause);
    let mut count_query = sqlx::query_as::<_, (i64,)>(&count_sql);
    if let Some(service) = service {
        count_query = count_query.bind(service).bind(service);
    }
    let total = count_query.fetch_one(pool).await?;

    let traces = rows
        .into_iter()
        .map(from_tuple)
        .collect::<Result<Vec<_>, _>>()?;
    Ok((traces, total.0 as u64))
}

/// Most recent broken traces involving one service
pub async fn list_for_service(
    pool: &SqlitePool,
    service: &str,
    limit: u32,
) -> Result<Vec<BrokenTraceRow>, SqliteError> {
    let (rows, _) = list_broken_traces(pool, Some(service), 1, limit).await?;
    Ok(rows)
}

/// Number of traces detected at or after `since` (unix seconds)
pub async fn count_broken_since(pool: &SqlitePool, since: i64) -> Result<i64, SqliteError> {
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM broken_traces WHERE detected_at >= ?")
        .bind(since)
        .fetch_one(pool)
        .await?;
    Ok(count.0)
}
