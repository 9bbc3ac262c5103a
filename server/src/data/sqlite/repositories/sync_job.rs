//! Sync job history repository
//!
//! A job is opened as `running` and closed exactly once. Closing only matches
//! rows still in `running`, so a second close of the same job is rejected.
//!
//! Several processes may share the database (the server and a one-shot
//! `apmtrack sync`). Each running row carries the `owner` instance that opened
//! it and a `heartbeat_at` the owner renews while the cycle is alive. At most
//! one row is `running` at a time across all of them.

use sqlx::SqlitePool;

use crate::data::sqlite::SqliteError;
use crate::data::types::{SyncCounts, SyncJobRow, SyncStatus, TriggerSource};
use crate::utils::time::now_secs;

type SyncJobTuple = (
    i64,
    String,
    String,
    i64,
    Option<i64>,
    i64,
    i64,
    i64,
    i64,
    Option<String>,
);

const SYNC_JOB_COLUMNS: &str = "id, trigger_source, status, started_at, finished_at, services_synced, apm_synced, traces_analyzed, broken_traces, error_detail";

fn from_tuple(t: SyncJobTuple) -> Result<SyncJobRow, SqliteError> {
    let (
        id,
        trigger,
        status,
        started_at,
        finished_at,
        services_synced,
        apm_synced,
        traces_analyzed,
        broken_traces,
        error_detail,
    ) = t;
    Ok(SyncJobRow {
        id,
        trigger: trigger
            .parse()
            .map_err(|e| SqliteError::corrupt("sync_jobs", "trigger_source", e))?,
        status: status
            .parse()
            .map_err(|e| SqliteError::corrupt("sync_jobs", "status", e))?,
        started_at,
        finished_at,
        counts: SyncCounts {
            services_synced,
            apm_synced,
            traces_analyzed,
            broken_traces,
        },
        error_detail,
    })
}

/// Open a new job in `running` state owned by `owner`
///
/// Returns `None` when another job is still running; the check and the insert
/// are one statement, so two processes cannot both open a job.
pub async fn open_job(
    pool: &SqlitePool,
    trigger: TriggerSource,
    owner: &str,
) -> Result<Option<SyncJobRow>, SqliteError> {
    let now = now_secs();

    let id: Option<(i64,)> = sqlx::query_as(
        r#"
        INSERT INTO sync_jobs (trigger_source, status, started_at, owner, heartbeat_at)
        SELECT ?, 'running', ?, ?, ?
        WHERE NOT EXISTS (SELECT 1 FROM sync_jobs WHERE status = 'running')
        RETURNING id
        "#,
    )
    .bind(trigger.as_str())
    .bind(now)
    .bind(owner)
    .bind(now)
    .fetch_optional(pool)
    .await?;

    Ok(id.map(|(id,)| SyncJobRow {
        id,
        trigger,
        status: SyncStatus::Running,
        started_at: now,
        finished_at: None,
        counts: SyncCounts::default(),
        error_detail: None,
    }))
}

/// Renew a running job's heartbeat; false once the job is closed
pub async fn touch_job(pool: &SqlitePool, id: i64) -> Result<bool, SqliteError> {
    let result = sqlx::query(
        "UPDATE sync_jobs SET heartbeat_at = ? WHERE id = ? AND status = 'running'",
    )
    .bind(now_secs())
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Close a running job with its final status and counts
pub async fn finish_job(
    pool: &SqlitePool,
    id: i64,
    status: SyncStatus,
    counts: SyncCounts,
    error_detail: Option<&str>,
) -> Result<SyncJobRow, SqliteError> {
    if !status.is_terminal() {
        return Err(SqliteError::corrupt(
            "sync_jobs",
            "status",
            "a job cannot be closed as running",
        ));
    }
    let now = now_secs();

    let sql = format!(
        r#"
        UPDATE sync_jobs
        SET status = ?, finished_at = ?, services_synced = ?, apm_synced = ?,
            traces_analyzed = ?, broken_traces = ?, error_detail = ?
        WHERE id = ? AND status = 'running'
        RETURNING {}
        "#,
        SYNC_JOB_COLUMNS
    );
    let row = sqlx::query_as::<_, SyncJobTuple>(&sql)
        .bind(status.as_str())
        .bind(now)
        .bind(counts.services_synced)
        .bind(counts.apm_synced)
        .bind(counts.traces_analyzed)
        .bind(counts.broken_traces)
        .bind(error_detail)
        .bind(id)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => from_tuple(row),
        None => Err(SqliteError::NotFound(format!("running sync job {}", id))),
    }
}

/// Close running jobs that can no longer finish as failed
///
/// A row is dead when `owner` opened it (the caller holds the in-process gate,
/// so none of its own cycles is in flight) or when its heartbeat is older than
/// `stale_before`. Live jobs of other processes are left alone.
pub async fn abandon_running_jobs(
    pool: &SqlitePool,
    owner: &str,
    stale_before: i64,
    reason: &str,
) -> Result<u64, SqliteError> {
    let now = now_secs();
    let result = sqlx::query(
        r#"
        UPDATE sync_jobs SET status = 'failed', finished_at = ?, error_detail = ?
        WHERE status = 'running' AND (owner = ? OR heartbeat_at < ?)
        "#,
    )
    .bind(now)
    .bind(reason)
    .bind(owner)
    .bind(stale_before)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

pub async fn get_job(pool: &SqlitePool, id: i64) -> Result<Option<SyncJobRow>, SqliteError> {
    let sql = format!("SELECT {} FROM sync_jobs WHERE id = ?", SYNC_JOB_COLUMNS);
    let row = sqlx::query_as::<_, SyncJobTuple>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    row.map(from_tuple).transpose()
}

/// Most recently started job, if any
pub async fn latest_job(pool: &SqlitePool) -> Result<Option<SyncJobRow>, SqliteError> {
    let sql = format!(
        "SELECT {} FROM sync_jobs ORDER BY started_at DESC, id DESC LIMIT 1",
        SYNC_JOB_COLUMNS
    );
    let row = sqlx::query_as::<_, SyncJobTuple>(&sql)
        .fetch_optional(pool)
        .await?;
    row.map(from_tuple).transpose()
}

/// List jobs newest first with pagination
pub async fn list_jobs(
    pool: &SqlitePool,
    page: u32,
    limit: u32,
) -> Result<(Vec<SyncJobRow>, u64), SqliteError> {
    let offset = (page.saturating_sub(1)) * limit;
    let sql = format!(
        "SELECT {} FROM sync_jobs ORDER BY started_at DESC, id DESC LIMIT ? OFFSET ?",
        SYNC_JOB_COLUMNS
    );
    let rows = sqlx::query_as::<_, SyncJobTuple>(&sql)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sync_jobs")
        .fetch_one(pool)
        .await?;

    let jobs = rows
        .into_iter()
        .map(from_tuple)
        .collect::<Result<Vec<_>, _>>()?;
    Ok((jobs, total.0 as u64))
}
