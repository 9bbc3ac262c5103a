//! APM status repository
//!
//! One row per instrumented service. A service with no row here has never
//! reported APM data; rows are never written to signal absence.

use sqlx::SqlitePool;

use crate::data::sqlite::SqliteError;
use crate::data::types::{ApmStatusRecord, ApmStatusRow};
use crate::utils::time::now_secs;

/// Upsert one page of APM records in a single transaction
pub async fn upsert_apm_statuses(
    pool: &SqlitePool,
    records: &[ApmStatusRecord],
) -> Result<u64, SqliteError> {
    if records.is_empty() {
        return Ok(0);
    }
    let now = now_secs();

    let mut tx = pool.begin().await?;
    for record in records {
        sqlx::query(
            r#"
            INSERT INTO apm_status (service_name, language, span_count, last_seen_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(service_name) DO UPDATE SET
                language = excluded.language,
                span_count = excluded.span_count,
                last_seen_at = excluded.last_seen_at,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&record.service_name)
        .bind(&record.language)
        .bind(record.span_count.max(0))
        .bind(record.last_seen_at)
        .bind(now)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    Ok(records.len() as u64)
}

pub async fn get_apm_status(
    pool: &SqlitePool,
    service_name: &str,
) -> Result<Option<ApmStatusRow>, SqliteError> {
    let row = sqlx::query_as::<_, (String, Option<String>, i64, Option<i64>, i64)>(
        "SELECT service_name, language, span_count, last_seen_at, updated_at FROM apm_status WHERE service_name = ?",
    )
    .bind(service_name)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(
        |(service_name, language, span_count, last_seen_at, updated_at)| ApmStatusRow {
            service_name,
            language,
            span_count,
            last_seen_at,
            updated_at,
        },
    ))
}

/// Number of catalog services that have an APM status row
pub async fn count_with_apm(pool: &SqlitePool) -> Result<i64, SqliteError> {
    let count: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM services s JOIN apm_status a ON a.service_name = s.name",
    )
    .fetch_one(pool)
    .await?;
    Ok(count.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sqlite::repositories::service::upsert_services;
    use crate::data::sqlite::repositories::test_support::setup_test_pool;
    use crate::data::types::ServiceRecord;

    fn apm(name: &str, language: Option<&str>, span_count: i64) -> ApmStatusRecord {
        ApmStatusRecord {
            service_name: name.to_string(),
            language: language.map(str::to_string),
            span_count,
            last_seen_at: Some(1_700_000_000),
        }
    }

    #[tokio::test]
    async fn test_upsert_and_get() {
        let pool = setup_test_pool().await;
        upsert_apm_statuses(&pool, &[apm("checkout", Some("Java"), 120)])
            .await
            .unwrap();

        let row = get_apm_status(&pool, "checkout").await.unwrap().unwrap();
        assert_eq!(row.language.as_deref(), Some("Java"));
        assert_eq!(row.span_count, 120);

        upsert_apm_statuses(&pool, &[apm("checkout", None, 5)])
            .await
            .unwrap();
        let row = get_apm_status(&pool, "checkout").await.unwrap().unwrap();
        assert_eq!(row.language, None);
        assert_eq!(row.span_count, 5);
    }

    #[tokio::test]
    async fn test_status_without_catalog_row_is_allowed() {
        let pool = setup_test_pool().await;
        upsert_apm_statuses(&pool, &[apm("orphan", Some("Go"), 1)])
            .await
            .unwrap();
        assert!(get_apm_status(&pool, "orphan").await.unwrap().is_some());
        // Not counted until the catalog knows the service
        assert_eq!(count_with_apm(&pool).await.unwrap(), 0);

        upsert_services(
            &pool,
            &[ServiceRecord {
                name: "orphan".to_string(),
                team: None,
                environment: None,
                infra_type: None,
                customer_facing: false,
                tags: Vec::new(),
                dependencies: Vec::new(),
            }],
        )
        .await
        .unwrap();
        assert_eq!(count_with_apm(&pool).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_negative_span_count_is_clamped() {
        let pool = setup_test_pool().await;
        upsert_apm_statuses(&pool, &[apm("checkout", None, -3)])
            .await
            .unwrap();
        let row = get_apm_status(&pool, "checkout").await.unwrap().unwrap();
        assert_eq!(row.span_count, 0);
    }
}
