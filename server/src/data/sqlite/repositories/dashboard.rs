//! Dashboard aggregates

use sqlx::SqlitePool;

use crate::data::sqlite::SqliteError;
use crate::data::types::{DashboardStats, InfraCoverage};

use super::apm_status::count_with_apm;
use super::broken_trace::count_broken_since;

/// Coverage aggregates; broken traces are counted from `broken_since` (unix seconds)
pub async fn get_dashboard_stats(
    pool: &SqlitePool,
    broken_since: i64,
) -> Result<DashboardStats, SqliteError> {
    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM services")
        .fetch_one(pool)
        .await?;

    let uncovered = sqlx::query_as::<_, (String,)>(
        r#"
        SELECT s.name FROM services s
        LEFT JOIN apm_status a ON a.service_name = s.name
        WHERE s.customer_facing = 1 AND a.service_name IS NULL
        ORDER BY s.name
        "#,
    )
    .fetch_all(pool)
    .await?;

    let breakdown = sqlx::query_as::<_, (String, i64, i64)>(
        r#"
        SELECT COALESCE(s.infra_type, 'Unknown') AS infra,
               COUNT(*),
               COUNT(a.service_name)
        FROM services s
        LEFT JOIN apm_status a ON a.service_name = s.name
        GROUP BY infra
        ORDER BY infra
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(DashboardStats {
        total_services: total.0,
        services_with_apm: count_with_apm(pool).await?,
        customer_facing_without_apm: uncovered.into_iter().map(|(n,)| n).collect(),
        recent_broken_traces: count_broken_since(pool, broken_since).await?,
        infra_breakdown: breakdown
            .into_iter()
            .map(|(infra_type, total, with_apm)| InfraCoverage {
                infra_type,
                total,
                with_apm,
            })
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sqlite::repositories::apm_status::upsert_apm_statuses;
    use crate::data::sqlite::repositories::service::upsert_services;
    use crate::data::sqlite::repositories::test_support::setup_test_pool;
    use crate::data::types::{ApmStatusRecord, ServiceRecord};

    fn service(name: &str, infra: Option<&str>, customer_facing: bool) -> ServiceRecord {
        ServiceRecord {
            name: name.to_string(),
            team: None,
            environment: Some("prod".to_string()),
            infra_type: infra.map(str::to_string),
            customer_facing,
            tags: Vec::new(),
            dependencies: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_empty_store() {
        let pool = setup_test_pool().await;
        let stats = get_dashboard_stats(&pool, 0).await.unwrap();
        assert_eq!(stats, DashboardStats::default());
    }

    #[tokio::test]
    async fn test_coverage_aggregates() {
        let pool = setup_test_pool().await;
        upsert_services(
            &pool,
            &[
                service("checkout", Some("Container"), true),
                service("web", Some("Container"), true),
                service("thumbnailer", Some("Serverless"), false),
                service("legacy", None, false),
            ],
        )
        .await
        .unwrap();
        upsert_apm_statuses(
            &pool,
            &[ApmStatusRecord {
                service_name: "checkout".to_string(),
                language: Some("Java".to_string()),
                span_count: 120,
                last_seen_at: None,
            }],
        )
        .await
        .unwrap();

        let stats = get_dashboard_stats(&pool, 0).await.unwrap();
        assert_eq!(stats.total_services, 4);
        assert_eq!(stats.services_with_apm, 1);
        assert_eq!(stats.customer_facing_without_apm, vec!["web".to_string()]);
        assert_eq!(stats.recent_broken_traces, 0);
        assert_eq!(
            stats.infra_breakdown,
            vec![
                InfraCoverage {
                    infra_type: "Container".to_string(),
                    total: 2,
                    with_apm: 1
                },
                InfraCoverage {
                    infra_type: "Serverless".to_string(),
                    total: 1,
                    with_apm: 0
                },
                InfraCoverage {
                    infra_type: "Unknown".to_string(),
                    total: 1,
                    with_apm: 0
                },
            ]
        );
    }
}
