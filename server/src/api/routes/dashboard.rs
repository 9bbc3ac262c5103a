//! Coverage dashboard endpoint

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use utoipa::ToSchema;

use crate::api::routes::sync::types::SyncJobDto;
use crate::api::types::ApiError;
use crate::core::constants::RECENT_BROKEN_TRACE_HOURS;
use crate::data::SqliteService;
use crate::data::sqlite::repositories::{get_dashboard_stats, latest_job};
use crate::data::types::InfraCoverage;
use crate::utils::time::now_secs;

#[derive(Clone)]
pub struct DashboardApiState {
    pub database: Arc<SqliteService>,
}

pub fn routes(database: Arc<SqliteService>) -> Router<()> {
    Router::new()
        .route("/", get(get_dashboard))
        .with_state(DashboardApiState { database })
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardDto {
    pub total_services: i64,
    pub services_with_apm: i64,
    /// Share of catalog services with APM, 0-100 with one decimal
    pub apm_coverage_pct: f64,
    pub customer_facing_without_apm_count: usize,
    pub customer_facing_without_apm: Vec<String>,
    pub recent_broken_traces: i64,
    pub recent_window_hours: i64,
    pub infra_breakdown: Vec<InfraCoverage>,
    pub latest_job: Option<SyncJobDto>,
}

pub fn coverage_pct(with_apm: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    (with_apm as f64 * 1000.0 / total as f64).round() / 10.0
}

/// APM coverage summary
#[utoipa::path(
    get,
    path = "/api/v1/dashboard",
    tag = "dashboard",
    responses(
        (status = 200, description = "Coverage summary", body = DashboardDto)
    )
)]
pub async fn get_dashboard(
    State(state): State<DashboardApiState>,
) -> Result<Json<DashboardDto>, ApiError> {
    let pool = state.database.pool();
    let since = now_secs() - RECENT_BROKEN_TRACE_HOURS * 3600;

    let stats = get_dashboard_stats(pool, since)
        .await
        .map_err(ApiError::from_sqlite)?;
    let latest = latest_job(pool).await.map_err(ApiError::from_sqlite)?;

    Ok(Json(DashboardDto {
        apm_coverage_pct: coverage_pct(stats.services_with_apm, stats.total_services),
        total_services: stats.total_services,
        services_with_apm: stats.services_with_apm,
        customer_facing_without_apm_count: stats.customer_facing_without_apm.len(),
        customer_facing_without_apm: stats.customer_facing_without_apm,
        recent_broken_traces: stats.recent_broken_traces,
        recent_window_hours: RECENT_BROKEN_TRACE_HOURS,
        infra_breakdown: stats.infra_breakdown,
        latest_job: latest.map(SyncJobDto::from),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coverage_pct() {
        assert_eq!(coverage_pct(0, 0), 0.0);
        assert_eq!(coverage_pct(1, 3), 33.3);
        assert_eq!(coverage_pct(2, 3), 66.7);
        assert_eq!(coverage_pct(4, 4), 100.0);
    }
}
