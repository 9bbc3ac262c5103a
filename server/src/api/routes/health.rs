//! Health check endpoint

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use serde::Serialize;
use utoipa::ToSchema;

use crate::data::SqliteService;
use crate::domain::sync::SyncTrigger;

#[derive(Clone)]
pub struct HealthApiState {
    pub database: Arc<SqliteService>,
    pub trigger: SyncTrigger,
}

pub fn routes(database: Arc<SqliteService>, trigger: SyncTrigger) -> Router<()> {
    Router::new()
        .route("/", get(health))
        .with_state(HealthApiState { database, trigger })
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    /// `ok`, or `degraded` when the database is unreachable
    pub status: &'static str,
    pub version: &'static str,
    pub sync_running: bool,
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Database unreachable", body = HealthResponse)
    )
)]
pub async fn health(State(state): State<HealthApiState>) -> impl IntoResponse {
    let db_ok = sqlx::query("SELECT 1")
        .execute(state.database.pool())
        .await
        .inspect_err(|e| tracing::warn!(error = %e, "Health check database ping failed"))
        .is_ok();

    let (code, status) = if db_ok {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };
    (
        code,
        Json(HealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION"),
            sync_running: state.trigger.is_running(),
        }),
    )
}
