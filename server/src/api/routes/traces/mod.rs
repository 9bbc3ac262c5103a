//! Broken trace API endpoints

pub mod types;

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::extractors::{TracePath, ValidatedQuery};
use crate::api::types::{ApiError, PaginatedResponse};
use crate::data::SqliteService;
use crate::data::sqlite::repositories::{get_broken_trace, get_services_by_name, list_broken_traces};

use types::{BrokenTraceDto, ListTracesQuery, MissingServiceDto, TraceDetailDto};

#[derive(Clone)]
pub struct TracesApiState {
    pub database: Arc<SqliteService>,
}

pub fn routes(database: Arc<SqliteService>) -> Router<()> {
    let state = TracesApiState { database };

    Router::new()
        .route("/", get(list_traces))
        .route("/{trace_id}", get(get_trace))
        .with_state(state)
}

/// List broken traces, newest first
#[utoipa::path(
    get,
    path = "/api/v1/traces",
    tag = "traces",
    params(
        ("page" = Option<u32>, Query, description = "Page number"),
        ("limit" = Option<u32>, Query, description = "Items per page (1-500)"),
        ("service" = Option<String>, Query, description = "Rooted at or missing this service")
    ),
    responses(
        (status = 200, description = "Broken traces with pagination metadata"),
        (status = 400, description = "Invalid query")
    )
)]
pub async fn list_traces(
    State(state): State<TracesApiState>,
    ValidatedQuery(query): ValidatedQuery<ListTracesQuery>,
) -> Result<Json<PaginatedResponse<BrokenTraceDto>>, ApiError> {
    let (traces, total) = list_broken_traces(
        state.database.pool(),
        query.service.as_deref(),
        query.page,
        query.limit,
    )
    .await
    .map_err(ApiError::from_sqlite)?;

    let data = traces.into_iter().map(BrokenTraceDto::from).collect();
    Ok(Json(PaginatedResponse::new(
        data,
        query.page,
        query.limit,
        total,
    )))
}

/// Broken trace detail
#[utoipa::path(
    get,
    path = "/api/v1/traces/{trace_id}",
    tag = "traces",
    params(("trace_id" = String, Path, description = "Trace ID")),
    responses(
        (status = 200, description = "Broken trace detail", body = TraceDetailDto),
        (status = 404, description = "Trace is not recorded as broken")
    )
)]
pub async fn get_trace(
    State(state): State<TracesApiState>,
    path: TracePath,
) -> Result<Json<TraceDetailDto>, ApiError> {
    let pool = state.database.pool();

    let trace = get_broken_trace(pool, &path.trace_id)
        .await
        .map_err(ApiError::from_sqlite)?
        .ok_or_else(|| {
            ApiError::not_found(
                "TRACE_NOT_FOUND",
                format!("Broken trace not found: {}", path.trace_id),
            )
        })?;

    let known = get_services_by_name(pool, &trace.missing)
        .await
        .map_err(ApiError::from_sqlite)?;

    Ok(Json(TraceDetailDto {
        trace: BrokenTraceDto::from(trace),
        missing_service_details: known.into_iter().map(MissingServiceDto::from).collect(),
    }))
}
