//! Service catalog API endpoints

pub mod types;

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::extractors::{ServicePath, ValidatedQuery};
use crate::api::routes::traces::types::BrokenTraceDto;
use crate::api::types::{ApiError, PaginatedResponse};
use crate::data::SqliteService;
use crate::data::sqlite::repositories::{
    get_filter_options, get_service, list_broken_for_service, list_dependents, list_services,
};
use crate::data::types::FilterOptions;

use types::{ListServicesQuery, ServiceDetailDto, ServiceDto};

/// Broken traces shown on the service detail
const SERVICE_DETAIL_TRACE_LIMIT: u32 = 10;

#[derive(Clone)]
pub struct ServicesApiState {
    pub database: Arc<SqliteService>,
}

pub fn routes(database: Arc<SqliteService>) -> Router<()> {
    let state = ServicesApiState { database };

    Router::new()
        .route("/", get(list_services_handler))
        .route("/filters", get(get_service_filters))
        .route("/{name}", get(get_service_detail))
        .with_state(state)
}

/// List catalog services with their APM status
#[utoipa::path(
    get,
    path = "/api/v1/services",
    tag = "services",
    params(
        ("page" = Option<u32>, Query, description = "Page number"),
        ("limit" = Option<u32>, Query, description = "Items per page (1-500)"),
        ("team" = Option<String>, Query, description = "Exact team"),
        ("environment" = Option<String>, Query, description = "Exact environment"),
        ("infra_type" = Option<String>, Query, description = "Exact infrastructure type"),
        ("apm_status" = Option<String>, Query, description = "enabled or disabled"),
        ("search" = Option<String>, Query, description = "Case-insensitive name substring"),
        ("tag" = Option<String>, Query, description = "key:value, key=value or key"),
        ("customer_facing" = Option<bool>, Query, description = "Customer-facing flag")
    ),
    responses(
        (status = 200, description = "Services with pagination metadata"),
        (status = 400, description = "Invalid query")
    )
)]
pub async fn list_services_handler(
    State(state): State<ServicesApiState>,
    ValidatedQuery(query): ValidatedQuery<ListServicesQuery>,
) -> Result<Json<PaginatedResponse<ServiceDto>>, ApiError> {
    let (services, total) = list_services(
        state.database.pool(),
        &query.filter(),
        query.page,
        query.limit,
    )
    .await
    .map_err(ApiError::from_sqlite)?;

    let data = services.into_iter().map(ServiceDto::from).collect();
    Ok(Json(PaginatedResponse::new(
        data,
        query.page,
        query.limit,
        total,
    )))
}

/// Distinct teams, environments and infrastructure types
#[utoipa::path(
    get,
    path = "/api/v1/services/filters",
    tag = "services",
    responses(
        (status = 200, description = "Filter options", body = FilterOptions)
    )
)]
pub async fn get_service_filters(
    State(state): State<ServicesApiState>,
) -> Result<Json<FilterOptions>, ApiError> {
    let options = get_filter_options(state.database.pool())
        .await
        .map_err(ApiError::from_sqlite)?;
    Ok(Json(options))
}

/// Service detail
#[utoipa::path(
    get,
    path = "/api/v1/services/{name}",
    tag = "services",
    params(("name" = String, Path, description = "Service name")),
    responses(
        (status = 200, description = "Service detail", body = ServiceDetailDto),
        (status = 404, description = "Service not in the catalog")
    )
)]
pub async fn get_service_detail(
    State(state): State<ServicesApiState>,
    path: ServicePath,
) -> Result<Json<ServiceDetailDto>, ApiError> {
    let pool = state.database.pool();

    let service = get_service(pool, &path.name)
        .await
        .map_err(ApiError::from_sqlite)?
        .ok_or_else(|| {
            ApiError::not_found(
                "SERVICE_NOT_FOUND",
                format!("Service not found: {}", path.name),
            )
        })?;

    let dependents = list_dependents(pool, &path.name)
        .await
        .map_err(ApiError::from_sqlite)?;
    let traces = list_broken_for_service(pool, &path.name, SERVICE_DETAIL_TRACE_LIMIT)
        .await
        .map_err(ApiError::from_sqlite)?;

    Ok(Json(ServiceDetailDto {
        service: ServiceDto::from(service),
        dependents,
        recent_broken_traces: traces.into_iter().map(BrokenTraceDto::from).collect(),
    }))
}
