//! OpenAPI specification

use axum::http::header;
use axum::response::{IntoResponse, Json};
use utoipa::OpenApi;

use crate::api::routes::{dashboard, health, services, sync, traces};
use crate::api::types::PaginationMeta;
use crate::data::types::{
    ApmPresence, FilterOptions, InfraCoverage, SyncCounts, SyncStatus, TriggerSource,
};
use crate::domain::sync::{PhaseOutcome, PhaseReport, SyncPhase};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "ApmTrack API",
        version = env!("CARGO_PKG_VERSION"),
        description = "APM coverage and broken trace reporting"
    ),
    tags(
        (name = "health", description = "Health check endpoint"),
        (name = "services", description = "Service catalog with APM status"),
        (name = "traces", description = "Broken traces"),
        (name = "dashboard", description = "Coverage summary"),
        (name = "sync", description = "Sync trigger and job history")
    ),
    paths(
        health::health,
        services::list_services_handler,
        services::get_service_filters,
        services::get_service_detail,
        traces::list_traces,
        traces::get_trace,
        dashboard::get_dashboard,
        sync::trigger_sync,
        sync::get_latest_job,
        sync::list_sync_jobs,
    ),
    components(schemas(
        PaginationMeta,
        health::HealthResponse,
        // Services
        services::types::ServiceDto,
        services::types::ApmStatusDto,
        services::types::ServiceDetailDto,
        services::types::ListServicesQuery,
        ApmPresence,
        FilterOptions,
        // Traces
        traces::types::BrokenTraceDto,
        traces::types::MissingServiceDto,
        traces::types::TraceDetailDto,
        traces::types::ListTracesQuery,
        // Dashboard
        dashboard::DashboardDto,
        InfraCoverage,
        // Sync
        sync::types::SyncJobDto,
        sync::types::SyncRunDto,
        sync::types::SyncAcceptedDto,
        sync::types::ListJobsQuery,
        sync::types::TriggerSyncQuery,
        SyncCounts,
        SyncStatus,
        TriggerSource,
        SyncPhase,
        PhaseOutcome,
        PhaseReport,
    ))
)]
pub struct ApiDoc;

pub async fn openapi_json() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/json")],
        Json(ApiDoc::openapi()),
    )
}
