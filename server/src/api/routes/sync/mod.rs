//! Sync trigger and job history endpoints

pub mod types;

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::extractors::ValidatedQuery;
use crate::api::types::{ApiError, PaginatedResponse};
use crate::data::SqliteService;
use crate::data::sqlite::repositories::{latest_job, list_jobs};
use crate::data::types::TriggerSource;
use crate::domain::sync::{SyncTrigger, TriggerError};

use types::{ListJobsQuery, SyncAcceptedDto, SyncJobDto, SyncRunDto, TriggerSyncQuery};

#[derive(Clone)]
pub struct SyncApiState {
    pub database: Arc<SqliteService>,
    pub trigger: SyncTrigger,
}

pub fn routes(database: Arc<SqliteService>, trigger: SyncTrigger) -> Router<()> {
    let state = SyncApiState { database, trigger };

    Router::new()
        .route("/", post(trigger_sync))
        .route("/latest", get(get_latest_job))
        .route("/jobs", get(list_sync_jobs))
        .with_state(state)
}

impl From<TriggerError> for ApiError {
    fn from(e: TriggerError) -> Self {
        match e {
            TriggerError::AlreadyRunning => {
                ApiError::conflict("SYNC_IN_PROGRESS", "A sync cycle is already running")
            }
            TriggerError::Sync(e) => {
                tracing::error!(error = %e, "Sync cycle could not be recorded");
                ApiError::internal("Sync cycle could not be recorded")
            }
            TriggerError::Task(e) => {
                tracing::error!(error = %e, "Sync cycle task failed");
                ApiError::internal("Sync cycle task failed")
            }
        }
    }
}

/// Start a sync cycle
///
/// With `wait=true` the cycle runs to completion and its summary is
/// returned; otherwise it runs in the background and 202 is returned. Either
/// way the cycle runs on its own task, so a dropped connection only ends the
/// wait.
#[utoipa::path(
    post,
    path = "/api/v1/sync",
    tag = "sync",
    params(("wait" = Option<bool>, Query, description = "Wait for the cycle to finish")),
    responses(
        (status = 200, description = "Cycle finished", body = SyncRunDto),
        (status = 202, description = "Cycle started", body = SyncAcceptedDto),
        (status = 409, description = "A cycle is already running")
    )
)]
pub async fn trigger_sync(
    State(state): State<SyncApiState>,
    ValidatedQuery(query): ValidatedQuery<TriggerSyncQuery>,
) -> Result<Response, ApiError> {
    if query.wait {
        let summary = state.trigger.run_now(TriggerSource::Manual).await?;
        return Ok(Json(SyncRunDto::from(summary)).into_response());
    }

    // Detached: the cycle outlives this request
    state.trigger.spawn_now(TriggerSource::Manual)?;
    Ok((
        StatusCode::ACCEPTED,
        Json(SyncAcceptedDto {
            accepted: true,
            trigger: TriggerSource::Manual,
        }),
    )
        .into_response())
}

/// Most recent sync job
#[utoipa::path(
    get,
    path = "/api/v1/sync/latest",
    tag = "sync",
    responses(
        (status = 200, description = "Latest job", body = SyncJobDto),
        (status = 404, description = "No sync has run yet")
    )
)]
pub async fn get_latest_job(
    State(state): State<SyncApiState>,
) -> Result<Json<SyncJobDto>, ApiError> {
    let job = latest_job(state.database.pool())
        .await
        .map_err(ApiError::from_sqlite)?
        .ok_or_else(|| ApiError::not_found("NO_SYNC_JOBS", "No sync job has run yet"))?;
    Ok(Json(SyncJobDto::from(job)))
}

/// Sync job history, newest first
#[utoipa::path(
    get,
    path = "/api/v1/sync/jobs",
    tag = "sync",
    params(
        ("page" = Option<u32>, Query, description = "Page number"),
        ("limit" = Option<u32>, Query, description = "Items per page (1-500)")
    ),
    responses(
        (status = 200, description = "Sync jobs with pagination metadata")
    )
)]
pub async fn list_sync_jobs(
    State(state): State<SyncApiState>,
    ValidatedQuery(query): ValidatedQuery<ListJobsQuery>,
) -> Result<Json<PaginatedResponse<SyncJobDto>>, ApiError> {
    let (jobs, total) = list_jobs(state.database.pool(), query.page, query.limit)
        .await
        .map_err(ApiError::from_sqlite)?;
    let data = jobs.into_iter().map(SyncJobDto::from).collect();
    Ok(Json(PaginatedResponse::new(
        data,
        query.page,
        query.limit,
        total,
    )))
}
