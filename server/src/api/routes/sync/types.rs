//! Sync job API types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::api::types::{default_job_limit, default_page, validate_limit, validate_page};
use crate::utils::time::{opt_secs_to_datetime, secs_to_datetime};
use crate::data::types::{SyncCounts, SyncJobRow, SyncStatus, TriggerSource};
use crate::domain::sync::{PhaseReport, SyncJobSummary};

#[derive(Debug, Serialize, ToSchema)]
pub struct SyncJobDto {
    pub id: i64,
    pub trigger: TriggerSource,
    pub status: SyncStatus,
    pub started_at: DateTime<Utc>,
    /// Null while the job is running
    pub finished_at: Option<DateTime<Utc>>,
    pub counts: SyncCounts,
    pub error_detail: Option<String>,
}

impl From<SyncJobRow> for SyncJobDto {
    fn from(row: SyncJobRow) -> Self {
        Self {
            id: row.id,
            trigger: row.trigger,
            status: row.status,
            started_at: secs_to_datetime(row.started_at),
            finished_at: opt_secs_to_datetime(row.finished_at),
            counts: row.counts,
            error_detail: row.error_detail,
        }
    }
}

/// Result of a synchronous sync run
#[derive(Debug, Serialize, ToSchema)]
pub struct SyncRunDto {
    pub job: SyncJobDto,
    pub phases: Vec<PhaseReport>,
}

impl From<SyncJobSummary> for SyncRunDto {
    fn from(summary: SyncJobSummary) -> Self {
        Self {
            job: SyncJobDto::from(summary.job),
            phases: summary.phases,
        }
    }
}

/// Response for a sync started in the background
#[derive(Debug, Serialize, ToSchema)]
pub struct SyncAcceptedDto {
    pub accepted: bool,
    pub trigger: TriggerSource,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct TriggerSyncQuery {
    /// Wait for the cycle to finish and return its summary
    #[serde(default)]
    pub wait: bool,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ListJobsQuery {
    #[serde(default = "default_page")]
    #[validate(custom(function = "validate_page"))]
    pub page: u32,

    #[serde(default = "default_job_limit")]
    #[validate(custom(function = "validate_limit"))]
    pub limit: u32,
}
