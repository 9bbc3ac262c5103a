//! Broken trace API types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::api::types::{default_page, default_trace_limit, validate_limit, validate_page};
use crate::utils::time::secs_to_datetime;
use crate::data::types::{BrokenTraceRow, ServiceRow};

/// A trace missing spans from services it was expected to touch
#[derive(Debug, Serialize, ToSchema)]
pub struct BrokenTraceDto {
    pub trace_id: String,
    pub root_service: Option<String>,
    /// `missing_services` or `root_not_sampled`
    pub reason: String,
    pub expected_services: Vec<String>,
    pub missing_services: Vec<String>,
    pub span_count: i64,
    pub detected_at: DateTime<Utc>,
}

impl From<BrokenTraceRow> for BrokenTraceDto {
    fn from(row: BrokenTraceRow) -> Self {
        Self {
            trace_id: row.trace_id,
            root_service: row.root_service,
            reason: row.reason,
            expected_services: row.expected,
            missing_services: row.missing,
            span_count: row.span_count,
            detected_at: secs_to_datetime(row.detected_at),
        }
    }
}

/// Catalog entry of a service absent from a broken trace
#[derive(Debug, Serialize, ToSchema)]
pub struct MissingServiceDto {
    pub name: String,
    pub team: Option<String>,
    pub environment: Option<String>,
    pub infra_type: Option<String>,
    pub customer_facing: bool,
}

impl From<ServiceRow> for MissingServiceDto {
    fn from(row: ServiceRow) -> Self {
        Self {
            name: row.name,
            team: row.team,
            environment: row.environment,
            infra_type: row.infra_type,
            customer_facing: row.customer_facing,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TraceDetailDto {
    #[serde(flatten)]
    pub trace: BrokenTraceDto,
    /// Catalog rows for missing services that are known to the catalog
    pub missing_service_details: Vec<MissingServiceDto>,
}

/// Query params for listing broken traces
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ListTracesQuery {
    #[serde(default = "default_page")]
    #[validate(custom(function = "validate_page"))]
    pub page: u32,

    #[serde(default = "default_trace_limit")]
    #[validate(custom(function = "validate_limit"))]
    pub limit: u32,

    /// Only traces rooted at or missing this service
    #[validate(length(min = 1, max = 256, message = "service must be 1-256 characters"))]
    pub service: Option<String>,
}
