//! Service API types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::api::routes::traces::types::BrokenTraceDto;
use crate::api::types::{default_page, default_service_limit, validate_limit, validate_page};
use crate::utils::time::{opt_secs_to_datetime, secs_to_datetime};
use crate::data::types::{ApmPresence, ApmStatusRow, ServiceFilter, ServiceWithApm, TagFilter};

/// APM instrumentation seen for a service
#[derive(Debug, Serialize, ToSchema)]
pub struct ApmStatusDto {
    pub language: Option<String>,
    pub span_count: i64,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl From<ApmStatusRow> for ApmStatusDto {
    fn from(row: ApmStatusRow) -> Self {
        Self {
            language: row.language,
            span_count: row.span_count,
            last_seen_at: opt_secs_to_datetime(row.last_seen_at),
            updated_at: secs_to_datetime(row.updated_at),
        }
    }
}

/// Catalog service with its APM status
#[derive(Debug, Serialize, ToSchema)]
pub struct ServiceDto {
    pub name: String,
    pub team: Option<String>,
    pub environment: Option<String>,
    pub infra_type: Option<String>,
    pub customer_facing: bool,
    pub tags: Vec<String>,
    pub dependencies: Vec<String>,
    pub apm_enabled: bool,
    /// Null when the service has never reported APM data
    pub apm: Option<ApmStatusDto>,
    /// Last catalog sync that saw this service
    pub last_synced_at: DateTime<Utc>,
}

impl From<ServiceWithApm> for ServiceDto {
    fn from(joined: ServiceWithApm) -> Self {
        let row = joined.service;
        Self {
            name: row.name,
            team: row.team,
            environment: row.environment,
            infra_type: row.infra_type,
            customer_facing: row.customer_facing,
            tags: row.tags,
            dependencies: row.dependencies,
            apm_enabled: joined.apm.is_some(),
            apm: joined.apm.map(ApmStatusDto::from),
            last_synced_at: secs_to_datetime(row.last_synced_at),
        }
    }
}

/// Service detail with reverse dependencies and recent broken traces
#[derive(Debug, Serialize, ToSchema)]
pub struct ServiceDetailDto {
    #[serde(flatten)]
    pub service: ServiceDto,
    /// Services that declare this one as a dependency
    pub dependents: Vec<String>,
    pub recent_broken_traces: Vec<BrokenTraceDto>,
}

/// Query params for listing services
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ListServicesQuery {
    #[serde(default = "default_page")]
    #[validate(custom(function = "validate_page"))]
    pub page: u32,

    #[serde(default = "default_service_limit")]
    #[validate(custom(function = "validate_limit"))]
    pub limit: u32,

    #[validate(length(max = 256, message = "team must be at most 256 characters"))]
    pub team: Option<String>,

    #[validate(length(max = 256, message = "environment must be at most 256 characters"))]
    pub environment: Option<String>,

    #[validate(length(max = 64, message = "infra_type must be at most 64 characters"))]
    pub infra_type: Option<String>,

    pub apm_status: Option<ApmPresence>,

    /// Case-insensitive substring of the service name
    #[validate(length(max = 256, message = "search must be at most 256 characters"))]
    pub search: Option<String>,

    /// `key:value`, `key=value` or a bare `key`
    #[validate(length(max = 512, message = "tag must be at most 512 characters"))]
    pub tag: Option<String>,

    pub customer_facing: Option<bool>,
}

impl ListServicesQuery {
    pub fn filter(&self) -> ServiceFilter {
        ServiceFilter {
            team: non_empty(&self.team),
            environment: non_empty(&self.environment),
            infra_type: non_empty(&self.infra_type),
            apm: self.apm_status,
            name_contains: non_empty(&self.search),
            customer_facing: self.customer_facing,
            tag: self.tag.as_deref().and_then(TagFilter::parse),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
