//! Row and record types for the reconciled store
//!
//! Rows mirror the SQLite tables; records are the write-side inputs the sync
//! engine hands to repositories. Timestamps are unix seconds.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// ============================================================================
// Sync job enums
// ============================================================================

/// Outcome of a sync cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Running,
    Success,
    PartialFailure,
    Failed,
}

impl SyncStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Running => "running",
            SyncStatus::Success => "success",
            SyncStatus::PartialFailure => "partial_failure",
            SyncStatus::Failed => "failed",
        }
    }

    pub const fn is_terminal(&self) -> bool {
        !matches!(self, SyncStatus::Running)
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(SyncStatus::Running),
            "success" => Ok(SyncStatus::Success),
            "partial_failure" => Ok(SyncStatus::PartialFailure),
            "failed" => Ok(SyncStatus::Failed),
            _ => Err(format!("Unknown sync status: {}", s)),
        }
    }
}

/// What started a sync cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSource {
    Scheduled,
    Manual,
    Startup,
    Cli,
}

impl TriggerSource {
    pub const fn as_str(&self) -> &'static str {
        match self {
            TriggerSource::Scheduled => "scheduled",
            TriggerSource::Manual => "manual",
            TriggerSource::Startup => "startup",
            TriggerSource::Cli => "cli",
        }
    }
}

impl fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TriggerSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(TriggerSource::Scheduled),
            "manual" => Ok(TriggerSource::Manual),
            "startup" => Ok(TriggerSource::Startup),
            "cli" => Ok(TriggerSource::Cli),
            _ => Err(format!("Unknown sync trigger: {}", s)),
        }
    }
}

// ============================================================================
// Write-side records
// ============================================================================

/// Catalog attributes written on every catalog sync (last write wins)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRecord {
    pub name: String,
    pub team: Option<String>,
    pub environment: Option<String>,
    pub infra_type: Option<String>,
    pub customer_facing: bool,
    pub tags: Vec<String>,
    pub dependencies: Vec<String>,
}

/// APM instrumentation observed for one service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApmStatusRecord {
    pub service_name: String,
    pub language: Option<String>,
    pub span_count: i64,
    pub last_seen_at: Option<i64>,
}

/// A trace flagged as broken by the analyzer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokenTraceRecord {
    pub trace_id: String,
    pub root_service: Option<String>,
    pub reason: String,
    pub expected: Vec<String>,
    pub missing: Vec<String>,
    pub span_count: i64,
}

/// Aggregate counts written when a job closes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct SyncCounts {
    pub services_synced: i64,
    pub apm_synced: i64,
    pub traces_analyzed: i64,
    pub broken_traces: i64,
}

// ============================================================================
// Rows
// ============================================================================

/// Service row from database
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceRow {
    pub name: String,
    pub team: Option<String>,
    pub environment: Option<String>,
    pub infra_type: Option<String>,
    pub customer_facing: bool,
    pub tags: Vec<String>,
    pub dependencies: Vec<String>,
    pub last_synced_at: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// APM status row from database
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApmStatusRow {
    pub service_name: String,
    pub language: Option<String>,
    pub span_count: i64,
    pub last_seen_at: Option<i64>,
    pub updated_at: i64,
}

/// Service joined with its APM status (absent when never instrumented)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceWithApm {
    pub service: ServiceRow,
    pub apm: Option<ApmStatusRow>,
}

/// Broken trace row from database
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrokenTraceRow {
    pub trace_id: String,
    pub root_service: Option<String>,
    pub reason: String,
    pub expected: Vec<String>,
    pub missing: Vec<String>,
    pub span_count: i64,
    pub detected_at: i64,
}

/// Sync job row from database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct SyncJobRow {
    pub id: i64,
    pub trigger: TriggerSource,
    pub status: SyncStatus,
    pub started_at: i64,
    pub finished_at: Option<i64>,
    pub counts: SyncCounts,
    pub error_detail: Option<String>,
}

// ============================================================================
// Reporting queries
// ============================================================================

/// APM presence filter for service listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ApmPresence {
    Enabled,
    Disabled,
}

/// Tag filter: exact `key:value` match or presence of `key`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagFilter {
    KeyValue(String, String),
    Key(String),
}

impl TagFilter {
    /// Parse `key:value`, `key=value` or a bare `key`
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        let split = raw.split_once(':').or_else(|| raw.split_once('='));
        match split {
            Some((key, value)) if !value.is_empty() => {
                Some(TagFilter::KeyValue(key.to_string(), value.to_string()))
            }
            Some((key, _)) => Some(TagFilter::Key(key.to_string())),
            None => Some(TagFilter::Key(raw.to_string())),
        }
    }
}

/// Filters for the service listing
#[derive(Debug, Clone, Default)]
pub struct ServiceFilter {
    pub team: Option<String>,
    pub environment: Option<String>,
    pub infra_type: Option<String>,
    pub apm: Option<ApmPresence>,
    pub name_contains: Option<String>,
    pub customer_facing: Option<bool>,
    pub tag: Option<TagFilter>,
}

/// Distinct values available for service filters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct FilterOptions {
    pub teams: Vec<String>,
    pub environments: Vec<String>,
    pub infra_types: Vec<String>,
}

/// APM coverage for one infrastructure type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct InfraCoverage {
    pub infra_type: String,
    pub total: i64,
    pub with_apm: i64,
}

/// Aggregates shown on the dashboard
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DashboardStats {
    pub total_services: i64,
    pub services_with_apm: i64,
    pub customer_facing_without_apm: Vec<String>,
    pub recent_broken_traces: i64,
    pub infra_breakdown: Vec<InfraCoverage>,
}
