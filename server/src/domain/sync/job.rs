//! Per-cycle bookkeeping: phase outcomes, final status and error detail

use serde::Serialize;
use utoipa::ToSchema;

use crate::data::types::{SyncJobRow, SyncStatus};

/// The three sequential phases of a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    Catalog,
    Apm,
    Traces,
}

impl SyncPhase {
    pub const fn as_str(&self) -> &'static str {
        match self {
            SyncPhase::Catalog => "catalog",
            SyncPhase::Apm => "apm",
            SyncPhase::Traces => "traces",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "state", content = "error", rename_all = "snake_case")]
pub enum PhaseOutcome {
    Succeeded,
    Failed(String),
    /// Not attempted because an earlier phase hit a fatal error
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PhaseReport {
    pub phase: SyncPhase,
    pub outcome: PhaseOutcome,
    /// Rows written by this phase (committed pages only)
    pub records: i64,
}

impl PhaseReport {
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, PhaseOutcome::Succeeded)
    }
}

/// Result of one cycle: the closed job row plus what each phase did
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SyncJobSummary {
    pub job: SyncJobRow,
    pub phases: Vec<PhaseReport>,
}

/// Final job status from phase outcomes
///
/// A fatal error fails the job outright. Otherwise all phases ok is success,
/// some ok is partial failure, none ok is failure.
pub fn resolve_status(phases: &[PhaseReport], fatal: bool) -> SyncStatus {
    let succeeded = phases.iter().filter(|p| p.succeeded()).count();
    if fatal || succeeded == 0 {
        SyncStatus::Failed
    } else if succeeded == phases.len() {
        SyncStatus::Success
    } else {
        SyncStatus::PartialFailure
    }
}

/// `"; "`-joined `"<phase>: <error>"` entries, `None` when nothing failed
pub fn error_detail(phases: &[PhaseReport]) -> Option<String> {
    let entries: Vec<String> = phases
        .iter()
        .filter_map(|p| match &p.outcome {
            PhaseOutcome::Failed(error) => Some(format!("{}: {}", p.phase.as_str(), error)),
            _ => None,
        })
        .collect();
    (!entries.is_empty()).then(|| entries.join("; "))
}
