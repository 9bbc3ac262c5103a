//! Sync cycle orchestration
//!
//! - `engine` - three-phase reconciliation against the store
//! - `job` - phase outcomes and job status resolution
//! - `trigger` - single-in-flight gate and interval scheduler

pub mod engine;
pub mod job;
pub mod trigger;

pub use engine::{EngineSettings, SyncEngine, SyncError};
pub use job::{PhaseOutcome, PhaseReport, SyncJobSummary, SyncPhase};
pub use trigger::{SyncTrigger, TriggerError};
