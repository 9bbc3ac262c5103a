//! Reconciliation engine
//!
//! One cycle runs three phases in order: catalog, APM status, traces. Trace
//! analysis reads the dependency metadata the catalog phase just wrote, so the
//! order is fixed. Each page is committed on its own; a failed page stops its
//! phase but keeps what earlier pages wrote and lets later phases run. Only an
//! unauthorized error stops the cycle.
//!
//! The job row is a lease: the engine renews its heartbeat while the cycle
//! runs, and other processes sharing the database only reclaim it once the
//! heartbeat is older than `job_lease`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use sqlx::SqlitePool;
use thiserror::Error;
use tokio::task::JoinHandle;

use super::job::{
    PhaseOutcome, PhaseReport, SyncJobSummary, SyncPhase, error_detail, resolve_status,
};
use crate::core::config::SyncConfig;
use crate::data::sqlite::SqliteError;
use crate::data::sqlite::repositories::{
    abandon_running_jobs, finish_job, get_dependency_map, open_job, touch_job,
    upsert_apm_statuses, upsert_broken_traces, upsert_services,
};
use crate::data::types::{
    ApmStatusRecord, BrokenTraceRecord, ServiceRecord, SyncCounts, TriggerSource,
};
use crate::domain::analyzer::{BrokenTrace, TraceVerdict, analyze_trace};
use crate::domain::upstream::{ApmService, CatalogService, TimeWindow, UpstreamClient, UpstreamError};
use crate::utils::time::now_secs;

/// Error detail written to jobs whose cycle stopped without closing them
pub const ABANDONED_JOB_DETAIL: &str = "abandoned: the cycle stopped renewing its lease before it completed";

static ENGINE_SEQ: AtomicU64 = AtomicU64::new(0);

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Another sync job is still running")]
    AlreadyRunning,

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error(transparent)]
    Store(#[from] SqliteError),
}

impl SyncError {
    fn is_fatal(&self) -> bool {
        matches!(self, SyncError::Upstream(e) if e.is_fatal())
    }
}

/// Bounds for one cycle
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub trace_lookback: Duration,
    pub max_traces: usize,
    pub max_spans: usize,
    pub job_lease: Duration,
}

impl From<&SyncConfig> for EngineSettings {
    fn from(config: &SyncConfig) -> Self {
        Self {
            trace_lookback: config.trace_lookback,
            max_traces: config.max_traces,
            max_spans: config.max_spans,
            job_lease: config.job_lease,
        }
    }
}

/// Outcome of a single phase before it becomes a `PhaseReport`
struct PhaseRun {
    records: i64,
    error: Option<SyncError>,
}

impl PhaseRun {
    fn ok(records: i64) -> Self {
        Self {
            records,
            error: None,
        }
    }

    fn failed(records: i64, error: impl Into<SyncError>) -> Self {
        Self {
            records,
            error: Some(error.into()),
        }
    }
}

/// Aborts the heartbeat task when the cycle ends, however it ends
struct Heartbeat(JoinHandle<()>);

impl Drop for Heartbeat {
    fn drop(&mut self) {
        self.0.abort();
    }
}

pub struct SyncEngine {
    pool: SqlitePool,
    client: UpstreamClient,
    settings: EngineSettings,
    /// Owner written on the jobs this engine opens
    instance_id: String,
}

impl SyncEngine {
    pub fn new(pool: SqlitePool, client: UpstreamClient, settings: EngineSettings) -> Self {
        let instance_id = format!(
            "{}-{}-{}",
            std::process::id(),
            now_secs(),
            ENGINE_SEQ.fetch_add(1, Ordering::Relaxed)
        );
        Self {
            pool,
            client,
            settings,
            instance_id,
        }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Close running jobs that can no longer finish
    ///
    /// These are jobs opened by this engine (callers serialize cycles, so none
    /// of them is in flight) and jobs of any process whose lease expired.
    pub async fn recover_abandoned_jobs(&self) -> Result<u64, SqliteError> {
        let stale_before = now_secs() - self.settings.job_lease.as_secs() as i64;
        let closed = abandon_running_jobs(
            &self.pool,
            &self.instance_id,
            stale_before,
            ABANDONED_JOB_DETAIL,
        )
        .await?;
        if closed > 0 {
            tracing::warn!(jobs = closed, "Closed abandoned sync jobs");
        }
        Ok(closed)
    }

    /// Renew the job's heartbeat four times per lease until dropped
    fn start_heartbeat(&self, job_id: i64) -> Heartbeat {
        let pool = self.pool.clone();
        let period = (self.settings.job_lease / 4).max(Duration::from_secs(1));

        Heartbeat(tokio::spawn(async move {
            let mut timer = tokio::time::interval(period);
            timer.tick().await; // Skip immediate first tick

            loop {
                timer.tick().await;
                match touch_job(&pool, job_id).await {
                    Ok(true) => tracing::trace!(job_id, "Sync job heartbeat"),
                    Ok(false) => break,
                    Err(e) => tracing::warn!(job_id, error = %e, "Sync job heartbeat failed"),
                }
            }
        }))
    }

    /// Run one full cycle and record it as a sync job
    ///
    /// Callers must not run cycles concurrently within a process;
    /// `SyncTrigger` enforces this. Across processes the store admits one
    /// running job, and `AlreadyRunning` is returned while another holds it.
    /// Other errors are returned only when the job row cannot be written.
    pub async fn run_cycle(&self, trigger: TriggerSource) -> Result<SyncJobSummary, SyncError> {
        self.recover_abandoned_jobs().await?;
        let job = open_job(&self.pool, trigger, &self.instance_id)
            .await?
            .ok_or(SyncError::AlreadyRunning)?;
        let _heartbeat = self.start_heartbeat(job.id);
        tracing::info!(job_id = job.id, trigger = %trigger, "Sync cycle started");

        let mut phases: Vec<PhaseReport> = Vec::with_capacity(3);
        let mut counts = SyncCounts::default();
        let mut fatal = false;

        for phase in [SyncPhase::Catalog, SyncPhase::Apm, SyncPhase::Traces] {
            if fatal {
                phases.push(PhaseReport {
                    phase,
                    outcome: PhaseOutcome::Skipped,
                    records: 0,
                });
                continue;
            }

            let run = match phase {
                SyncPhase::Catalog => self.catalog_phase().await,
                SyncPhase::Apm => self.apm_phase().await,
                SyncPhase::Traces => self.trace_phase(&mut counts).await,
            };
            match phase {
                SyncPhase::Catalog => counts.services_synced = run.records,
                SyncPhase::Apm => counts.apm_synced = run.records,
                SyncPhase::Traces => counts.broken_traces = run.records,
            }

            let outcome = match run.error {
                None => {
                    tracing::debug!(job_id = job.id, phase = phase.as_str(), records = run.records, "Phase completed");
                    PhaseOutcome::Succeeded
                }
                Some(e) => {
                    if e.is_fatal() {
                        fatal = true;
                        tracing::error!(job_id = job.id, phase = phase.as_str(), error = %e, "Sync cycle aborted");
                    } else {
                        tracing::warn!(job_id = job.id, phase = phase.as_str(), error = %e, "Phase failed");
                    }
                    PhaseOutcome::Failed(e.to_string())
                }
            };
            phases.push(PhaseReport {
                phase,
                outcome,
                records: run.records,
            });
        }

        let status = resolve_status(&phases, fatal);
        let detail = error_detail(&phases);
        let job = finish_job(&self.pool, job.id, status, counts, detail.as_deref()).await?;

        tracing::info!(
            job_id = job.id,
            status = %job.status,
            services = counts.services_synced,
            apm = counts.apm_synced,
            traces = counts.traces_analyzed,
            broken = counts.broken_traces,
            "Sync cycle finished"
        );

        Ok(SyncJobSummary { job, phases })
    }

    async fn catalog_phase(&self) -> PhaseRun {
        let mut written = 0i64;
        let mut cursor: Option<String> = None;

        loop {
            let page = match self.client.list_catalog(cursor.as_deref()).await {
                Ok(page) => page,
                Err(e) => return PhaseRun::failed(written, e),
            };
            let records: Vec<ServiceRecord> = page.items.into_iter().map(Into::into).collect();
            match upsert_services(&self.pool, &records).await {
                Ok(n) => written += n as i64,
                Err(e) => return PhaseRun::failed(written, e),
            }
            tracing::debug!(cursor = cursor.as_deref().unwrap_or(""), records = records.len(), "Catalog page committed");

            match next_cursor(&cursor, page.next_cursor) {
                Some(next) => cursor = Some(next),
                None => return PhaseRun::ok(written),
            }
        }
    }

    async fn apm_phase(&self) -> PhaseRun {
        let mut written = 0i64;
        let mut cursor: Option<String> = None;

        loop {
            let page = match self.client.list_apm_status(cursor.as_deref()).await {
                Ok(page) => page,
                Err(e) => return PhaseRun::failed(written, e),
            };
            let records: Vec<ApmStatusRecord> = page.items.into_iter().map(Into::into).collect();
            match upsert_apm_statuses(&self.pool, &records).await {
                Ok(n) => written += n as i64,
                Err(e) => return PhaseRun::failed(written, e),
            }
            tracing::debug!(cursor = cursor.as_deref().unwrap_or(""), records = records.len(), "APM page committed");

            match next_cursor(&cursor, page.next_cursor) {
                Some(next) => cursor = Some(next),
                None => return PhaseRun::ok(written),
            }
        }
    }

    /// Analyze recent traces; `records` counts broken traces written
    async fn trace_phase(&self, counts: &mut SyncCounts) -> PhaseRun {
        // Last-known-good metadata when the catalog phase failed this cycle
        let dependencies = match get_dependency_map(&self.pool).await {
            Ok(map) => map,
            Err(e) => return PhaseRun::failed(0, e),
        };

        let window = TimeWindow::trailing(self.settings.trace_lookback);
        let mut traces = match self
            .client
            .search_traces(&window, self.settings.max_spans)
            .await
        {
            Ok(traces) => traces,
            Err(e) => return PhaseRun::failed(0, e),
        };
        traces.truncate(self.settings.max_traces);
        counts.traces_analyzed = traces.len() as i64;

        let broken: Vec<BrokenTraceRecord> = traces
            .iter()
            .filter_map(|trace| match analyze_trace(trace, &dependencies) {
                TraceVerdict::Broken(b) => Some(b.into()),
                TraceVerdict::Complete => None,
            })
            .collect();

        match upsert_broken_traces(&self.pool, &broken).await {
            Ok(n) => PhaseRun::ok(n as i64),
            Err(e) => PhaseRun::failed(0, e),
        }
    }
}

/// Advance the cursor, treating a repeated cursor as the end of pagination
fn next_cursor(current: &Option<String>, next: Option<String>) -> Option<String> {
    match next {
        Some(next) if current.as_ref() == Some(&next) => {
            tracing::warn!(cursor = %next, "Upstream returned the same cursor twice; stopping pagination");
            None
        }
        other => other,
    }
}

impl From<CatalogService> for ServiceRecord {
    fn from(s: CatalogService) -> Self {
        Self {
            name: s.name,
            team: s.team,
            environment: s.environment,
            infra_type: s.infra_type,
            customer_facing: s.customer_facing,
            tags: s.tags,
            dependencies: s.dependencies,
        }
    }
}

impl From<ApmService> for ApmStatusRecord {
    fn from(a: ApmService) -> Self {
        Self {
            service_name: a.service,
            language: a.language,
            span_count: a.span_count,
            last_seen_at: a.last_seen,
        }
    }
}

impl From<BrokenTrace> for BrokenTraceRecord {
    fn from(b: BrokenTrace) -> Self {
        Self {
            trace_id: b.trace_id,
            root_service: b.root_service,
            reason: b.reason.as_str().to_string(),
            expected: b.expected,
            missing: b.missing,
            span_count: b.span_count as i64,
        }
    }
}
