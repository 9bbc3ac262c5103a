//! Single-in-flight gate in front of the engine
//!
//! Every entry point (timer, HTTP, startup, CLI) goes through `SyncTrigger`, so
//! at most one cycle writes to the store at a time. Cycles always run on their
//! own task holding the gate; dropping a waiter never stops a cycle midway.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{Mutex, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::MissedTickBehavior;

use super::engine::{SyncEngine, SyncError};
use super::job::SyncJobSummary;
use crate::data::types::TriggerSource;

#[derive(Error, Debug)]
pub enum TriggerError {
    #[error("A sync cycle is already running")]
    AlreadyRunning,

    #[error(transparent)]
    Sync(SyncError),

    #[error("Sync cycle task failed: {0}")]
    Task(#[from] JoinError),
}

impl From<SyncError> for TriggerError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::AlreadyRunning => Self::AlreadyRunning,
            other => Self::Sync(other),
        }
    }
}

#[derive(Clone)]
pub struct SyncTrigger {
    engine: Arc<SyncEngine>,
    gate: Arc<Mutex<()>>,
}

impl SyncTrigger {
    pub fn new(engine: Arc<SyncEngine>) -> Self {
        Self {
            engine,
            gate: Arc::new(Mutex::new(())),
        }
    }

    /// Take the gate and run a cycle on its own task
    ///
    /// The gate is taken before spawning, so a busy trigger is reported to the
    /// caller instead of queuing a second cycle.
    fn spawn_cycle(
        &self,
        source: TriggerSource,
    ) -> Result<JoinHandle<Result<SyncJobSummary, SyncError>>, TriggerError> {
        let guard = Arc::clone(&self.gate)
            .try_lock_owned()
            .map_err(|_| TriggerError::AlreadyRunning)?;
        let engine = Arc::clone(&self.engine);

        Ok(tokio::spawn(async move {
            let _guard = guard;
            engine.run_cycle(source).await
        }))
    }

    /// Run a cycle and wait for its summary
    ///
    /// Dropping the returned future stops the wait, not the cycle.
    pub async fn run_now(&self, source: TriggerSource) -> Result<SyncJobSummary, TriggerError> {
        let handle = self.spawn_cycle(source)?;
        Ok(handle.await??)
    }

    /// Start a cycle in the background
    pub fn spawn_now(&self, source: TriggerSource) -> Result<JoinHandle<()>, TriggerError> {
        let handle = self.spawn_cycle(source)?;

        Ok(tokio::spawn(async move {
            match handle.await {
                Ok(Ok(_)) => {}
                Ok(Err(SyncError::AlreadyRunning)) => {
                    tracing::info!(trigger = %source, "Skipped sync, another process is running one");
                }
                Ok(Err(e)) => {
                    tracing::error!(trigger = %source, error = %e, "Background sync cycle failed");
                }
                Err(e) => tracing::error!(trigger = %source, error = %e, "Sync cycle task failed"),
            }
        }))
    }

    pub fn is_running(&self) -> bool {
        self.gate.try_lock().is_err()
    }

    /// Run a cycle every `interval` until shutdown
    ///
    /// Ticks that land while another cycle is in flight are dropped.
    pub fn start_interval_task(
        &self,
        interval: Duration,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let trigger = self.clone();

        tokio::spawn(async move {
            let mut timer = tokio::time::interval(interval);
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
            timer.tick().await; // Skip immediate first tick

            tracing::debug!(interval_secs = interval.as_secs(), "Sync scheduler started");
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            tracing::debug!("Sync scheduler shutting down");
                            break;
                        }
                    }
                    _ = timer.tick() => {
                        match trigger.run_now(TriggerSource::Scheduled).await {
                            Ok(_) => {}
                            Err(TriggerError::AlreadyRunning) => {
                                tracing::debug!("Skipping scheduled sync, a cycle is already running");
                            }
                            Err(e) => tracing::error!(error = %e, "Scheduled sync failed"),
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sqlite::repositories::{finish_job, get_job, list_jobs, open_job};
    use crate::data::sqlite::repositories::test_support::setup_test_pool;
    use crate::data::types::{SyncCounts, SyncStatus};
    use crate::domain::sync::engine::EngineSettings;
    use crate::domain::upstream::{
        ApmService, CatalogService, Page, RawSpan, TimeWindow, UpstreamApi, UpstreamClient,
        UpstreamError,
    };
    use crate::utils::retry::RetryPolicy;
    use async_trait::async_trait;
    use sqlx::SqlitePool;
    use tokio::sync::Notify;

    /// Upstream whose catalog call parks until released when gated
    struct GatedUpstream {
        release: Option<Arc<Notify>>,
    }

    #[async_trait]
    impl UpstreamApi for GatedUpstream {
        async fn list_catalog(
            &self,
            _cursor: Option<&str>,
        ) -> Result<Page<CatalogService>, UpstreamError> {
            if let Some(release) = &self.release {
                release.notified().await;
            }
            Ok(Page::last(Vec::new()))
        }

        async fn list_apm_status(
            &self,
            _cursor: Option<&str>,
        ) -> Result<Page<ApmService>, UpstreamError> {
            Ok(Page::last(Vec::new()))
        }

        async fn search_spans(
            &self,
            _window: &TimeWindow,
            _cursor: Option<&str>,
        ) -> Result<Page<RawSpan>, UpstreamError> {
            Ok(Page::last(Vec::new()))
        }
    }

    fn trigger(pool: &SqlitePool, release: Option<Arc<Notify>>) -> SyncTrigger {
        let client = UpstreamClient::new(
            Arc::new(GatedUpstream { release }),
            RetryPolicy::new(1, Duration::from_millis(1), Duration::from_millis(1)),
        );
        let engine = SyncEngine::new(
            pool.clone(),
            client,
            EngineSettings {
                trace_lookback: Duration::from_secs(60),
                max_traces: 10,
                max_spans: 100,
                job_lease: Duration::from_secs(60),
            },
        );
        SyncTrigger::new(Arc::new(engine))
    }

    async fn wait_until_running(trigger: &SyncTrigger) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !trigger.is_running() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_run_now_returns_summary() {
        let pool = setup_test_pool().await;
        let trigger = trigger(&pool, None);

        let summary = trigger.run_now(TriggerSource::Manual).await.unwrap();
        assert_eq!(summary.job.status, SyncStatus::Success);
        assert_eq!(summary.job.trigger, TriggerSource::Manual);
        assert!(!trigger.is_running());
    }

    #[tokio::test]
    async fn test_second_trigger_is_rejected_while_busy() {
        let pool = setup_test_pool().await;
        let release = Arc::new(Notify::new());
        let trigger = trigger(&pool, Some(release.clone()));

        let handle = trigger.spawn_now(TriggerSource::Manual).unwrap();
        wait_until_running(&trigger).await;

        assert!(matches!(
            trigger.run_now(TriggerSource::Manual).await,
            Err(TriggerError::AlreadyRunning)
        ));
        assert!(matches!(
            trigger.spawn_now(TriggerSource::Scheduled),
            Err(TriggerError::AlreadyRunning)
        ));

        release.notify_one();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(!trigger.is_running());

        let (jobs, total) = list_jobs(&pool, 1, 10).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(jobs[0].status, SyncStatus::Success);
    }

    #[tokio::test]
    async fn test_dropped_waiter_does_not_stop_cycle() {
        let pool = setup_test_pool().await;
        let release = Arc::new(Notify::new());
        let trigger = trigger(&pool, Some(release.clone()));

        let waited =
            tokio::time::timeout(Duration::from_millis(50), trigger.run_now(TriggerSource::Manual))
                .await;
        assert!(waited.is_err());
        assert!(trigger.is_running());

        release.notify_one();
        tokio::time::timeout(Duration::from_secs(5), async {
            while trigger.is_running() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        let (jobs, total) = list_jobs(&pool, 1, 10).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(jobs[0].status, SyncStatus::Success);
        assert!(jobs[0].finished_at.is_some());
    }

    #[tokio::test]
    async fn test_job_of_another_process_blocks_run() {
        let pool = setup_test_pool().await;
        let trigger = trigger(&pool, None);
        let live = open_job(&pool, TriggerSource::Scheduled, "server-instance")
            .await
            .unwrap()
            .unwrap();

        assert!(matches!(
            trigger.run_now(TriggerSource::Cli).await,
            Err(TriggerError::AlreadyRunning)
        ));
        assert!(!trigger.is_running());
        assert_eq!(
            get_job(&pool, live.id).await.unwrap().unwrap().status,
            SyncStatus::Running
        );

        let closed = finish_job(&pool, live.id, SyncStatus::Success, SyncCounts::default(), None)
            .await
            .unwrap();
        assert_eq!(closed.status, SyncStatus::Success);
    }

    #[tokio::test]
    async fn test_interval_task_stops_on_shutdown() {
        let pool = setup_test_pool().await;
        let trigger = trigger(&pool, None);
        let (tx, rx) = watch::channel(false);

        let handle = trigger.start_interval_task(Duration::from_secs(3600), rx);
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();

        let (_, total) = list_jobs(&pool, 1, 10).await.unwrap();
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn test_interval_task_runs_scheduled_cycles() {
        let pool = setup_test_pool().await;
        let trigger = trigger(&pool, None);
        let (tx, rx) = watch::channel(false);

        let handle = trigger.start_interval_task(Duration::from_millis(20), rx);
        let jobs = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let (jobs, _) = list_jobs(&pool, 1, 10).await.unwrap();
                if let Some(job) = jobs.first()
                    && job.status.is_terminal()
                {
                    break jobs;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(jobs[0].trigger, TriggerSource::Scheduled);

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
