//! Core application

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::api::ApiServer;
use crate::core::banner::{self, BannerInfo};
use crate::core::cli::{self, CliConfig, Commands};
use crate::core::config::AppConfig;
use crate::core::constants::{APP_NAME_LOWER, ENV_LOG};
use crate::core::shutdown::ShutdownService;
use crate::core::storage::AppStorage;
use crate::data::SqliteService;
use crate::data::types::{SyncStatus, TriggerSource};
use crate::domain::sync::{EngineSettings, SyncEngine, SyncTrigger};
use crate::domain::upstream::{DatadogApi, UpstreamClient};
use crate::utils::retry::RetryPolicy;

pub struct CoreApp {
    pub shutdown: ShutdownService,
    pub config: AppConfig,
    pub storage: AppStorage,
    pub database: Arc<SqliteService>,
    pub trigger: SyncTrigger,
}

impl CoreApp {
    /// Run the application with CLI argument parsing
    pub async fn run() -> Result<()> {
        dotenvy::dotenv().ok();
        Self::init_logging();

        tracing::debug!("Application starting");

        let (cli_config, command) = cli::parse();
        tracing::trace!(command = ?command, "Parsed command");

        let app = Self::init(&cli_config).await?;
        match command {
            Some(Commands::Sync) => app.sync_once().await,
            Some(Commands::Start) | None => Self::start_server(app).await,
        }
    }

    async fn init(cli: &CliConfig) -> Result<Self> {
        let config = AppConfig::load(cli)?;
        let storage = AppStorage::init(&config).await?;
        let database = Arc::new(
            SqliteService::init(&storage)
                .await
                .context("Failed to initialize SQLite database")?,
        );

        let api = DatadogApi::new(
            &config.datadog,
            config.sync.page_size,
            config.sync.trace_lookback,
        )
        .context("Failed to build Datadog client")?;
        let client = UpstreamClient::new(Arc::new(api), RetryPolicy::from(&config.retry));

        let engine = SyncEngine::new(
            database.pool().clone(),
            client,
            EngineSettings::from(&config.sync),
        );
        engine
            .recover_abandoned_jobs()
            .await
            .context("Failed to recover abandoned sync jobs")?;

        let trigger = SyncTrigger::new(Arc::new(engine));
        let shutdown = ShutdownService::new(database.clone());

        Ok(Self {
            shutdown,
            config,
            storage,
            database,
            trigger,
        })
    }

    /// One-shot cycle for the `sync` command; prints the job summary as JSON
    async fn sync_once(self) -> Result<()> {
        let result = self.trigger.run_now(TriggerSource::Cli).await;
        self.shutdown.shutdown().await;

        let summary = result.context("Sync cycle did not run")?;
        println!("{}", serde_json::to_string_pretty(&summary)?);

        if summary.job.status == SyncStatus::Failed {
            anyhow::bail!(
                "Sync job {} failed: {}",
                summary.job.id,
                summary.job.error_detail.as_deref().unwrap_or("unknown error")
            );
        }
        Ok(())
    }

    fn init_logging() {
        let default_filter = format!("info,{}=info", APP_NAME_LOWER);

        let filter = std::env::var(ENV_LOG)
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or(default_filter);

        tracing_subscriber::fmt()
            .with_target(false)
            .with_thread_ids(false)
            .with_level(true)
            .with_ansi(true)
            .compact()
            .with_env_filter(filter)
            .init();
    }

    async fn start_server(app: Self) -> Result<()> {
        // Install signal handlers FIRST (before any blocking calls)
        app.shutdown.install_signal_handlers();

        app.start_background_tasks().await;

        banner::print_banner(&BannerInfo {
            host: &app.config.server.host,
            port: app.config.server.port,
            dd_site: &app.config.datadog.site,
            has_credentials: app.config.datadog.has_credentials(),
            sync_interval: app.scheduler_interval(),
            data_dir: &app.storage.data_dir().display().to_string(),
        });

        let server = ApiServer::new(app);
        let app = server.start().await?;
        app.shutdown.shutdown().await;

        Ok(())
    }

    fn scheduler_interval(&self) -> Option<std::time::Duration> {
        self.config
            .sync
            .interval
            .filter(|_| self.config.sync.scheduler_enabled)
    }

    pub async fn start_background_tasks(&self) {
        self.shutdown
            .register(
                self.database
                    .start_checkpoint_task(self.shutdown.subscribe()),
            )
            .await;

        match self.scheduler_interval() {
            Some(interval) => {
                self.shutdown
                    .register(
                        self.trigger
                            .start_interval_task(interval, self.shutdown.subscribe()),
                    )
                    .await;
            }
            None => tracing::info!("Sync scheduler disabled; cycles run on demand only"),
        }

        if self.config.sync.run_on_startup {
            match self.trigger.spawn_now(TriggerSource::Startup) {
                Ok(handle) => self.shutdown.register(handle).await,
                Err(e) => tracing::warn!(error = %e, "Startup sync not started"),
            }
        }

        tracing::debug!("Background tasks started");
    }
}
