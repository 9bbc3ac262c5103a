use clap::{Parser, Subcommand};

use std::path::PathBuf;

use super::constants::{
    ENV_CONFIG, ENV_DATA_DIR, ENV_DD_API_KEY, ENV_DD_APP_KEY, ENV_DD_BASE_URL, ENV_DD_SITE,
    ENV_HOST, ENV_PORT, ENV_SYNC_INTERVAL_MINUTES, ENV_TRACE_LOOKBACK_MINUTES,
};

#[derive(Parser)]
#[command(name = "apmtrack")]
#[command(version, about = "APM coverage tracker for Datadog", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Server host address
    #[arg(long, short = 'H', global = true, env = ENV_HOST)]
    pub host: Option<String>,

    /// Server port
    #[arg(long, short = 'p', global = true, env = ENV_PORT)]
    pub port: Option<u16>,

    /// Path to config file
    #[arg(long, short = 'c', global = true, env = ENV_CONFIG)]
    pub config: Option<PathBuf>,

    /// Data directory (SQLite database lives under it)
    #[arg(long, global = true, env = ENV_DATA_DIR)]
    pub data_dir: Option<PathBuf>,

    /// Datadog API key
    #[arg(long, global = true, env = ENV_DD_API_KEY, hide_env_values = true)]
    pub dd_api_key: Option<String>,

    /// Datadog application key
    #[arg(long, global = true, env = ENV_DD_APP_KEY, hide_env_values = true)]
    pub dd_app_key: Option<String>,

    /// Datadog site (datadoghq.com, datadoghq.eu, us3.datadoghq.com, ...)
    #[arg(long, global = true, env = ENV_DD_SITE)]
    pub dd_site: Option<String>,

    /// Override the Datadog API base URL
    #[arg(long, global = true, env = ENV_DD_BASE_URL)]
    pub dd_base_url: Option<String>,

    /// Minutes between scheduled sync cycles (0 = disabled)
    #[arg(long, global = true, env = ENV_SYNC_INTERVAL_MINUTES)]
    pub sync_interval_minutes: Option<u64>,

    /// Lookback window in minutes for trace analysis
    #[arg(long, global = true, env = ENV_TRACE_LOOKBACK_MINUTES)]
    pub trace_lookback_minutes: Option<u64>,

    /// Do not start the periodic sync timer
    #[arg(long, global = true)]
    pub no_scheduler: bool,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Start the server and the periodic sync (default command)
    Start,
    /// Run a single sync cycle, print the job summary and exit
    Sync,
}

/// Configuration derived from CLI arguments
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub config: Option<PathBuf>,
    pub data_dir: Option<PathBuf>,
    pub dd_api_key: Option<String>,
    pub dd_app_key: Option<String>,
    pub dd_site: Option<String>,
    pub dd_base_url: Option<String>,
    pub sync_interval_minutes: Option<u64>,
    pub trace_lookback_minutes: Option<u64>,
    pub no_scheduler: bool,
}

/// Parse CLI arguments and return config with command
pub fn parse() -> (CliConfig, Option<Commands>) {
    let cli = Cli::parse();
    let config = CliConfig {
        host: cli.host,
        port: cli.port,
        config: cli.config,
        data_dir: cli.data_dir,
        dd_api_key: cli.dd_api_key,
        dd_app_key: cli.dd_app_key,
        dd_site: cli.dd_site,
        dd_base_url: cli.dd_base_url,
        sync_interval_minutes: cli.sync_interval_minutes,
        trace_lookback_minutes: cli.trace_lookback_minutes,
        no_scheduler: cli.no_scheduler,
    };
    (config, cli.command)
}
