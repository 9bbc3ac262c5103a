use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::utils::file::expand_path;

use super::cli::CliConfig;
use super::constants::{
    APP_DOT_FOLDER, CONFIG_FILE_NAME, DEFAULT_DD_SITE, DEFAULT_HOST, DEFAULT_JOB_LEASE_SECS,
    DEFAULT_MAX_SPANS, DEFAULT_MAX_TRACES, DEFAULT_PAGE_SIZE, DEFAULT_PORT,
    DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_RETRY_BASE_DELAY_MS, DEFAULT_RETRY_MAX_ATTEMPTS,
    DEFAULT_RETRY_MAX_DELAY_MS, DEFAULT_SYNC_INTERVAL_MINUTES, DEFAULT_TRACE_LOOKBACK_MINUTES,
    MAX_PAGE_SIZE, MIN_JOB_LEASE_SECS,
};
use super::secret::Secret;

// =============================================================================
// File Config (JSON, all fields optional)
// =============================================================================

/// Server configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ServerFileConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// Datadog connection section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct DatadogFileConfig {
    pub site: Option<String>,
    pub api_key: Option<String>,
    pub app_key: Option<String>,
    pub base_url: Option<String>,
    pub request_timeout_secs: Option<u64>,
}

/// Sync cycle section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct SyncFileConfig {
    pub interval_minutes: Option<u64>,
    pub trace_lookback_minutes: Option<u64>,
    pub max_traces: Option<usize>,
    pub max_spans: Option<usize>,
    pub page_size: Option<u32>,
    pub run_on_startup: Option<bool>,
    pub job_lease_secs: Option<u64>,
}

/// Upstream retry section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct RetryFileConfig {
    pub max_attempts: Option<u32>,
    pub base_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
}

/// File-based configuration (JSON)
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub server: Option<ServerFileConfig>,
    pub datadog: Option<DatadogFileConfig>,
    pub sync: Option<SyncFileConfig>,
    pub retry: Option<RetryFileConfig>,
    pub data_dir: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

/// Replace `current` when `other` carries a value
fn overlay<T>(field: &str, current: &mut Option<T>, other: Option<T>) {
    if other.is_some() {
        tracing::trace!(field, "Merging config field");
        *current = other;
    }
}

impl FileConfig {
    /// Load configuration from a JSON file
    fn load_from_file(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "Loading config file");
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Warn about unknown fields in the config
    fn warn_unknown_fields(&self) {
        if let serde_json::Value::Object(map) = &self.extra
            && !map.is_empty()
        {
            let keys_str: String = map
                .keys()
                .map(|k| k.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            tracing::warn!(
                fields = %keys_str,
                "Unknown fields in config file (possible typos)"
            );
        }
    }

    /// Merge another FileConfig into this one (other takes precedence)
    fn merge(&mut self, other: FileConfig) {
        if let Some(server) = other.server {
            let current = self.server.get_or_insert_with(ServerFileConfig::default);
            overlay("server.host", &mut current.host, server.host);
            overlay("server.port", &mut current.port, server.port);
        }

        if let Some(dd) = other.datadog {
            let current = self.datadog.get_or_insert_with(DatadogFileConfig::default);
            overlay("datadog.site", &mut current.site, dd.site);
            overlay("datadog.api_key", &mut current.api_key, dd.api_key);
            overlay("datadog.app_key", &mut current.app_key, dd.app_key);
            overlay("datadog.base_url", &mut current.base_url, dd.base_url);
            overlay(
                "datadog.request_timeout_secs",
                &mut current.request_timeout_secs,
                dd.request_timeout_secs,
            );
        }

        if let Some(sync) = other.sync {
            let current = self.sync.get_or_insert_with(SyncFileConfig::default);
            overlay(
                "sync.interval_minutes",
                &mut current.interval_minutes,
                sync.interval_minutes,
            );
            overlay(
                "sync.trace_lookback_minutes",
                &mut current.trace_lookback_minutes,
                sync.trace_lookback_minutes,
            );
            overlay("sync.max_traces", &mut current.max_traces, sync.max_traces);
            overlay("sync.max_spans", &mut current.max_spans, sync.max_spans);
            overlay("sync.page_size", &mut current.page_size, sync.page_size);
            overlay(
                "sync.run_on_startup",
                &mut current.run_on_startup,
                sync.run_on_startup,
            );
            overlay(
                "sync.job_lease_secs",
                &mut current.job_lease_secs,
                sync.job_lease_secs,
            );
        }

        if let Some(retry) = other.retry {
            let current = self.retry.get_or_insert_with(RetryFileConfig::default);
            overlay(
                "retry.max_attempts",
                &mut current.max_attempts,
                retry.max_attempts,
            );
            overlay(
                "retry.base_delay_ms",
                &mut current.base_delay_ms,
                retry.base_delay_ms,
            );
            overlay(
                "retry.max_delay_ms",
                &mut current.max_delay_ms,
                retry.max_delay_ms,
            );
        }

        overlay("data_dir", &mut self.data_dir, other.data_dir);
    }
}

// =============================================================================
// Runtime Config (final, all values resolved)
// =============================================================================

/// Server configuration (final/runtime)
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Datadog connection (final/runtime)
#[derive(Debug, Clone)]
pub struct DatadogConfig {
    pub site: String,
    pub api_key: Secret,
    pub app_key: Secret,
    /// Explicit base URL; derived from `site` when absent
    pub base_url: Option<String>,
    pub request_timeout: Duration,
}

impl DatadogConfig {
    /// Base URL of the Datadog API for the configured site
    pub fn api_base_url(&self) -> String {
        match &self.base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://api.{}", self.site),
        }
    }

    pub fn has_credentials(&self) -> bool {
        !self.api_key.is_empty() && !self.app_key.is_empty()
    }
}

/// Sync cycle settings (final/runtime)
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Timer interval; `None` disables scheduled cycles
    pub interval: Option<Duration>,
    pub trace_lookback: Duration,
    pub max_traces: usize,
    pub max_spans: usize,
    pub page_size: u32,
    pub run_on_startup: bool,
    pub scheduler_enabled: bool,
    /// How long a running job stays claimed without a heartbeat
    pub job_lease: Duration,
}

/// Upstream retry settings (final/runtime)
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl Default for DatadogConfig {
    fn default() -> Self {
        Self {
            site: DEFAULT_DD_SITE.to_string(),
            api_key: Secret::default(),
            app_key: Secret::default(),
            base_url: None,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval: Some(Duration::from_secs(DEFAULT_SYNC_INTERVAL_MINUTES * 60)),
            trace_lookback: Duration::from_secs(DEFAULT_TRACE_LOOKBACK_MINUTES * 60),
            max_traces: DEFAULT_MAX_TRACES,
            max_spans: DEFAULT_MAX_SPANS,
            page_size: DEFAULT_PAGE_SIZE,
            run_on_startup: true,
            scheduler_enabled: true,
            job_lease: Duration::from_secs(DEFAULT_JOB_LEASE_SECS),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RETRY_MAX_ATTEMPTS,
            base_delay: Duration::from_millis(DEFAULT_RETRY_BASE_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_RETRY_MAX_DELAY_MS),
        }
    }
}

/// Final merged application configuration
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub datadog: DatadogConfig,
    pub sync: SyncConfig,
    pub retry: RetryConfig,
    pub data_dir: Option<PathBuf>,
}

impl AppConfig {
    /// Load configuration from all sources
    ///
    /// Priority (lowest to highest):
    /// 1. Defaults
    /// 2. Profile directory config (~/.apmtrack/apmtrack.json)
    /// 3. Local directory config OR CLI-specified config path
    /// 4. CLI arguments (which include env var fallbacks via clap)
    pub fn load(cli: &CliConfig) -> Result<Self> {
        tracing::debug!("Loading application configuration");

        let mut file_config = FileConfig::default();
        let mut found_configs: Vec<String> = Vec::new();

        if let Some(profile_path) = get_profile_config_path()
            && profile_path.exists()
        {
            let profile_config = FileConfig::load_from_file(&profile_path)?;
            profile_config.warn_unknown_fields();
            file_config.merge(profile_config);
            found_configs.push(profile_path.display().to_string());
        }

        let overlay_path = if let Some(ref path) = cli.config {
            let expanded = expand_path(&path.to_string_lossy());
            if !expanded.exists() {
                anyhow::bail!("Config file not found: {}", expanded.display());
            }
            Some(expanded)
        } else {
            let local = PathBuf::from(CONFIG_FILE_NAME);
            if local.exists() { Some(local) } else { None }
        };

        if let Some(path) = overlay_path {
            let overlay_config = FileConfig::load_from_file(&path)?;
            overlay_config.warn_unknown_fields();
            file_config.merge(overlay_config);
            found_configs.push(path.display().to_string());
        }

        tracing::debug!(configs = ?found_configs, "Config files loaded");

        let file_server = file_config.server.unwrap_or_default();
        let file_dd = file_config.datadog.unwrap_or_default();
        let file_sync = file_config.sync.unwrap_or_default();
        let file_retry = file_config.retry.unwrap_or_default();

        let server = ServerConfig {
            host: cli
                .host
                .clone()
                .or(file_server.host)
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: cli.port.or(file_server.port).unwrap_or(DEFAULT_PORT),
        };

        let datadog = DatadogConfig {
            site: cli
                .dd_site
                .clone()
                .or(file_dd.site)
                .unwrap_or_else(|| DEFAULT_DD_SITE.to_string()),
            api_key: Secret::new(
                cli.dd_api_key
                    .clone()
                    .or(file_dd.api_key)
                    .unwrap_or_default(),
            ),
            app_key: Secret::new(
                cli.dd_app_key
                    .clone()
                    .or(file_dd.app_key)
                    .unwrap_or_default(),
            ),
            base_url: cli.dd_base_url.clone().or(file_dd.base_url),
            request_timeout: Duration::from_secs(
                file_dd
                    .request_timeout_secs
                    .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
            ),
        };

        let interval_minutes = cli
            .sync_interval_minutes
            .or(file_sync.interval_minutes)
            .unwrap_or(DEFAULT_SYNC_INTERVAL_MINUTES);
        let lookback_minutes = cli
            .trace_lookback_minutes
            .or(file_sync.trace_lookback_minutes)
            .unwrap_or(DEFAULT_TRACE_LOOKBACK_MINUTES);

        let sync = SyncConfig {
            interval: (interval_minutes > 0)
                .then(|| Duration::from_secs(interval_minutes.saturating_mul(60))),
            trace_lookback: Duration::from_secs(lookback_minutes.saturating_mul(60)),
            max_traces: file_sync.max_traces.unwrap_or(DEFAULT_MAX_TRACES),
            max_spans: file_sync.max_spans.unwrap_or(DEFAULT_MAX_SPANS),
            page_size: file_sync.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
            run_on_startup: file_sync.run_on_startup.unwrap_or(true),
            scheduler_enabled: !cli.no_scheduler,
            job_lease: Duration::from_secs(
                file_sync.job_lease_secs.unwrap_or(DEFAULT_JOB_LEASE_SECS),
            ),
        };

        let retry = RetryConfig {
            max_attempts: file_retry
                .max_attempts
                .unwrap_or(DEFAULT_RETRY_MAX_ATTEMPTS),
            base_delay: Duration::from_millis(
                file_retry
                    .base_delay_ms
                    .unwrap_or(DEFAULT_RETRY_BASE_DELAY_MS),
            ),
            max_delay: Duration::from_millis(
                file_retry
                    .max_delay_ms
                    .unwrap_or(DEFAULT_RETRY_MAX_DELAY_MS),
            ),
        };

        let data_dir = cli
            .data_dir
            .clone()
            .or_else(|| file_config.data_dir.as_deref().map(expand_path));

        let config = Self {
            server,
            datadog,
            sync,
            retry,
            data_dir,
        };
        config.validate()?;

        if !config.datadog.has_credentials() {
            tracing::warn!(
                "Datadog API/application keys are not configured; sync cycles will fail as unauthorized"
            );
        }

        tracing::trace!(config = ?config, "Final config");
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.server.host.is_empty() {
            anyhow::bail!("Configuration error: server.host must not be empty");
        }
        if self.server.port == 0 {
            anyhow::bail!("Configuration error: server.port must be greater than 0");
        }
        if self.datadog.site.trim().is_empty() {
            anyhow::bail!("Configuration error: datadog.site must not be empty");
        }
        if self.datadog.request_timeout.is_zero() {
            anyhow::bail!("Configuration error: datadog.request_timeout_secs must be greater than 0");
        }
        if self.retry.max_attempts == 0 {
            anyhow::bail!("Configuration error: retry.max_attempts must be at least 1");
        }
        if self.retry.base_delay > self.retry.max_delay {
            anyhow::bail!(
                "Configuration error: retry.base_delay_ms ({}) exceeds retry.max_delay_ms ({})",
                self.retry.base_delay.as_millis(),
                self.retry.max_delay.as_millis()
            );
        }
        if self.sync.page_size == 0 || self.sync.page_size > MAX_PAGE_SIZE {
            anyhow::bail!(
                "Configuration error: sync.page_size must be between 1 and {}",
                MAX_PAGE_SIZE
            );
        }
        if self.sync.job_lease < Duration::from_secs(MIN_JOB_LEASE_SECS) {
            anyhow::bail!(
                "Configuration error: sync.job_lease_secs must be at least {}",
                MIN_JOB_LEASE_SECS
            );
        }
        if self.sync.trace_lookback < Duration::from_secs(60) {
            anyhow::bail!("Configuration error: sync.trace_lookback_minutes must be at least 1");
        }
        Ok(())
    }
}

/// Get the profile config path (~/.apmtrack/apmtrack.json)
fn get_profile_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(APP_DOT_FOLDER).join(CONFIG_FILE_NAME))
}

/// Check if host binds to all network interfaces
pub fn is_all_interfaces(host: &str) -> bool {
    matches!(host, "0.0.0.0" | "::" | "[::]")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn load_json(json: &str) -> Result<AppConfig> {
        let mut temp_file = tempfile::NamedTempFile::new().unwrap();
        temp_file.write_all(json.as_bytes()).unwrap();
        let cli = CliConfig {
            config: Some(temp_file.path().to_path_buf()),
            ..Default::default()
        };
        AppConfig::load(&cli)
    }

    #[test]
    fn test_file_config_parse_full() {
        let json = r#"{
            "server": { "host": "0.0.0.0", "port": 8080 },
            "datadog": { "site": "datadoghq.eu", "api_key": "a", "app_key": "b" },
            "sync": { "interval_minutes": 5, "max_traces": 10 },
            "retry": { "max_attempts": 2 }
        }"#;
        let config: FileConfig = serde_json::from_str(json).unwrap();

        let server = config.server.unwrap();
        assert_eq!(server.host, Some("0.0.0.0".to_string()));
        assert_eq!(server.port, Some(8080));
        assert_eq!(
            config.datadog.unwrap().site,
            Some("datadoghq.eu".to_string())
        );
        assert_eq!(config.sync.unwrap().max_traces, Some(10));
        assert_eq!(config.retry.unwrap().max_attempts, Some(2));
    }

    #[test]
    fn test_file_config_parse_empty() {
        let config: FileConfig = serde_json::from_str("{}").unwrap();
        assert!(config.server.is_none());
        assert!(config.datadog.is_none());
    }

    #[test]
    fn test_file_config_extra_fields_collected() {
        let config: FileConfig = serde_json::from_str(r#"{ "sycn": {} }"#).unwrap();
        let serde_json::Value::Object(map) = &config.extra else {
            panic!("extra should be an object");
        };
        assert!(map.contains_key("sycn"));
    }

    #[test]
    fn test_file_config_merge() {
        let mut base = FileConfig {
            server: Some(ServerFileConfig {
                host: Some("localhost".to_string()),
                port: Some(5000),
            }),
            sync: Some(SyncFileConfig {
                interval_minutes: Some(15),
                max_traces: Some(100),
                ..Default::default()
            }),
            ..Default::default()
        };
        let overlay = FileConfig {
            server: Some(ServerFileConfig {
                host: None,
                port: Some(9000),
            }),
            sync: Some(SyncFileConfig {
                interval_minutes: Some(30),
                ..Default::default()
            }),
            ..Default::default()
        };
        base.merge(overlay);

        let server = base.server.unwrap();
        assert_eq!(server.host, Some("localhost".to_string()));
        assert_eq!(server.port, Some(9000));
        let sync = base.sync.unwrap();
        assert_eq!(sync.interval_minutes, Some(30));
        assert_eq!(sync.max_traces, Some(100));
    }

    #[test]
    fn test_app_config_from_file() {
        let config = load_json(
            r#"{
                "datadog": { "site": "us3.datadoghq.com", "api_key": "k", "app_key": "a" },
                "sync": { "interval_minutes": 0, "trace_lookback_minutes": 30 }
            }"#,
        )
        .unwrap();

        assert_eq!(config.datadog.api_base_url(), "https://api.us3.datadoghq.com");
        assert!(config.datadog.has_credentials());
        assert!(config.sync.interval.is_none());
        assert_eq!(config.sync.trace_lookback, Duration::from_secs(30 * 60));
    }

    #[test]
    fn test_app_config_cli_override() {
        let mut temp_file = tempfile::NamedTempFile::new().unwrap();
        temp_file
            .write_all(br#"{ "server": { "port": 7000 }, "datadog": { "site": "datadoghq.eu" } }"#)
            .unwrap();
        let cli = CliConfig {
            config: Some(temp_file.path().to_path_buf()),
            port: Some(3000),
            dd_site: Some("ddog-gov.com".to_string()),
            sync_interval_minutes: Some(1),
            no_scheduler: true,
            ..Default::default()
        };

        let config = AppConfig::load(&cli).unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.datadog.site, "ddog-gov.com");
        assert_eq!(config.sync.interval, Some(Duration::from_secs(60)));
        assert!(!config.sync.scheduler_enabled);
    }

    #[test]
    fn test_app_config_base_url_override() {
        let config = load_json(r#"{ "datadog": { "base_url": "http://127.0.0.1:9999/" } }"#).unwrap();
        assert_eq!(config.datadog.api_base_url(), "http://127.0.0.1:9999");
    }

    #[test]
    fn test_app_config_missing_credentials_is_not_an_error() {
        let config = load_json(r#"{ "datadog": { "site": "datadoghq.com" } }"#).unwrap();
        assert!(!config.datadog.has_credentials());
    }

    #[test]
    fn test_app_config_validation_retry_delays() {
        let err = load_json(r#"{ "retry": { "base_delay_ms": 5000, "max_delay_ms": 100 } }"#)
            .unwrap_err();
        assert!(err.to_string().contains("retry.base_delay_ms"));
    }

    #[test]
    fn test_app_config_validation_zero_attempts() {
        let err = load_json(r#"{ "retry": { "max_attempts": 0 } }"#).unwrap_err();
        assert!(err.to_string().contains("retry.max_attempts"));
    }

    #[test]
    fn test_app_config_validation_page_size() {
        let err = load_json(r#"{ "sync": { "page_size": 0 } }"#).unwrap_err();
        assert!(err.to_string().contains("sync.page_size"));
    }

    #[test]
    fn test_app_config_job_lease() {
        let config = load_json(r#"{ "sync": { "job_lease_secs": 45 } }"#).unwrap();
        assert_eq!(config.sync.job_lease, Duration::from_secs(45));

        let err = load_json(r#"{ "sync": { "job_lease_secs": 2 } }"#).unwrap_err();
        assert!(err.to_string().contains("sync.job_lease_secs"));
    }

    #[test]
    fn test_app_config_validation_port_zero() {
        let err = load_json(r#"{ "server": { "port": 0 } }"#).unwrap_err();
        assert!(err.to_string().contains("server.port"));
    }

    #[test]
    fn test_app_config_missing_file() {
        let cli = CliConfig {
            config: Some(PathBuf::from("/definitely/not/here/apmtrack.json")),
            ..Default::default()
        };
        let err = AppConfig::load(&cli).unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }

    #[test]
    fn test_is_all_interfaces() {
        assert!(is_all_interfaces("0.0.0.0"));
        assert!(is_all_interfaces("::"));
        assert!(!is_all_interfaces("127.0.0.1"));
    }
}
