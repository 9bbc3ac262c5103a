// =============================================================================
// Application Identity
// =============================================================================

/// Application name in title case (for display and platform directories)
pub const APP_NAME: &str = "ApmTrack";

/// Application name in lowercase (for paths and identifiers)
pub const APP_NAME_LOWER: &str = "apmtrack";

/// Unix-style dotfile folder name
pub const APP_DOT_FOLDER: &str = ".apmtrack";

// =============================================================================
// Configuration Files
// =============================================================================

/// Config file name
pub const CONFIG_FILE_NAME: &str = "apmtrack.json";

/// Environment variable for config file path
pub const ENV_CONFIG: &str = "APMTRACK_CONFIG";

// =============================================================================
// Environment Variables - Server
// =============================================================================

/// Environment variable for server host
pub const ENV_HOST: &str = "APMTRACK_HOST";

/// Environment variable for server port
pub const ENV_PORT: &str = "APMTRACK_PORT";

/// Environment variable for log level/filter
pub const ENV_LOG: &str = "APMTRACK_LOG";

/// Environment variable to override data directory
pub const ENV_DATA_DIR: &str = "APMTRACK_DATA_DIR";

// =============================================================================
// Environment Variables - Datadog
// =============================================================================

pub const ENV_DD_API_KEY: &str = "DD_API_KEY";
pub const ENV_DD_APP_KEY: &str = "DD_APP_KEY";
pub const ENV_DD_SITE: &str = "DD_SITE";

/// Override for the upstream base URL (proxies, test doubles)
pub const ENV_DD_BASE_URL: &str = "APMTRACK_DD_BASE_URL";

// =============================================================================
// Environment Variables - Sync
// =============================================================================

pub const ENV_SYNC_INTERVAL_MINUTES: &str = "SYNC_INTERVAL_MINUTES";
pub const ENV_TRACE_LOOKBACK_MINUTES: &str = "APMTRACK_TRACE_LOOKBACK_MINUTES";

// =============================================================================
// Server Defaults
// =============================================================================

/// Default server host
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default server port
pub const DEFAULT_PORT: u16 = 5000;

/// Request body limit for the reporting API (1 MB)
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

// =============================================================================
// Datadog Defaults
// =============================================================================

/// Default Datadog site
pub const DEFAULT_DD_SITE: &str = "datadoghq.com";

/// Per-call upstream timeout
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// Sync Defaults
// =============================================================================

/// Minutes between scheduled cycles (0 disables the timer)
pub const DEFAULT_SYNC_INTERVAL_MINUTES: u64 = 15;

/// Window of recent spans searched by the trace phase
pub const DEFAULT_TRACE_LOOKBACK_MINUTES: u64 = 60;

/// Maximum traces analyzed per cycle
pub const DEFAULT_MAX_TRACES: usize = 100;

/// Maximum spans fetched per cycle by the trace phase
pub const DEFAULT_MAX_SPANS: usize = 5_000;

/// Seconds a running job stays claimed without a heartbeat; the owner renews
/// it four times per lease
pub const DEFAULT_JOB_LEASE_SECS: u64 = 120;

/// Shortest accepted job lease
pub const MIN_JOB_LEASE_SECS: u64 = 10;

/// Catalog page size requested from upstream
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Upper bound for the catalog page size
pub const MAX_PAGE_SIZE: u32 = 1_000;

/// Window used by the dashboard's "recent broken traces" count
pub const RECENT_BROKEN_TRACE_HOURS: i64 = 24;

// =============================================================================
// Retry Defaults
// =============================================================================

pub const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 500;
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 30_000;

// =============================================================================
// SQLite
// =============================================================================

/// SQLite database filename
pub const SQLITE_DB_FILENAME: &str = "apmtrack.db";

/// Maximum pooled connections (reporting reads run alongside a cycle)
pub const SQLITE_MAX_CONNECTIONS: u32 = 5;

/// Busy timeout for lock contention
pub const SQLITE_BUSY_TIMEOUT_SECS: u64 = 30;

/// Page cache size (negative = KiB)
pub const SQLITE_CACHE_SIZE: &str = "-16000";

/// WAL auto-checkpoint threshold in pages
pub const SQLITE_WAL_AUTOCHECKPOINT: &str = "1000";

/// Interval of the background WAL checkpoint task
pub const SQLITE_CHECKPOINT_INTERVAL_SECS: u64 = 300;

// =============================================================================
// Shutdown
// =============================================================================

/// Time allowed for background tasks (including an in-flight cycle) to finish
pub const SHUTDOWN_TIMEOUT_SECS: u64 = 120;
