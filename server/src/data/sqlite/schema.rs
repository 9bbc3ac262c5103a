//! SQLite schema definitions

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// Complete schema SQL
pub const SCHEMA: &str = r#"
-- =============================================================================
-- Infrastructure: Schema version tracking
-- =============================================================================
CREATE TABLE IF NOT EXISTS schema_version (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    version INTEGER NOT NULL,
    applied_at INTEGER NOT NULL,
    description TEXT
);

CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at INTEGER NOT NULL,
    checksum TEXT NOT NULL,
    execution_time_ms INTEGER,
    success INTEGER NOT NULL DEFAULT 1
);

-- =============================================================================
-- 1. Services (catalog, keyed by name)
-- =============================================================================
CREATE TABLE IF NOT EXISTS services (
    name TEXT PRIMARY KEY CHECK(length(name) >= 1),
    team TEXT,
    environment TEXT,
    infra_type TEXT,
    customer_facing INTEGER NOT NULL DEFAULT 0,
    tags TEXT NOT NULL DEFAULT '[]',
    dependencies TEXT NOT NULL DEFAULT '[]',
    last_synced_at INTEGER NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_services_team ON services(team);
CREATE INDEX IF NOT EXISTS idx_services_environment ON services(environment);
CREATE INDEX IF NOT EXISTS idx_services_infra_type ON services(infra_type);

-- =============================================================================
-- 2. APM status (one row per instrumented service; no FK, the catalog and
--    APM phases are written independently)
-- =============================================================================
CREATE TABLE IF NOT EXISTS apm_status (
    service_name TEXT PRIMARY KEY CHECK(length(service_name) >= 1),
    language TEXT,
    span_count INTEGER NOT NULL DEFAULT 0 CHECK(span_count >= 0),
    last_seen_at INTEGER,
    updated_at INTEGER NOT NULL
);

-- =============================================================================
-- 3. Broken traces (keyed by trace id)
-- =============================================================================
CREATE TABLE IF NOT EXISTS broken_traces (
    trace_id TEXT PRIMARY KEY CHECK(length(trace_id) >= 1),
    root_service TEXT,
    reason TEXT NOT NULL,
    expected TEXT NOT NULL DEFAULT '[]',
    missing TEXT NOT NULL DEFAULT '[]',
    span_count INTEGER NOT NULL DEFAULT 0,
    detected_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_broken_traces_detected ON broken_traces(detected_at DESC);
CREATE INDEX IF NOT EXISTS idx_broken_traces_root ON broken_traces(root_service);

-- =============================================================================
-- 4. Sync jobs (append-only history of cycles)
-- =============================================================================
CREATE TABLE IF NOT EXISTS sync_jobs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    trigger_source TEXT NOT NULL CHECK(trigger_source IN ('scheduled', 'manual', 'startup', 'cli')),
    status TEXT NOT NULL CHECK(status IN ('running', 'success', 'partial_failure', 'failed')),
    started_at INTEGER NOT NULL,
    finished_at INTEGER,
    services_synced INTEGER NOT NULL DEFAULT 0,
    apm_synced INTEGER NOT NULL DEFAULT 0,
    traces_analyzed INTEGER NOT NULL DEFAULT 0,
    broken_traces INTEGER NOT NULL DEFAULT 0,
    error_detail TEXT,
    owner TEXT NOT NULL DEFAULT '',
    heartbeat_at INTEGER NOT NULL DEFAULT 0,
    CHECK((status = 'running') = (finished_at IS NULL))
);

CREATE INDEX IF NOT EXISTS idx_sync_jobs_started ON sync_jobs(started_at DESC);
CREATE INDEX IF NOT EXISTS idx_sync_jobs_status ON sync_jobs(status);
-- At most one cycle in flight across every process sharing the file
CREATE UNIQUE INDEX IF NOT EXISTS idx_sync_jobs_single_running ON sync_jobs(status) WHERE status = 'running';
"#;
