//! SQLite repositories
//!
//! Types (ServiceRow, SyncJobRow, etc.) should be imported from `crate::data::types`.

pub mod apm_status;
pub mod broken_trace;
pub mod dashboard;
pub mod service;
pub mod sync_job;

pub use apm_status::{count_with_apm, get_apm_status, upsert_apm_statuses};
pub use broken_trace::{
    count_broken_since, get_broken_trace, list_broken_traces, list_for_service as list_broken_for_service,
    upsert_broken_traces,
};
pub use dashboard::get_dashboard_stats;
pub use service::{
    get_dependency_map, get_filter_options, get_service, get_services_by_name, list_dependents,
    list_services, upsert_services,
};
pub use sync_job::{
    abandon_running_jobs, finish_job, get_job, latest_job, list_jobs, open_job, touch_job,
};

use super::SqliteError;

/// Encode a string list as JSON text for storage
pub(crate) fn encode_list(values: &[String]) -> String {
    serde_json::to_string(values).unwrap_or_else(|_| "[]".to_string())
}

/// Decode a JSON text column into a string list
pub(crate) fn decode_list(
    table: &'static str,
    column: &'static str,
    raw: &str,
) -> Result<Vec<String>, SqliteError> {
    serde_json::from_str(raw).map_err(|e| SqliteError::corrupt(table, column, e))
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_encoding() {
        let values = vec!["team:payments".to_string(), "env:prod".to_string()];
        let encoded = encode_list(&values);
        assert_eq!(encoded, r#"["team:payments","env:prod"]"#);
        assert_eq!(decode_list("services", "tags", &encoded).unwrap(), values);
    }

    #[test]
    fn test_decode_corrupt_list() {
        let err = decode_list("services", "tags", "not json").unwrap_err();
        assert!(matches!(
            err,
            SqliteError::CorruptValue {
                table: "services",
                column: "tags",
                ..
            }
        ));
    }
}
