//! Time utility functions

use chrono::{DateTime, Utc};

/// Current time as unix seconds (storage format for all timestamps)
pub fn now_secs() -> i64 {
    Utc::now().timestamp()
}

/// Convert stored unix seconds to DateTime<Utc>
pub fn secs_to_datetime(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_else(|| {
        tracing::warn!(secs, "Invalid timestamp, using epoch");
        DateTime::UNIX_EPOCH
    })
}

/// Convert optional stored unix seconds to DateTime<Utc>
pub fn opt_secs_to_datetime(secs: Option<i64>) -> Option<DateTime<Utc>> {
    secs.map(secs_to_datetime)
}
