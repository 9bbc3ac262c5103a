//! SQLite error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SqliteError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration {version} ({name}) failed: {error}")]
    MigrationFailed {
        version: i32,
        name: String,
        error: String,
    },

    #[error("Corrupt {column} value in {table}: {error}")]
    CorruptValue {
        table: &'static str,
        column: &'static str,
        error: String,
    },

    #[error("Not found: {0}")]
    NotFound(String),
}

impl SqliteError {
    pub(crate) fn corrupt(table: &'static str, column: &'static str, error: impl ToString) -> Self {
        Self::CorruptValue {
            table,
            column,
            error: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_failed_error_display() {
        let err = SqliteError::MigrationFailed {
            version: 2,
            name: "add_owner_to_services".to_string(),
            error: "syntax error".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Migration 2 (add_owner_to_services) failed: syntax error"
        );
    }

    #[test]
    fn test_corrupt_value_display() {
        let err = SqliteError::corrupt("sync_jobs", "status", "Unknown sync status: done");
        assert_eq!(
            err.to_string(),
            "Corrupt status value in sync_jobs: Unknown sync status: done"
        );
    }
}
