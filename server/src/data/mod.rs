//! Data storage layer
//!
//! - `sqlite` - Durable store for services, APM status, broken traces and sync jobs
//! - `types` - Row and record types shared by repositories and the sync engine

pub mod sqlite;
pub mod types;

pub use sqlite::{SqliteError, SqliteService};
