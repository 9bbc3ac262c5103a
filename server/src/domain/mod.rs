//! Domain logic for APM coverage tracking
//!
//! - `upstream` - observability platform client with retry and pagination
//! - `analyzer` - trace completeness checks against declared dependencies
//! - `sync` - reconciliation engine and its trigger

pub mod analyzer;
pub mod sync;
pub mod upstream;

pub use sync::{SyncEngine, SyncTrigger};
