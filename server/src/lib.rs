//! APM coverage tracker
//!
//! Reconciles the Datadog service catalog, per-service APM status and recent
//! traces into a local SQLite store, and serves coverage reports over HTTP.

pub mod api;
mod app;
pub mod core;
pub mod data;
pub mod domain;
pub mod utils;
