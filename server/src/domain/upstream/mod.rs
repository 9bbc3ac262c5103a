//! Upstream monitoring API
//!
//! - `UpstreamApi` - one attempt of each upstream call, implemented by `DatadogApi`
//! - `UpstreamClient` - retry/backoff and trace assembly on top of an `UpstreamApi`

mod client;
mod datadog;
mod error;
mod types;

pub use client::UpstreamClient;
pub use datadog::DatadogApi;
pub use error::UpstreamError;
pub use types::{ApmService, CatalogService, Page, RawSpan, TimeWindow, Trace, group_spans};

use async_trait::async_trait;

/// Single-attempt access to the upstream API
///
/// Implementations do not retry; `UpstreamClient` owns backoff.
#[async_trait]
pub trait UpstreamApi: Send + Sync {
    async fn list_catalog(
        &self,
        cursor: Option<&str>,
    ) -> Result<Page<CatalogService>, UpstreamError>;

    async fn list_apm_status(&self, cursor: Option<&str>)
    -> Result<Page<ApmService>, UpstreamError>;

    async fn search_spans(
        &self,
        window: &TimeWindow,
        cursor: Option<&str>,
    ) -> Result<Page<RawSpan>, UpstreamError>;
}
