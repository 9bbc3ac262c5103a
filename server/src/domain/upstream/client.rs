//! Retrying upstream client

use std::sync::Arc;

use super::types::group_spans;
use super::{ApmService, CatalogService, Page, TimeWindow, Trace, UpstreamApi, UpstreamError};
use crate::utils::retry::{RetryFailure, RetryPolicy, retry_with_backoff};

/// Upstream calls with bounded retry
///
/// Rate-limit and transient failures are absorbed until the attempt ceiling;
/// callers only see the final outcome.
#[derive(Clone)]
pub struct UpstreamClient {
    api: Arc<dyn UpstreamApi>,
    policy: RetryPolicy,
}

impl UpstreamClient {
    pub fn new(api: Arc<dyn UpstreamApi>, policy: RetryPolicy) -> Self {
        Self { api, policy }
    }

    pub async fn list_catalog(
        &self,
        cursor: Option<&str>,
    ) -> Result<Page<CatalogService>, UpstreamError> {
        retry_with_backoff(&self.policy, "list_catalog", || self.api.list_catalog(cursor))
            .await
            .map_err(into_upstream_error)
    }

    pub async fn list_apm_status(
        &self,
        cursor: Option<&str>,
    ) -> Result<Page<ApmService>, UpstreamError> {
        retry_with_backoff(&self.policy, "list_apm_status", || {
            self.api.list_apm_status(cursor)
        })
        .await
        .map_err(into_upstream_error)
    }

    /// Fetch spans in `window` page by page and group them into traces
    ///
    /// Stops once `max_spans` spans are collected. A page that still fails
    /// after retries fails the whole search, since partial traces would be
    /// misreported as broken.
    pub async fn search_traces(
        &self,
        window: &TimeWindow,
        max_spans: usize,
    ) -> Result<Vec<Trace>, UpstreamError> {
        let mut spans = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let page = retry_with_backoff(&self.policy, "search_spans", || {
                self.api.search_spans(window, cursor.as_deref())
            })
            .await
            .map_err(into_upstream_error)?;

            tracing::debug!(
                spans = page.items.len(),
                cursor = cursor.as_deref().unwrap_or(""),
                "Fetched span page"
            );
            spans.extend(page.items);

            if spans.len() >= max_spans {
                spans.truncate(max_spans);
                break;
            }
            match page.next_cursor {
                Some(next) if Some(&next) != cursor.as_ref() => cursor = Some(next),
                _ => break,
            }
        }

        Ok(group_spans(spans))
    }
}

fn into_upstream_error(failure: RetryFailure<UpstreamError>) -> UpstreamError {
    if failure.exhausted {
        UpstreamError::RetriesExhausted {
            attempts: failure.attempts,
            last: Box::new(failure.error),
        }
    } else {
        failure.error
    }
}
