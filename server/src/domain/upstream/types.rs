//! Upstream record types, independent of any vendor wire format

use chrono::{DateTime, Utc};

/// One page of results plus the cursor for the next page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_cursor: None,
        }
    }
}

/// Catalog entry for one service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogService {
    pub name: String,
    pub team: Option<String>,
    pub environment: Option<String>,
    pub infra_type: Option<String>,
    pub customer_facing: bool,
    pub tags: Vec<String>,
    /// Declared runtime dependencies, sorted and deduplicated
    pub dependencies: Vec<String>,
}

/// APM activity for one service over the lookback window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApmService {
    pub service: String,
    pub language: Option<String>,
    pub span_count: i64,
    /// Unix seconds of the most recent non-empty data point
    pub last_seen: Option<i64>,
}

/// A single span as returned by span search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSpan {
    pub trace_id: String,
    pub span_id: String,
    pub service: String,
    /// `None` marks a root span
    pub parent_id: Option<String>,
}

impl RawSpan {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Spans grouped under one trace id, in first-seen order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trace {
    pub trace_id: String,
    pub spans: Vec<RawSpan>,
}

/// Half-open time range used for span search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Window ending now and reaching back `lookback`
    pub fn trailing(lookback: std::time::Duration) -> Self {
        let end = Utc::now();
        let lookback = chrono::Duration::from_std(lookback).unwrap_or(chrono::Duration::hours(1));
        Self {
            start: end - lookback,
            end,
        }
    }
}

/// Group spans by trace id, keeping the order traces were first seen in
pub fn group_spans(spans: Vec<RawSpan>) -> Vec<Trace> {
    let mut index: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
    let mut traces: Vec<Trace> = Vec::new();

    for span in spans {
        match index.get(&span.trace_id) {
            Some(&i) => traces[i].spans.push(span),
            None => {
                index.insert(span.trace_id.clone(), traces.len());
                traces.push(Trace {
                    trace_id: span.trace_id.clone(),
                    spans: vec![span],
                });
            }
        }
    }
    traces
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(trace: &str, id: &str, service: &str, parent: Option<&str>) -> RawSpan {
        RawSpan {
            trace_id: trace.to_string(),
            span_id: id.to_string(),
            service: service.to_string(),
            parent_id: parent.map(str::to_string),
        }
    }

    #[test]
    fn test_group_spans_preserves_first_seen_order() {
        let traces = group_spans(vec![
            span("b", "1", "web", None),
            span("a", "2", "checkout", None),
            span("b", "3", "cart", Some("1")),
        ]);
        assert_eq!(traces.len(), 2);
        assert_eq!(traces[0].trace_id, "b");
        assert_eq!(traces[0].spans.len(), 2);
        assert_eq!(traces[1].trace_id, "a");
    }

    #[test]
    fn test_trailing_window() {
        let window = TimeWindow::trailing(std::time::Duration::from_secs(600));
        assert_eq!((window.end - window.start).num_seconds(), 600);
    }

    #[test]
    fn test_root_detection() {
        assert!(span("t", "1", "web", None).is_root());
        assert!(!span("t", "2", "web", Some("1")).is_root());
    }
}
