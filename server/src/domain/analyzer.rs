//! Trace completeness analysis
//!
//! A trace is expected to contain its root service plus every declared
//! runtime dependency of each service it actually touched. Anything expected
//! but not observed is missing, and a trace with missing services is broken.
//! Analysis is pure: dependency metadata is injected through `DependencyLookup`.

use std::collections::{BTreeSet, HashMap};

use super::upstream::Trace;

/// Stand-in for the root service of a trace whose root span was not sampled
pub const UNSAMPLED_ROOT: &str = "(unsampled-root)";

/// Source of declared runtime dependencies per service
pub trait DependencyLookup {
    fn dependencies_of(&self, service: &str) -> &[String];
}

impl DependencyLookup for HashMap<String, Vec<String>> {
    fn dependencies_of(&self, service: &str) -> &[String] {
        self.get(service).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokenReason {
    /// Declared dependencies never showed up in the trace
    MissingServices,
    /// No span without a parent; the root service is unknown
    RootNotSampled,
}

impl BrokenReason {
    pub const fn as_str(&self) -> &'static str {
        match self {
            BrokenReason::MissingServices => "missing_services",
            BrokenReason::RootNotSampled => "root_not_sampled",
        }
    }
}

/// Details of a trace classified as broken
///
/// `expected` and `missing` are sorted; `missing` is a non-empty subset of `expected`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokenTrace {
    pub trace_id: String,
    pub root_service: Option<String>,
    pub reason: BrokenReason,
    pub expected: Vec<String>,
    pub missing: Vec<String>,
    pub span_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceVerdict {
    Complete,
    Broken(BrokenTrace),
}

/// Classify one trace as complete or broken
pub fn analyze_trace(trace: &Trace, deps: &impl DependencyLookup) -> TraceVerdict {
    if trace.spans.is_empty() {
        return TraceVerdict::Complete;
    }

    let observed: BTreeSet<&str> = trace.spans.iter().map(|s| s.service.as_str()).collect();
    // First root in input order wins when several spans lack a parent
    let root_service = trace
        .spans
        .iter()
        .find(|s| s.is_root())
        .map(|s| s.service.as_str());

    let mut expected: BTreeSet<&str> = observed
        .iter()
        .flat_map(|service| deps.dependencies_of(service))
        .map(String::as_str)
        .collect();
    let reason = match root_service {
        Some(root) => {
            expected.insert(root);
            BrokenReason::MissingServices
        }
        None => {
            expected.insert(UNSAMPLED_ROOT);
            BrokenReason::RootNotSampled
        }
    };

    let missing: Vec<String> = expected
        .difference(&observed)
        .map(|s| s.to_string())
        .collect();
    if missing.is_empty() {
        return TraceVerdict::Complete;
    }

    TraceVerdict::Broken(BrokenTrace {
        trace_id: trace.trace_id.clone(),
        root_service: root_service.map(str::to_string),
        reason,
        expected: expected.into_iter().map(str::to_string).collect(),
        missing,
        span_count: trace.spans.len(),
    })
}
