//! Upstream API error taxonomy

use std::time::Duration;

use thiserror::Error;

use crate::utils::retry::{RetryDecision, Retryable};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UpstreamError {
    /// Credentials rejected; aborts the whole cycle
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Rate limited by upstream")]
    RateLimited { retry_after: Option<Duration> },

    /// Network failure, timeout or 5xx
    #[error("Transient upstream failure: {0}")]
    Transient(String),

    /// Any other 4xx; re-issuing the same request cannot succeed
    #[error("Request rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("Failed to decode upstream response: {0}")]
    Decode(String),

    #[error("Gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<UpstreamError>,
    },
}

impl UpstreamError {
    /// True when the cycle must stop instead of moving on to the next phase
    pub fn is_fatal(&self) -> bool {
        matches!(self, UpstreamError::Unauthorized(_))
    }

    /// Map a non-success HTTP status to an error
    pub fn from_status(status: u16, retry_after: Option<Duration>, body: &str) -> Self {
        let message = truncate(body.trim(), 200);
        match status {
            401 | 403 => UpstreamError::Unauthorized(format!("status {}: {}", status, message)),
            429 => UpstreamError::RateLimited { retry_after },
            500..=599 => UpstreamError::Transient(format!("status {}: {}", status, message)),
            _ => UpstreamError::Rejected { status, message },
        }
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            UpstreamError::Decode(e.to_string())
        } else {
            UpstreamError::Transient(e.to_string())
        }
    }
}

impl From<serde_json::Error> for UpstreamError {
    fn from(e: serde_json::Error) -> Self {
        UpstreamError::Decode(e.to_string())
    }
}

impl Retryable for UpstreamError {
    fn retry_decision(&self) -> RetryDecision {
        match self {
            UpstreamError::RateLimited { retry_after } => RetryDecision::Retry {
                hint: *retry_after,
            },
            UpstreamError::Transient(_) => RetryDecision::Retry { hint: None },
            _ => RetryDecision::Stop,
        }
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            UpstreamError::from_status(401, None, ""),
            UpstreamError::Unauthorized(_)
        ));
        assert!(matches!(
            UpstreamError::from_status(403, None, "Forbidden"),
            UpstreamError::Unauthorized(_)
        ));
        assert_eq!(
            UpstreamError::from_status(429, Some(Duration::from_secs(3)), ""),
            UpstreamError::RateLimited {
                retry_after: Some(Duration::from_secs(3))
            }
        );
        assert!(matches!(
            UpstreamError::from_status(503, None, "unavailable"),
            UpstreamError::Transient(_)
        ));
        assert_eq!(
            UpstreamError::from_status(400, None, " bad query "),
            UpstreamError::Rejected {
                status: 400,
                message: "bad query".to_string()
            }
        );
    }

    #[test]
    fn test_retry_decisions() {
        assert_eq!(
            UpstreamError::Transient("reset".into()).retry_decision(),
            RetryDecision::Retry { hint: None }
        );
        assert_eq!(
            UpstreamError::RateLimited {
                retry_after: Some(Duration::from_secs(1))
            }
            .retry_decision(),
            RetryDecision::Retry {
                hint: Some(Duration::from_secs(1))
            }
        );
        assert_eq!(
            UpstreamError::Unauthorized("no".into()).retry_decision(),
            RetryDecision::Stop
        );
        assert_eq!(
            UpstreamError::Decode("eof".into()).retry_decision(),
            RetryDecision::Stop
        );
    }

    #[test]
    fn test_only_unauthorized_is_fatal() {
        assert!(UpstreamError::Unauthorized("x".into()).is_fatal());
        assert!(!UpstreamError::Transient("x".into()).is_fatal());
        assert!(
            !UpstreamError::RetriesExhausted {
                attempts: 3,
                last: Box::new(UpstreamError::Transient("x".into())),
            }
            .is_fatal()
        );
    }

    #[test]
    fn test_long_body_is_truncated() {
        let body = "x".repeat(500);
        match UpstreamError::from_status(418, None, &body) {
            UpstreamError::Rejected { message, .. } => {
                assert_eq!(message.len(), 203);
                assert!(message.ends_with("..."));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
