//! Path and validation extractors for API routes

use std::ops::Deref;

use axum::Json;
use axum::extract::rejection::{PathRejection, QueryRejection};
use axum::extract::{FromRequestParts, Path, Query};
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use validator::Validate;

/// Maximum length for service names and trace ids
pub const MAX_ID_LENGTH: usize = 256;

pub fn is_valid_id(id: &str) -> bool {
    !id.trim().is_empty() && id.len() <= MAX_ID_LENGTH
}

#[derive(Debug, Deserialize)]
struct ServicePathRaw {
    name: String,
}

/// Validated `{name}` path segment of service routes
#[derive(Debug)]
pub struct ServicePath {
    pub name: String,
}

impl<S> FromRequestParts<S> for ServicePath
where
    S: Send + Sync,
{
    type Rejection = ValidationRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<ServicePathRaw>::from_request_parts(parts, state)
            .await
            .map_err(ValidationRejection::Path)?;

        if !is_valid_id(&raw.name) {
            return Err(ValidationRejection::InvalidServiceName);
        }
        Ok(Self { name: raw.name })
    }
}

#[derive(Debug, Deserialize)]
struct TracePathRaw {
    trace_id: String,
}

/// Validated `{trace_id}` path segment of trace routes
#[derive(Debug)]
pub struct TracePath {
    pub trace_id: String,
}

impl<S> FromRequestParts<S> for TracePath
where
    S: Send + Sync,
{
    type Rejection = ValidationRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<TracePathRaw>::from_request_parts(parts, state)
            .await
            .map_err(ValidationRejection::Path)?;

        if !is_valid_id(&raw.trace_id) {
            return Err(ValidationRejection::InvalidTraceId);
        }
        Ok(Self {
            trace_id: raw.trace_id,
        })
    }
}

/// Validation rejection with structured error response
pub enum ValidationRejection {
    Path(PathRejection),
    InvalidServiceName,
    InvalidTraceId,
    Query(QueryRejection),
    Validation(validator::ValidationErrors),
}

impl IntoResponse for ValidationRejection {
    fn into_response(self) -> Response {
        let (code, message) = match self {
            Self::Path(rejection) => ("PATH_PARSE_ERROR", rejection.body_text()),
            Self::InvalidServiceName => (
                "INVALID_SERVICE_NAME",
                format!("Invalid service name: must be 1-{} characters", MAX_ID_LENGTH),
            ),
            Self::InvalidTraceId => (
                "INVALID_TRACE_ID",
                format!("Invalid trace_id: must be 1-{} characters", MAX_ID_LENGTH),
            ),
            Self::Query(rejection) => ("QUERY_PARSE_ERROR", rejection.body_text()),
            Self::Validation(errors) => ("VALIDATION_ERROR", format_validation_errors(&errors)),
        };
        (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "error": "bad_request",
                "code": code,
                "message": message
            })),
        )
            .into_response()
    }
}

fn format_validation_errors(errors: &validator::ValidationErrors) -> String {
    let mut messages: Vec<String> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| {
                e.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("{}: validation failed", field))
            })
        })
        .collect();
    messages.sort();
    messages.join("; ")
}

/// Query extractor with automatic validation
#[derive(Debug)]
pub struct ValidatedQuery<T>(pub T);

impl<T> Deref for ValidatedQuery<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<S, T> FromRequestParts<S> for ValidatedQuery<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ValidationRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(ValidationRejection::Query)?;
        value.validate().map_err(ValidationRejection::Validation)?;
        Ok(Self(value))
    }
}
