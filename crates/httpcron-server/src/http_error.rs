//! HTTP error representation for the control plane (spec.md §6, §7).
//!
//! Grounded on the shape of `rustpress-server/src/error.rs::HttpError`
//! (status + body, `From<httpcron_core::Error>`, `IntoResponse`), but with
//! the teacher's `{code, message, details, request_id}` envelope replaced by
//! the spec's bare `{"detail": <string|array>}` contract.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use httpcron_core::error::Error as CoreError;
use serde::Serialize;

/// The error body returned on every non-2xx response: `{"detail": ...}`.
#[derive(Debug, Serialize)]
struct ErrorBody {
    detail: Detail,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Detail {
    Message(String),
    FieldErrors(Vec<String>),
}

pub struct ApiError {
    status: StatusCode,
    detail: Detail,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            detail: Detail::Message(message.into()),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unprocessable_entity(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { detail: self.detail })).into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let status =
            StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let detail = match &err {
            CoreError::Validation(errors) => Detail::FieldErrors(
                errors
                    .errors
                    .iter()
                    .map(|e| format!("{}: {}", e.field, e.message))
                    .collect(),
            ),
            CoreError::Database { message, .. } => {
                tracing::error!(error = %message, "database error");
                Detail::Message("a database error occurred".to_string())
            }
            CoreError::Internal { message } => {
                tracing::error!(error = %message, "internal error");
                Detail::Message("an internal error occurred".to_string())
            }
            CoreError::Configuration { message } => {
                tracing::error!(error = %message, "configuration error");
                Detail::Message("a configuration error occurred".to_string())
            }
            CoreError::Other(source) => {
                tracing::error!(error = %source, "unexpected error");
                Detail::Message("an unexpected error occurred".to_string())
            }
            _ => Detail::Message(err.to_string()),
        };

        Self { status, detail }
    }
}

/// `Json<T>` extraction failures (malformed body, wrong content-type, schema
/// mismatch) surface as 422 per spec.md §6, distinct from the 400s our own
/// `Error::Validation`/`InvalidInput` variants produce.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::unprocessable_entity(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_404() {
        let err: ApiError = CoreError::not_found("Target", "abc").into();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn validation_errors_become_an_array() {
        let mut errors = httpcron_core::error::ValidationErrors::new();
        errors.add("url", "must start with http:// or https://");
        let err: ApiError = CoreError::Validation(errors).into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        match err.detail {
            Detail::FieldErrors(fields) => assert_eq!(fields.len(), 1),
            Detail::Message(_) => panic!("expected field errors"),
        }
    }
}
