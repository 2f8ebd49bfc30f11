//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service and its mapping
//! onto HTTP responses.
//!
//! Failure bodies use the envelope `{"success": false, "message": ..., "error"?: ...}`.
//! Internal failure details are only attached when detail exposure is switched
//! on for development deployments.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use notatnik_core::{ports::PortError, CoachError, ServiceError};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::error;

use crate::config::ConfigError;

static EXPOSE_DETAILS: AtomicBool = AtomicBool::new(false);

/// Attach internal error details to response bodies (development only).
pub fn set_expose_details(enabled: bool) {
    EXPOSE_DETAILS.store(enabled, Ordering::Relaxed);
}

fn expose_details() -> bool {
    EXPOSE_DETAILS.load(Ordering::Relaxed)
}

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents an error returned by one of the core services.
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents a failure to build the outbound HTTP client.
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The request body is not valid JSON.
    #[error("Invalid JSON format")]
    MalformedJson(String),

    /// A request field or path parameter failed validation in the web layer.
    #[error("{0}")]
    BadRequest(String),

    #[error("Request too large")]
    PayloadTooLarge,

    #[error("Cannot {method} {path}")]
    RouteNotFound { method: String, path: String },

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

/// What, beyond the message, a failure body may carry under `error`.
enum Detail {
    None,
    /// Always shown.
    Public(String),
    /// Shown only when detail exposure is enabled.
    Internal(String),
}

const GENERIC_INTERNAL: &str = "Something went wrong";

impl ApiError {
    fn parts(&self) -> (StatusCode, String, Detail) {
        match self {
            ApiError::Service(err) => service_parts(err),
            ApiError::Port(err) => match err {
                PortError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone(), Detail::None),
                PortError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone(), Detail::None),
                PortError::Unauthorized => (
                    StatusCode::UNAUTHORIZED,
                    "Unauthorized".to_string(),
                    Detail::None,
                ),
                PortError::Unexpected(msg) => internal(msg.clone()),
            },
            ApiError::MalformedJson(_) => (
                StatusCode::BAD_REQUEST,
                self.to_string(),
                Detail::Public("Malformed JSON in request body".to_string()),
            ),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone(), Detail::None),
            ApiError::PayloadTooLarge => (
                StatusCode::PAYLOAD_TOO_LARGE,
                self.to_string(),
                Detail::Public("Request entity too large".to_string()),
            ),
            ApiError::RouteNotFound { .. } => (
                StatusCode::NOT_FOUND,
                self.to_string(),
                Detail::Public("Endpoint not found".to_string()),
            ),
            ApiError::Config(_)
            | ApiError::Database(_)
            | ApiError::HttpClient(_)
            | ApiError::Io(_)
            | ApiError::Internal(_) => internal(self.to_string()),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.parts().0
    }

    /// The JSON body for this error in the given envelope style.
    fn body(&self, auth_style: bool) -> (StatusCode, Value) {
        let (status, message, detail) = self.parts();
        if let Detail::Internal(detail) = &detail {
            error!(status = status.as_u16(), "request failed: {}", detail);
        }
        let detail = match detail {
            Detail::None => None,
            Detail::Public(d) => Some(d),
            Detail::Internal(d) => expose_details().then_some(d),
        };

        let body = if auth_style {
            match detail {
                Some(d) => json!({ "error": message, "details": d }),
                None => json!({ "error": message }),
            }
        } else {
            match detail {
                Some(d) => json!({ "success": false, "message": message, "error": d }),
                None => json!({ "success": false, "message": message }),
            }
        };
        (status, body)
    }
}

fn internal(detail: String) -> (StatusCode, String, Detail) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        GENERIC_INTERNAL.to_string(),
        Detail::Internal(detail),
    )
}

fn service_parts(err: &ServiceError) -> (StatusCode, String, Detail) {
    match err {
        ServiceError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone(), Detail::None),
        ServiceError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone(), Detail::None),
        ServiceError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone(), Detail::None),
        ServiceError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone(), Detail::None),
        ServiceError::Coach(coach) => {
            let status = match coach {
                CoachError::InvalidCredential => StatusCode::BAD_GATEWAY,
                CoachError::QuotaExceeded => StatusCode::TOO_MANY_REQUESTS,
                CoachError::NotConfigured
                | CoachError::ModelNotFound { .. }
                | CoachError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
            };
            let detail = match coach {
                CoachError::Transient(d) => Detail::Internal(d.clone()),
                _ => Detail::None,
            };
            (status, coach.to_string(), detail)
        }
        ServiceError::Internal(msg) => internal(msg.clone()),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = self.body(false);
        (status, Json(body)).into_response()
    }
}

/// An `ApiError` rendered in the auth endpoints' `{"error": ...}` shape.
#[derive(Debug)]
pub struct AuthApiError(pub ApiError);

impl From<ApiError> for AuthApiError {
    fn from(err: ApiError) -> Self {
        AuthApiError(err)
    }
}

impl From<ServiceError> for AuthApiError {
    fn from(err: ServiceError) -> Self {
        AuthApiError(ApiError::Service(err))
    }
}

impl IntoResponse for AuthApiError {
    fn into_response(self) -> Response {
        let (status, body) = self.0.body(true);
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_errors_map_to_their_status_codes() {
        let cases = [
            (ServiceError::Validation("v".into()), StatusCode::BAD_REQUEST),
            (ServiceError::Unauthorized("u".into()), StatusCode::UNAUTHORIZED),
            (ServiceError::Conflict("c".into()), StatusCode::CONFLICT),
            (ServiceError::NotFound("n".into()), StatusCode::NOT_FOUND),
            (ServiceError::Internal("i".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (CoachError::NotConfigured.into(), StatusCode::SERVICE_UNAVAILABLE),
            (CoachError::InvalidCredential.into(), StatusCode::BAD_GATEWAY),
            (CoachError::QuotaExceeded.into(), StatusCode::TOO_MANY_REQUESTS),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn internal_details_are_hidden_by_default() {
        let (status, body) = ApiError::Internal("pool timed out".into()).body(false);
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "success": false, "message": GENERIC_INTERNAL }));
    }

    #[test]
    fn auth_style_uses_the_error_key() {
        let (status, body) = ApiError::from(ServiceError::Conflict("taken".into())).body(true);
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body, json!({ "error": "taken" }));
    }

    #[test]
    fn malformed_json_always_names_the_problem() {
        let (status, body) = ApiError::MalformedJson("eof".into()).body(false);
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invalid JSON format");
        assert_eq!(body["error"], "Malformed JSON in request body");
    }
}
