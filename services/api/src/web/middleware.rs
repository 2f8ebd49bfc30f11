//! services/api/src/web/middleware.rs
//!
//! Request middleware: bearer-token authentication and the request size guard.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::warn;

use crate::error::{ApiError, AuthApiError};
use crate::web::state::AppState;
use notatnik_core::ServiceError;

/// Largest accepted request body.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Middleware that validates the `Authorization: Bearer` token.
///
/// If valid, inserts the resolved `AuthUser` into request extensions for handlers to use.
/// If invalid or missing, returns 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthApiError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            warn!(path = %req.uri().path(), "request without bearer token");
            ServiceError::Unauthorized("Access token is required".to_string())
        })?;

    let auth_user = state.auth.verify_token(token)?;
    req.extensions_mut().insert(auth_user);

    Ok(next.run(req).await)
}

/// Rejects requests whose declared `Content-Length` exceeds `MAX_BODY_BYTES`
/// before the body is read.
pub async fn request_size_limit(req: Request, next: Next) -> Response {
    let declared = req
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());

    if matches!(declared, Some(len) if len > MAX_BODY_BYTES) {
        warn!(path = %req.uri().path(), "request body too large");
        return ApiError::PayloadTooLarge.into_response();
    }
    next.run(req).await
}
