//! services/api/src/web/health.rs
//!
//! Unauthenticated service endpoints: banner, endpoint index, health and version.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;

use crate::web::state::AppState;

const SERVICE_NAME: &str = "Notatnik API";

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    /// `OK` or `ERROR`.
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Serialize, ToSchema)]
pub struct VersionResponse {
    pub name: String,
    pub version: String,
}

/// GET / - Service banner
pub async fn root_handler() -> Json<Value> {
    Json(json!({
        "message": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "timestamp": Utc::now(),
    }))
}

/// GET /api - Endpoint index
pub async fn index_handler() -> Json<Value> {
    Json(json!({
        "message": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "auth": {
                "POST /api/auth/register": "Register a new user",
                "POST /api/auth/login": "Log in",
                "GET /api/auth/verify": "Verify the bearer token",
                "POST /api/auth/logout": "Log out"
            },
            "notes": {
                "GET /api/notes": "List the user's notes",
                "GET /api/notes/:id": "Get a note by id",
                "POST /api/notes": "Create a note",
                "PUT /api/notes/:id": "Update a note",
                "DELETE /api/notes/:id": "Delete a note",
                "GET /api/notes/search?q=query": "Search notes"
            },
            "ai": {
                "GET /api/ai/status": "AI coach status",
                "GET /api/ai/models": "Active, candidate and provider-listed models",
                "GET /api/ai/models/raw": "Provider model list",
                "POST /api/ai/models/raw-generate": "Send a prompt straight to one model",
                "POST /api/ai/model": "Switch the preferred model",
                "POST /api/ai/chat": "Ask the coach without storing the conversation",
                "POST /api/ai/chat/persistent": "Ask the coach within the note's session",
                "GET /api/ai/sessions": "List chat sessions",
                "GET /api/ai/sessions/note/:noteId": "Chat session of a note",
                "GET /api/ai/sessions/:sessionId/messages": "Messages of a session",
                "DELETE /api/ai/sessions/:sessionId": "Delete a session"
            }
        },
        "timestamp": Utc::now(),
    }))
}

/// Liveness probe including a database round trip.
#[utoipa::path(
    get,
    path = "/health",
    tag = "service",
    responses(
        (status = 200, description = "Service and database are reachable", body = HealthResponse),
        (status = 500, description = "The database is unreachable", body = HealthResponse)
    )
)]
pub async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.health.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "OK".to_string(),
                database: Some("connected".to_string()),
                message: None,
                timestamp: Utc::now(),
            }),
        ),
        Err(e) => {
            error!("Health check failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(HealthResponse {
                    status: "ERROR".to_string(),
                    database: Some("disconnected".to_string()),
                    message: Some("Database is unreachable".to_string()),
                    timestamp: Utc::now(),
                }),
            )
        }
    }
}

/// Build metadata.
#[utoipa::path(
    get,
    path = "/version",
    tag = "service",
    responses((status = 200, description = "Service name and version", body = VersionResponse))
)]
pub async fn version_handler() -> Json<VersionResponse> {
    Json(VersionResponse {
        name: SERVICE_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
