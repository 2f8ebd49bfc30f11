//! services/api/src/web/notes.rs
//!
//! CRUD and search endpoints for the authenticated user's notes.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use notatnik_core::{AuthUser, Note};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

use crate::error::ApiError;
use crate::web::extract::ApiJson;
use crate::web::parse_id;
use crate::web::state::AppState;

const INVALID_NOTE_ID: &str = "Invalid note ID";

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema, Default)]
#[serde(default)]
pub struct NotePayload {
    pub title: String,
    pub content: String,
}

#[derive(Deserialize, IntoParams)]
pub struct SearchParams {
    /// Case-insensitive text to look for in titles and contents.
    pub q: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct NoteDto {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Note> for NoteDto {
    fn from(note: Note) -> Self {
        Self {
            id: note.id,
            title: note.title,
            content: note.content,
            user_id: note.user_id,
            created_at: note.created_at,
            updated_at: note.updated_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct NoteResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub data: NoteDto,
}

impl NoteResponse {
    fn new(note: Note, message: Option<&str>) -> Self {
        Self {
            success: true,
            message: message.map(str::to_string),
            data: note.into(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct NoteListResponse {
    pub success: bool,
    pub count: usize,
    pub data: Vec<NoteDto>,
}

#[derive(Serialize, ToSchema)]
pub struct NoteSearchResponse {
    pub success: bool,
    pub count: usize,
    pub query: String,
    pub data: Vec<NoteDto>,
}

fn dtos(notes: Vec<Note>) -> Vec<NoteDto> {
    notes.into_iter().map(NoteDto::from).collect()
}

//=========================================================================================
// Handlers
//=========================================================================================

/// List the caller's notes, newest first.
#[utoipa::path(
    get,
    path = "/api/notes",
    tag = "notes",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "The caller's notes", body = NoteListResponse),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn list_notes_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<NoteListResponse>, ApiError> {
    let notes = state.notes.list(auth.user_id).await?;
    Ok(Json(NoteListResponse {
        success: true,
        count: notes.len(),
        data: dtos(notes),
    }))
}

/// Search the caller's notes by title or content.
#[utoipa::path(
    get,
    path = "/api/notes/search",
    tag = "notes",
    security(("bearer_auth" = [])),
    params(SearchParams),
    responses(
        (status = 200, description = "Matching notes", body = NoteSearchResponse),
        (status = 400, description = "Missing search query"),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn search_notes_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(params): Query<SearchParams>,
) -> Result<Json<NoteSearchResponse>, ApiError> {
    let query = params.q.unwrap_or_default();
    let notes = state.notes.search(&query, auth.user_id).await?;
    Ok(Json(NoteSearchResponse {
        success: true,
        count: notes.len(),
        query: query.trim().to_string(),
        data: dtos(notes),
    }))
}

/// Fetch one of the caller's notes.
#[utoipa::path(
    get,
    path = "/api/notes/{id}",
    tag = "notes",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "Note id")),
    responses(
        (status = 200, description = "The note", body = NoteResponse),
        (status = 400, description = "Invalid note id"),
        (status = 404, description = "No such note for this user")
    )
)]
pub async fn get_note_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<NoteResponse>, ApiError> {
    let note_id = parse_id(&id, INVALID_NOTE_ID)?;
    let note = state.notes.get(note_id, auth.user_id).await?;
    Ok(Json(NoteResponse::new(note, None)))
}

/// Create a note.
#[utoipa::path(
    post,
    path = "/api/notes",
    tag = "notes",
    security(("bearer_auth" = [])),
    request_body = NotePayload,
    responses(
        (status = 201, description = "Note created", body = NoteResponse),
        (status = 400, description = "Missing or invalid title/content")
    )
)]
pub async fn create_note_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    ApiJson(payload): ApiJson<NotePayload>,
) -> Result<impl IntoResponse, ApiError> {
    let note = state
        .notes
        .create(&payload.title, &payload.content, auth.user_id)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(NoteResponse::new(note, Some("Note created successfully"))),
    ))
}

/// Replace a note's title and content.
#[utoipa::path(
    put,
    path = "/api/notes/{id}",
    tag = "notes",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "Note id")),
    request_body = NotePayload,
    responses(
        (status = 200, description = "Note updated", body = NoteResponse),
        (status = 400, description = "Invalid id or payload"),
        (status = 404, description = "No such note for this user")
    )
)]
pub async fn update_note_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<NotePayload>,
) -> Result<Json<NoteResponse>, ApiError> {
    let note_id = parse_id(&id, INVALID_NOTE_ID)?;
    let note = state
        .notes
        .update(note_id, &payload.title, &payload.content, auth.user_id)
        .await?;
    Ok(Json(NoteResponse::new(note, Some("Note updated successfully"))))
}

/// Delete a note together with its chat session.
#[utoipa::path(
    delete,
    path = "/api/notes/{id}",
    tag = "notes",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "Note id")),
    responses(
        (status = 200, description = "Note deleted; the deleted row is returned", body = NoteResponse),
        (status = 400, description = "Invalid note id"),
        (status = 404, description = "No such note for this user")
    )
)]
pub async fn delete_note_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<NoteResponse>, ApiError> {
    let note_id = parse_id(&id, INVALID_NOTE_ID)?;
    let note = state.notes.delete(note_id, auth.user_id).await?;
    Ok(Json(NoteResponse::new(note, Some("Note deleted successfully"))))
}
