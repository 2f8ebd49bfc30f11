//! services/api/src/web/ai.rs
//!
//! AI coach endpoints: provider status and model selection, stateless and
//! persistent chat, and management of the per-note chat sessions.

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use notatnik_core::{
    AuthUser, ChatMessage, ChatSession, ChatSessionSummary, ChatTurn, CoachError, ModelInfo,
    NoteContext,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::web::extract::ApiJson;
use crate::web::parse_id;
use crate::web::state::AppState;

const INVALID_NOTE_ID: &str = "Invalid note ID";
const INVALID_SESSION_ID: &str = "Invalid session ID";
const DEFAULT_TEST_PROMPT: &str = "ping";

//=========================================================================================
// Request Types
//=========================================================================================

#[derive(Deserialize, ToSchema, Default)]
#[serde(default)]
pub struct SelectModelRequest {
    pub model: String,
}

#[derive(Deserialize, ToSchema, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct RawGenerateRequest {
    pub model_name: String,
    /// Defaults to `ping`.
    pub prompt: Option<String>,
}

#[derive(Deserialize, ToSchema, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct ChatRequest {
    pub note_title: String,
    pub note_content: String,
    pub message: String,
    /// Earlier turns, alternating user and coach, oldest first.
    pub conversation_history: Vec<String>,
}

#[derive(Deserialize, ToSchema, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct PersistentChatRequest {
    pub note_id: Option<i64>,
    /// Overrides the stored note title in the prompt.
    pub note_title: Option<String>,
    /// Overrides the stored note content in the prompt.
    pub note_content: Option<String>,
    pub message: String,
}

//=========================================================================================
// Response Types
//=========================================================================================

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AiStatusData {
    pub ai_available: bool,
    pub model: String,
    pub active_model: Option<String>,
    /// `ready` or `not_configured`.
    pub status: String,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AiModelsData {
    pub active_model: Option<String>,
    pub preferred_model: String,
    pub candidate_models: Vec<String>,
    /// What the provider reports for the key; `null` when the listing failed.
    pub models: Option<Vec<ModelInfoDto>>,
}

#[derive(Serialize, ToSchema)]
pub struct ModelInfoDto {
    pub name: String,
    pub methods: Vec<String>,
}

impl From<ModelInfo> for ModelInfoDto {
    fn from(model: ModelInfo) -> Self {
        Self {
            name: model.name,
            methods: model.methods,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct RawGenerateData {
    pub model: String,
    pub response: String,
}

#[derive(Serialize, ToSchema)]
pub struct ActiveModelData {
    pub active: String,
}

#[derive(Serialize, ToSchema)]
pub struct ChatReplyData {
    pub response: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PersistentChatData {
    pub response: String,
    pub session_id: i64,
    pub note_id: i64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Serialize, ToSchema)]
pub struct SessionDto {
    pub id: i64,
    pub user_id: i64,
    pub note_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ChatSession> for SessionDto {
    fn from(session: ChatSession) -> Self {
        Self {
            id: session.id,
            user_id: session.user_id,
            note_id: session.note_id,
            created_at: session.created_at,
            updated_at: session.updated_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct SessionSummaryDto {
    #[serde(flatten)]
    pub session: SessionDto,
    pub note_title: String,
    pub note_content: String,
    pub message_count: i64,
}

impl From<ChatSessionSummary> for SessionSummaryDto {
    fn from(summary: ChatSessionSummary) -> Self {
        Self {
            session: summary.session.into(),
            note_title: summary.note_title,
            note_content: summary.note_content,
            message_count: summary.message_count,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct MessageDto {
    pub id: i64,
    pub session_id: i64,
    /// `user` or `ai`.
    pub sender: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl From<ChatMessage> for MessageDto {
    fn from(message: ChatMessage) -> Self {
        Self {
            id: message.id,
            session_id: message.session_id,
            sender: message.sender.to_string(),
            message: message.message,
            created_at: message.created_at,
        }
    }
}

/// The `{success: true, data, message?}` envelope. Documented bodies name the `data` type.
#[derive(Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub data: T,
}

impl<T> Envelope<T> {
    fn data(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            message: None,
            data,
        })
    }

    fn with_message(message: &str, data: T) -> Json<Self> {
        Json(Self {
            success: true,
            message: Some(message.to_string()),
            data,
        })
    }
}

//=========================================================================================
// Provider Status Handlers
//=========================================================================================

/// Report whether the coach is configured and which model it uses.
#[utoipa::path(
    get,
    path = "/api/ai/status",
    tag = "ai",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "Coach status", body = AiStatusData))
)]
pub async fn status_handler(State(state): State<Arc<AppState>>) -> Json<Envelope<AiStatusData>> {
    let status = state.coach.status().await;
    Envelope::data(AiStatusData {
        ai_available: status.available,
        model: status.preferred_model,
        active_model: status.active_model,
        status: if status.available { "ready" } else { "not_configured" }.to_string(),
    })
}

/// Report the active model and the fallback candidates.
#[utoipa::path(
    get,
    path = "/api/ai/models",
    tag = "ai",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Model configuration", body = AiModelsData),
        (status = 503, description = "The AI service is not configured")
    )
)]
pub async fn models_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Envelope<AiModelsData>>, ApiError> {
    let status = state.coach.status().await;
    if !status.available {
        return Err(ApiError::Service(CoachError::NotConfigured.into()));
    }
    let models = match state.coach.list_models().await {
        Ok(models) => Some(models.into_iter().map(ModelInfoDto::from).collect()),
        Err(e) => {
            warn!(error = %e, "could not list provider models");
            None
        }
    };
    Ok(Envelope::data(AiModelsData {
        active_model: status.active_model,
        preferred_model: status.preferred_model,
        candidate_models: status.candidate_models,
        models,
    }))
}

/// The provider's own model list, failing loudly instead of reporting `null`.
#[utoipa::path(
    get,
    path = "/api/ai/models/raw",
    tag = "ai",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Models reachable with the configured key", body = Vec<ModelInfoDto>),
        (status = 429, description = "Provider quota exceeded"),
        (status = 502, description = "Provider rejected the API key"),
        (status = 503, description = "AI service unavailable")
    )
)]
pub async fn raw_models_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Envelope<Vec<ModelInfoDto>>>, ApiError> {
    let models = state
        .coach
        .list_models()
        .await
        .map_err(|e| ApiError::Service(e.into()))?;
    Ok(Envelope::data(
        models.into_iter().map(ModelInfoDto::from).collect(),
    ))
}

/// Send one prompt straight to a named model, without fallback.
#[utoipa::path(
    post,
    path = "/api/ai/models/raw-generate",
    tag = "ai",
    security(("bearer_auth" = [])),
    request_body = RawGenerateRequest,
    responses(
        (status = 200, description = "The model's reply", body = RawGenerateData),
        (status = 400, description = "Missing model name"),
        (status = 503, description = "AI service or model unavailable")
    )
)]
pub async fn raw_generate_handler(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<RawGenerateRequest>,
) -> Result<Json<Envelope<RawGenerateData>>, ApiError> {
    if req.model_name.is_empty() {
        return Err(ApiError::BadRequest("modelName is required".to_string()));
    }
    let prompt = req
        .prompt
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| DEFAULT_TEST_PROMPT.to_string());
    let response = state
        .coach
        .try_model(&req.model_name, &prompt)
        .await
        .map_err(|e| ApiError::Service(e.into()))?;
    Ok(Envelope::data(RawGenerateData {
        model: req.model_name,
        response,
    }))
}

/// Switch the preferred model at runtime.
#[utoipa::path(
    post,
    path = "/api/ai/model",
    tag = "ai",
    security(("bearer_auth" = [])),
    request_body = SelectModelRequest,
    responses(
        (status = 200, description = "Model switched", body = ActiveModelData),
        (status = 400, description = "Missing model name"),
        (status = 503, description = "No model could be initialised")
    )
)]
pub async fn select_model_handler(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<SelectModelRequest>,
) -> Result<Json<Envelope<ActiveModelData>>, ApiError> {
    if req.model.is_empty() {
        return Err(ApiError::BadRequest("Model is required".to_string()));
    }
    let active = state
        .coach
        .select_model(&req.model)
        .await
        .map_err(|e| ApiError::Service(e.into()))?;
    Ok(Envelope::with_message("Model switched", ActiveModelData { active }))
}

//=========================================================================================
// Chat Handlers
//=========================================================================================

/// Ask the coach about a note without storing anything.
#[utoipa::path(
    post,
    path = "/api/ai/chat",
    tag = "ai",
    security(("bearer_auth" = [])),
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Coach reply", body = ChatReplyData),
        (status = 400, description = "Missing note title, content or message"),
        (status = 429, description = "Provider quota exceeded"),
        (status = 502, description = "Provider rejected the API key"),
        (status = 503, description = "AI service unavailable")
    )
)]
pub async fn chat_handler(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<ChatRequest>,
) -> Result<Json<Envelope<ChatReplyData>>, ApiError> {
    if req.note_title.is_empty() || req.note_content.is_empty() || req.message.is_empty() {
        return Err(ApiError::BadRequest(
            "noteTitle, noteContent and message are required".to_string(),
        ));
    }
    let history = ChatTurn::from_alternating(req.conversation_history);
    let response = state
        .coach
        .get_chat_response(&req.note_title, &req.note_content, &req.message, &history)
        .await
        .map_err(|e| ApiError::Service(e.into()))?;

    Ok(Envelope::data(ChatReplyData {
        response,
        timestamp: Utc::now(),
    }))
}

/// Talk to the coach within the note's persistent session.
#[utoipa::path(
    post,
    path = "/api/ai/chat/persistent",
    tag = "ai",
    security(("bearer_auth" = [])),
    request_body = PersistentChatRequest,
    responses(
        (status = 200, description = "Coach reply, stored with the user's message", body = PersistentChatData),
        (status = 400, description = "Missing note id or message"),
        (status = 404, description = "No such note for this user"),
        (status = 503, description = "AI service unavailable")
    )
)]
pub async fn persistent_chat_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    ApiJson(req): ApiJson<PersistentChatRequest>,
) -> Result<Json<Envelope<PersistentChatData>>, ApiError> {
    let note_id = req
        .note_id
        .filter(|id| *id > 0)
        .ok_or_else(|| ApiError::BadRequest("noteId and message are required".to_string()))?;
    let context = NoteContext {
        title: req.note_title,
        content: req.note_content,
    };

    let exchange = state
        .chat
        .converse(note_id, auth.user_id, &req.message, context)
        .await?;

    Ok(Envelope::data(PersistentChatData {
        response: exchange.ai_message.message,
        session_id: exchange.session.id,
        note_id,
        timestamp: exchange.ai_message.created_at,
    }))
}

//=========================================================================================
// Session Handlers
//=========================================================================================

/// List the caller's chat sessions, most recently used first.
#[utoipa::path(
    get,
    path = "/api/ai/sessions",
    tag = "ai",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "Sessions with note data and message counts", body = Vec<SessionSummaryDto>))
)]
pub async fn list_sessions_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Envelope<Vec<SessionSummaryDto>>>, ApiError> {
    let sessions = state.chat.list_user_sessions(auth.user_id).await?;
    Ok(Envelope::data(
        sessions.into_iter().map(SessionSummaryDto::from).collect(),
    ))
}

/// The chat session of a note, or `null` if none was started.
#[utoipa::path(
    get,
    path = "/api/ai/sessions/note/{noteId}",
    tag = "ai",
    security(("bearer_auth" = [])),
    params(("noteId" = i64, Path, description = "Note id")),
    responses(
        (status = 200, description = "The session or null", body = SessionDto),
        (status = 400, description = "Invalid note id")
    )
)]
pub async fn note_session_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(note_id): Path<String>,
) -> Result<Json<Envelope<Option<SessionDto>>>, ApiError> {
    let note_id = parse_id(&note_id, INVALID_NOTE_ID)?;
    let session = state.chat.session_for_note(note_id, auth.user_id).await?;
    Ok(Envelope::data(session.map(SessionDto::from)))
}

/// Messages of one of the caller's sessions, oldest first.
#[utoipa::path(
    get,
    path = "/api/ai/sessions/{sessionId}/messages",
    tag = "ai",
    security(("bearer_auth" = [])),
    params(("sessionId" = i64, Path, description = "Chat session id")),
    responses(
        (status = 200, description = "Messages in conversation order", body = Vec<MessageDto>),
        (status = 400, description = "Invalid session id"),
        (status = 404, description = "No such session for this user")
    )
)]
pub async fn session_messages_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(session_id): Path<String>,
) -> Result<Json<Envelope<Vec<MessageDto>>>, ApiError> {
    let session_id = parse_id(&session_id, INVALID_SESSION_ID)?;
    let messages = state.chat.list_messages(session_id, auth.user_id).await?;
    Ok(Envelope::data(
        messages.into_iter().map(MessageDto::from).collect(),
    ))
}

/// Delete one of the caller's sessions and its messages.
#[utoipa::path(
    delete,
    path = "/api/ai/sessions/{sessionId}",
    tag = "ai",
    security(("bearer_auth" = [])),
    params(("sessionId" = i64, Path, description = "Chat session id")),
    responses(
        (status = 200, description = "Session deleted; the deleted row is returned", body = SessionDto),
        (status = 400, description = "Invalid session id"),
        (status = 404, description = "No such session for this user")
    )
)]
pub async fn delete_session_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(session_id): Path<String>,
) -> Result<Json<Envelope<SessionDto>>, ApiError> {
    let session_id = parse_id(&session_id, INVALID_SESSION_ID)?;
    let session = state.chat.delete_session(session_id, auth.user_id).await?;
    Ok(Envelope::with_message("Chat session deleted", session.into()))
}
