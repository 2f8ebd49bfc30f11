//! services/api/src/web/api_doc.rs
//!
//! The master definition for the OpenAPI specification.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::web::{ai, auth, health, notes};

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::register_handler,
        auth::login_handler,
        auth::verify_handler,
        auth::logout_handler,
        notes::list_notes_handler,
        notes::search_notes_handler,
        notes::get_note_handler,
        notes::create_note_handler,
        notes::update_note_handler,
        notes::delete_note_handler,
        ai::status_handler,
        ai::models_handler,
        ai::raw_models_handler,
        ai::raw_generate_handler,
        ai::select_model_handler,
        ai::chat_handler,
        ai::persistent_chat_handler,
        ai::list_sessions_handler,
        ai::note_session_handler,
        ai::session_messages_handler,
        ai::delete_session_handler,
        health::health_handler,
        health::version_handler,
    ),
    components(
        schemas(
            auth::RegisterRequest,
            auth::LoginRequest,
            auth::UserResponse,
            auth::AuthResponse,
            auth::VerifyResponse,
            auth::MessageResponse,
            notes::NotePayload,
            notes::NoteDto,
            notes::NoteResponse,
            notes::NoteListResponse,
            notes::NoteSearchResponse,
            ai::SelectModelRequest,
            ai::ChatRequest,
            ai::PersistentChatRequest,
            ai::AiStatusData,
            ai::AiModelsData,
            ai::ModelInfoDto,
            ai::RawGenerateRequest,
            ai::RawGenerateData,
            ai::ActiveModelData,
            ai::ChatReplyData,
            ai::PersistentChatData,
            ai::SessionDto,
            ai::SessionSummaryDto,
            ai::MessageDto,
            health::HealthResponse,
            health::VersionResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Registration, login and token verification."),
        (name = "notes", description = "The authenticated user's notes."),
        (name = "ai", description = "AI coach chat and per-note chat sessions. Successful bodies wrap the documented type as `{success, data, message?}`."),
        (name = "service", description = "Health and build metadata.")
    )
)]
pub struct ApiDoc;

/// Registers the `bearer_auth` scheme referenced by protected paths.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
