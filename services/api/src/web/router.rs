//! services/api/src/web/router.rs
//!
//! Assembles the complete HTTP application: public and protected routes, the
//! middleware stack, the JSON 404 fallback and the Swagger UI.

use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{self, ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method, Uri,
    },
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};
use tracing::warn;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::error::ApiError;
use crate::web::{
    ai, api_doc::ApiDoc, auth, health,
    middleware::{request_size_limit, require_auth, MAX_BODY_BYTES},
    notes,
    state::AppState,
};

/// Builds the router with every route and layer wired onto `state`.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.cors_allowed_origins);

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/", get(health::root_handler))
        .route("/api", get(health::index_handler))
        .route("/health", get(health::health_handler))
        .route("/version", get(health::version_handler))
        .route("/api/auth/register", post(auth::register_handler))
        .route("/api/auth/login", post(auth::login_handler))
        .route("/api/auth/logout", post(auth::logout_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/api/auth/verify", get(auth::verify_handler))
        .route(
            "/api/notes",
            get(notes::list_notes_handler).post(notes::create_note_handler),
        )
        .route("/api/notes/search", get(notes::search_notes_handler))
        .route(
            "/api/notes/{id}",
            get(notes::get_note_handler)
                .put(notes::update_note_handler)
                .delete(notes::delete_note_handler),
        )
        .route("/api/ai/status", get(ai::status_handler))
        .route("/api/ai/models", get(ai::models_handler))
        .route("/api/ai/models/raw", get(ai::raw_models_handler))
        .route("/api/ai/models/raw-generate", post(ai::raw_generate_handler))
        .route("/api/ai/model", post(ai::select_model_handler))
        .route("/api/ai/chat", post(ai::chat_handler))
        .route("/api/ai/chat/persistent", post(ai::persistent_chat_handler))
        .route("/api/ai/sessions", get(ai::list_sessions_handler))
        .route("/api/ai/sessions/note/{noteId}", get(ai::note_session_handler))
        .route(
            "/api/ai/sessions/{sessionId}/messages",
            get(ai::session_messages_handler),
        )
        .route(
            "/api/ai/sessions/{sessionId}",
            axum::routing::delete(ai::delete_session_handler),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ));

    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .fallback(not_found_handler)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(axum_middleware::from_fn(request_size_limit))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::REFERRER_POLICY,
            HeaderValue::from_static("no-referrer"),
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Merge the API router with the Swagger UI router for a complete application.
    Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}

/// Cross-origin policy for the configured allow-list. Requests without an
/// `Origin` header pass through untouched.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT])
}

async fn not_found_handler(method: Method, uri: Uri) -> ApiError {
    ApiError::RouteNotFound {
        method: method.to_string(),
        path: uri.path().to_string(),
    }
}
