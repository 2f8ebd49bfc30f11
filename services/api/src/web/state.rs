//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use notatnik_core::ports::{
    ChatRepository, CredentialHasher, GenerativeModel, HealthCheck, NoteRepository, TokenService,
    UserRepository,
};
use notatnik_core::{AuthService, ChatService, CoachService, ModelSelector, NotesService};
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The concrete implementations the services are wired onto.
pub struct Adapters {
    pub users: Arc<dyn UserRepository>,
    pub notes: Arc<dyn NoteRepository>,
    pub chats: Arc<dyn ChatRepository>,
    pub health: Arc<dyn HealthCheck>,
    pub hasher: Arc<dyn CredentialHasher>,
    pub tokens: Arc<dyn TokenService>,
    /// `None` when no provider credential is configured.
    pub model: Option<Arc<dyn GenerativeModel>>,
}

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub auth: AuthService,
    pub notes: NotesService,
    pub chat: ChatService,
    pub coach: CoachService,
    pub health: Arc<dyn HealthCheck>,
}

impl AppState {
    pub fn new(config: Arc<Config>, adapters: Adapters) -> Self {
        let coach = match adapters.model {
            Some(model) => {
                let selector = ModelSelector::new(
                    model,
                    config.gemini_model.clone(),
                    config.gemini_candidate_models.clone(),
                );
                CoachService::new(Arc::new(selector), config.gemini_model.clone())
            }
            None => CoachService::unavailable(config.gemini_model.clone()),
        };

        Self {
            auth: AuthService::new(adapters.users, adapters.hasher, adapters.tokens),
            notes: NotesService::new(adapters.notes.clone()),
            chat: ChatService::new(adapters.chats, adapters.notes, coach.clone()),
            coach,
            health: adapters.health,
            config,
        }
    }
}
