//! crates/notatnik_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use async_trait::async_trait;

use crate::domain::{
    AuthUser, ChatMessage, ChatSession, ChatSessionSummary, Note, Sender, User, UserCredentials,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// A uniqueness constraint rejected the write.
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Persistence Ports
//=========================================================================================

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Inserts a new user. A duplicate username or email yields `PortError::Conflict`.
    async fn create_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> PortResult<User>;

    /// True if any user already holds the username or the email.
    async fn user_exists(&self, username: &str, email: &str) -> PortResult<bool>;

    async fn get_credentials_by_username(
        &self,
        username: &str,
    ) -> PortResult<Option<UserCredentials>>;

    async fn get_user_by_id(&self, user_id: i64) -> PortResult<Option<User>>;
}

#[async_trait]
pub trait NoteRepository: Send + Sync {
    /// All notes of the user, newest first.
    async fn list_notes(&self, user_id: i64) -> PortResult<Vec<Note>>;

    async fn get_note(&self, note_id: i64, user_id: i64) -> PortResult<Option<Note>>;

    async fn create_note(&self, title: &str, content: &str, user_id: i64) -> PortResult<Note>;

    async fn update_note(
        &self,
        note_id: i64,
        title: &str,
        content: &str,
        user_id: i64,
    ) -> PortResult<Option<Note>>;

    async fn delete_note(&self, note_id: i64, user_id: i64) -> PortResult<Option<Note>>;

    /// Case-insensitive literal substring match on title or content, newest first.
    async fn search_notes(&self, query: &str, user_id: i64) -> PortResult<Vec<Note>>;
}

#[async_trait]
pub trait ChatRepository: Send + Sync {
    async fn find_session_by_note(
        &self,
        note_id: i64,
        user_id: i64,
    ) -> PortResult<Option<ChatSession>>;

    async fn find_session(&self, session_id: i64, user_id: i64) -> PortResult<Option<ChatSession>>;

    /// Inserts a session. A second session for the same note yields `PortError::Conflict`.
    async fn create_session(&self, note_id: i64, user_id: i64) -> PortResult<ChatSession>;

    /// Refreshes `updated_at` and returns the refreshed row.
    async fn touch_session(&self, session_id: i64) -> PortResult<ChatSession>;

    /// Messages of a session in conversation order.
    async fn list_messages(&self, session_id: i64) -> PortResult<Vec<ChatMessage>>;

    async fn add_message(
        &self,
        session_id: i64,
        sender: Sender,
        message: &str,
    ) -> PortResult<ChatMessage>;

    /// Sessions of a user joined with note data and message counts, most recently updated first.
    async fn list_user_sessions(&self, user_id: i64) -> PortResult<Vec<ChatSessionSummary>>;

    async fn delete_session(
        &self,
        session_id: i64,
        user_id: i64,
    ) -> PortResult<Option<ChatSession>>;
}

#[async_trait]
pub trait HealthCheck: Send + Sync {
    /// Round-trips the backing store.
    async fn ping(&self) -> PortResult<()>;
}

//=========================================================================================
// Credential Ports
//=========================================================================================

/// Salted one-way password hashing.
pub trait CredentialHasher: Send + Sync {
    fn hash_password(&self, password: &str) -> PortResult<String>;

    /// `Ok(false)` for a wrong password; `Err` only for an unreadable stored hash.
    fn verify_password(&self, password: &str, password_hash: &str) -> PortResult<bool>;
}

/// Issues and verifies signed bearer tokens.
pub trait TokenService: Send + Sync {
    fn issue(&self, user: &User) -> PortResult<String>;

    /// Any invalid, tampered or expired token yields `PortError::Unauthorized`.
    fn verify(&self, token: &str) -> PortResult<AuthUser>;
}

//=========================================================================================
// Generative Model Port
//=========================================================================================

/// Failures reported by a generative-language provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("the API credential was rejected")]
    InvalidCredential,
    #[error("the request quota was exceeded")]
    QuotaExceeded,
    #[error("model '{0}' was not found")]
    ModelNotFound(String),
    #[error("provider request failed: {0}")]
    Other(String),
}

/// A model the provider reports as reachable with the configured credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    /// Bare identifier, without the provider's `models/` prefix.
    pub name: String,
    /// Supported generation methods, e.g. `generateContent`.
    pub methods: Vec<String>,
}

#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Sends a single prompt to `model` and returns the generated text.
    async fn generate(&self, model: &str, prompt: &str) -> Result<String, ProviderError>;

    /// Lists the models the credential can reach.
    async fn list_models(&self) -> Result<Vec<ModelInfo>, ProviderError>;
}
