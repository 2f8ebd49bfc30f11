pub mod auth;
pub mod chat;
pub mod coach;
pub mod domain;
pub mod error;
pub mod mock;
pub mod notes;
pub mod ports;

pub use auth::AuthService;
pub use chat::{ChatExchange, ChatService, NoteContext};
pub use coach::{CoachError, CoachService, CoachStatus, ModelSelector};
pub use domain::{
    AuthSession, AuthUser, ChatMessage, ChatSession, ChatSessionSummary, ChatTurn, Note, Sender,
    User, UserCredentials,
};
pub use error::{ServiceError, ServiceResult};
pub use notes::NotesService;
pub use ports::{
    ChatRepository, CredentialHasher, GenerativeModel, HealthCheck, ModelInfo, NoteRepository,
    PortError, PortResult, ProviderError, TokenService, UserRepository,
};
