//! crates/notatnik_core/src/chat.rs
//!
//! Persistent coach conversations: one session per note, append-only messages.

use std::sync::Arc;
use tracing::{debug, info};

use crate::coach::{CoachError, CoachService};
use crate::domain::{ChatMessage, ChatSession, ChatSessionSummary, ChatTurn, Note, Sender};
use crate::error::{require_non_blank, ServiceError, ServiceResult};
use crate::notes::NOTE_NOT_FOUND;
use crate::ports::{ChatRepository, NoteRepository, PortError};

pub const SESSION_NOT_FOUND: &str = "Chat session not found";

/// The outcome of one persisted user/coach exchange.
#[derive(Debug, Clone)]
pub struct ChatExchange {
    pub session: ChatSession,
    pub user_message: ChatMessage,
    pub ai_message: ChatMessage,
}

/// Note text to hand to the coach instead of the stored note.
#[derive(Debug, Clone, Default)]
pub struct NoteContext {
    pub title: Option<String>,
    pub content: Option<String>,
}

#[derive(Clone)]
pub struct ChatService {
    chat: Arc<dyn ChatRepository>,
    notes: Arc<dyn NoteRepository>,
    coach: CoachService,
}

impl ChatService {
    pub fn new(
        chat: Arc<dyn ChatRepository>,
        notes: Arc<dyn NoteRepository>,
        coach: CoachService,
    ) -> Self {
        Self { chat, notes, coach }
    }

    async fn owned_note(&self, note_id: i64, user_id: i64) -> ServiceResult<Note> {
        self.notes
            .get_note(note_id, user_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(NOTE_NOT_FOUND.to_string()))
    }

    async fn owned_session(&self, session_id: i64, user_id: i64) -> ServiceResult<ChatSession> {
        self.chat
            .find_session(session_id, user_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(SESSION_NOT_FOUND.to_string()))
    }

    /// Returns the note's session, refreshing its `updated_at`, or creates it.
    ///
    /// Two concurrent first calls can both miss the lookup; the loser's insert
    /// hits the unique constraint on `note_id` and re-reads the winner's row.
    pub async fn get_or_create_session(
        &self,
        note_id: i64,
        user_id: i64,
    ) -> ServiceResult<ChatSession> {
        self.owned_note(note_id, user_id).await?;

        if let Some(existing) = self.chat.find_session_by_note(note_id, user_id).await? {
            return Ok(self.chat.touch_session(existing.id).await?);
        }

        match self.chat.create_session(note_id, user_id).await {
            Ok(session) => {
                info!(session_id = session.id, note_id, user_id, "chat session created");
                Ok(session)
            }
            Err(PortError::Conflict(_)) => {
                debug!(note_id, user_id, "chat session created concurrently, re-reading");
                let session = self
                    .chat
                    .find_session_by_note(note_id, user_id)
                    .await?
                    .ok_or_else(|| ServiceError::NotFound(SESSION_NOT_FOUND.to_string()))?;
                Ok(self.chat.touch_session(session.id).await?)
            }
            Err(other) => Err(other.into()),
        }
    }

    /// The note's session, if one was ever started.
    pub async fn session_for_note(
        &self,
        note_id: i64,
        user_id: i64,
    ) -> ServiceResult<Option<ChatSession>> {
        Ok(self.chat.find_session_by_note(note_id, user_id).await?)
    }

    /// All messages of a session owned by the user, oldest first.
    pub async fn list_messages(
        &self,
        session_id: i64,
        user_id: i64,
    ) -> ServiceResult<Vec<ChatMessage>> {
        self.owned_session(session_id, user_id).await?;
        Ok(self.chat.list_messages(session_id).await?)
    }

    pub async fn append_message(
        &self,
        session_id: i64,
        sender: Sender,
        text: &str,
    ) -> ServiceResult<ChatMessage> {
        Ok(self.chat.add_message(session_id, sender, text).await?)
    }

    pub async fn list_user_sessions(&self, user_id: i64) -> ServiceResult<Vec<ChatSessionSummary>> {
        Ok(self.chat.list_user_sessions(user_id).await?)
    }

    pub async fn delete_session(
        &self,
        session_id: i64,
        user_id: i64,
    ) -> ServiceResult<ChatSession> {
        let session = self
            .chat
            .delete_session(session_id, user_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(SESSION_NOT_FOUND.to_string()))?;
        info!(session_id, user_id, "chat session deleted");
        Ok(session)
    }

    /// Sends `message` to the coach within the note's persistent session.
    ///
    /// The history handed to the coach is the session as it was before this
    /// message. The user's message is stored before the coach is called, so it
    /// survives a failed generation.
    pub async fn converse(
        &self,
        note_id: i64,
        user_id: i64,
        message: &str,
        context: NoteContext,
    ) -> ServiceResult<ChatExchange> {
        let message = require_non_blank(message, "Message is required")?;
        if !self.coach.is_available() {
            return Err(CoachError::NotConfigured.into());
        }

        let note = self.owned_note(note_id, user_id).await?;
        let title = non_blank_or(context.title, note.title);
        let content = non_blank_or(context.content, note.content);

        let session = self.get_or_create_session(note_id, user_id).await?;
        let history: Vec<ChatTurn> = self
            .chat
            .list_messages(session.id)
            .await?
            .iter()
            .map(ChatTurn::from)
            .collect();

        let user_message = self.append_message(session.id, Sender::User, message).await?;
        let reply = self
            .coach
            .get_chat_response(&title, &content, message, &history)
            .await?;
        let ai_message = self.append_message(session.id, Sender::Ai, &reply).await?;

        Ok(ChatExchange {
            session,
            user_message,
            ai_message,
        })
    }
}

fn non_blank_or(value: Option<String>, fallback: String) -> String {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or(fallback)
}
