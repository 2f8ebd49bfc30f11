//! crates/notatnik_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

/// Lifetime of every issued bearer token.
pub const TOKEN_TTL_DAYS: i64 = 7;

/// Minimum accepted password length at registration.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Upper bound of the `users.username` column.
pub const MAX_USERNAME_LEN: usize = 50;

/// Upper bound of the `notes.title` column.
pub const MAX_TITLE_LEN: usize = 255;

// Represents a user - used throughout app
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Only used internally for login/signup - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: String,
}

/// The identity carried by a verified bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: i64,
    pub username: String,
}

/// The result of a successful registration or login.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user: User,
    pub token: String,
}

/// A user-owned title/content record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The single persistent AI conversation bound to one note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatSession {
    pub id: i64,
    pub user_id: i64,
    pub note_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A chat session joined with its note and the number of stored messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatSessionSummary {
    pub session: ChatSession,
    pub note_title: String,
    pub note_content: String,
    pub message_count: i64,
}

/// Who wrote a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sender {
    User,
    Ai,
}

impl Sender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Ai => "ai",
        }
    }
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Sender::User),
            "ai" => Ok(Sender::Ai),
            other => Err(format!("unknown message sender '{other}'")),
        }
    }
}

/// A single, append-only message within a chat session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: i64,
    pub session_id: i64,
    pub sender: Sender,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// One turn of conversation history handed to the coach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    pub sender: Sender,
    pub text: String,
}

impl ChatTurn {
    /// Labels bare history strings by position: even indexes are the user,
    /// odd indexes are the coach. Only correct for strictly alternating history.
    pub fn from_alternating<I, S>(history: I) -> Vec<ChatTurn>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        history
            .into_iter()
            .enumerate()
            .map(|(index, text)| ChatTurn {
                sender: if index % 2 == 0 { Sender::User } else { Sender::Ai },
                text: text.into(),
            })
            .collect()
    }
}

impl From<&ChatMessage> for ChatTurn {
    fn from(message: &ChatMessage) -> Self {
        ChatTurn {
            sender: message.sender,
            text: message.message.clone(),
        }
    }
}
