//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, the PostgreSQL implementation of the
//! persistence ports from the `core` crate. Queries are built at runtime with
//! `sqlx::query_as` so the crate compiles without a live database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use notatnik_core::domain::{
    ChatMessage, ChatSession, ChatSessionSummary, Note, Sender, User, UserCredentials,
};
use notatnik_core::ports::{
    ChatRepository, HealthCheck, NoteRepository, PortError, PortResult, UserRepository,
};
use sqlx::{FromRow, PgPool};

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter implementing every persistence port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

/// Maps constraint violations to their port meaning; everything else is unexpected.
fn map_db_error(err: sqlx::Error, context: &str) -> PortError {
    if let sqlx::Error::Database(db_err) = &err {
        match db_err.code().as_deref() {
            Some(UNIQUE_VIOLATION) => return PortError::Conflict(context.to_string()),
            Some(FOREIGN_KEY_VIOLATION) => return PortError::NotFound(context.to_string()),
            _ => {}
        }
    }
    PortError::Unexpected(err.to_string())
}

fn unexpected(err: sqlx::Error) -> PortError {
    PortError::Unexpected(err.to_string())
}

/// Escapes `LIKE` wildcards so the query matches literally.
fn like_pattern(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len() + 2);
    escaped.push('%');
    for c in query.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    id: i64,
    username: String,
    email: String,
    password_hash: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl UserRecord {
    fn to_domain(self) -> UserCredentials {
        UserCredentials {
            user: User {
                id: self.id,
                username: self.username,
                email: self.email,
                created_at: self.created_at,
                updated_at: self.updated_at,
            },
            password_hash: self.password_hash,
        }
    }
}

#[derive(FromRow)]
struct NoteRecord {
    id: i64,
    title: String,
    content: String,
    user_id: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl NoteRecord {
    fn to_domain(self) -> Note {
        Note {
            id: self.id,
            title: self.title,
            content: self.content,
            user_id: self.user_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct SessionRecord {
    id: i64,
    user_id: i64,
    note_id: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl SessionRecord {
    fn to_domain(self) -> ChatSession {
        ChatSession {
            id: self.id,
            user_id: self.user_id,
            note_id: self.note_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct SessionSummaryRecord {
    #[sqlx(flatten)]
    session: SessionRecord,
    note_title: String,
    note_content: String,
    message_count: i64,
}
impl SessionSummaryRecord {
    fn to_domain(self) -> ChatSessionSummary {
        ChatSessionSummary {
            session: self.session.to_domain(),
            note_title: self.note_title,
            note_content: self.note_content,
            message_count: self.message_count,
        }
    }
}

#[derive(FromRow)]
struct MessageRecord {
    id: i64,
    session_id: i64,
    sender: String,
    message: String,
    created_at: DateTime<Utc>,
}
impl MessageRecord {
    fn to_domain(self) -> PortResult<ChatMessage> {
        let sender = self.sender.parse::<Sender>().map_err(PortError::Unexpected)?;
        Ok(ChatMessage {
            id: self.id,
            session_id: self.session_id,
            sender,
            message: self.message,
            created_at: self.created_at,
        })
    }
}

const USER_COLUMNS: &str = "id, username, email, password_hash, created_at, updated_at";
const NOTE_COLUMNS: &str = "id, title, content, user_id, created_at, updated_at";
const SESSION_COLUMNS: &str = "id, user_id, note_id, created_at, updated_at";
const MESSAGE_COLUMNS: &str = "id, session_id, sender, message, created_at";

//=========================================================================================
// `UserRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl UserRepository for DbAdapter {
    async fn create_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "INSERT INTO users (username, email, password_hash) VALUES ($1, $2, $3) RETURNING {USER_COLUMNS}"
        ))
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_db_error(e, "username or email already exists"))?;
        Ok(record.to_domain().user)
    }

    async fn user_exists(&self, username: &str, email: &str) -> PortResult<bool> {
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM users WHERE username = $1 OR email = $2)",
        )
        .bind(username)
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(exists)
    }

    async fn get_credentials_by_username(
        &self,
        username: &str,
    ) -> PortResult<Option<UserCredentials>> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(UserRecord::to_domain))
    }

    async fn get_user_by_id(&self, user_id: i64) -> PortResult<Option<User>> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(|r| r.to_domain().user))
    }
}

//=========================================================================================
// `NoteRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl NoteRepository for DbAdapter {
    async fn list_notes(&self, user_id: i64) -> PortResult<Vec<Note>> {
        let records = sqlx::query_as::<_, NoteRecord>(&format!(
            "SELECT {NOTE_COLUMNS} FROM notes WHERE user_id = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(NoteRecord::to_domain).collect())
    }

    async fn get_note(&self, note_id: i64, user_id: i64) -> PortResult<Option<Note>> {
        let record = sqlx::query_as::<_, NoteRecord>(&format!(
            "SELECT {NOTE_COLUMNS} FROM notes WHERE id = $1 AND user_id = $2"
        ))
        .bind(note_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(NoteRecord::to_domain))
    }

    async fn create_note(&self, title: &str, content: &str, user_id: i64) -> PortResult<Note> {
        let record = sqlx::query_as::<_, NoteRecord>(&format!(
            "INSERT INTO notes (title, content, user_id) VALUES ($1, $2, $3) RETURNING {NOTE_COLUMNS}"
        ))
        .bind(title)
        .bind(content)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_db_error(e, "owning user does not exist"))?;
        Ok(record.to_domain())
    }

    async fn update_note(
        &self,
        note_id: i64,
        title: &str,
        content: &str,
        user_id: i64,
    ) -> PortResult<Option<Note>> {
        let record = sqlx::query_as::<_, NoteRecord>(&format!(
            "UPDATE notes SET title = $1, content = $2, updated_at = NOW() \
             WHERE id = $3 AND user_id = $4 RETURNING {NOTE_COLUMNS}"
        ))
        .bind(title)
        .bind(content)
        .bind(note_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(NoteRecord::to_domain))
    }

    async fn delete_note(&self, note_id: i64, user_id: i64) -> PortResult<Option<Note>> {
        let record = sqlx::query_as::<_, NoteRecord>(&format!(
            "DELETE FROM notes WHERE id = $1 AND user_id = $2 RETURNING {NOTE_COLUMNS}"
        ))
        .bind(note_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(NoteRecord::to_domain))
    }

    async fn search_notes(&self, query: &str, user_id: i64) -> PortResult<Vec<Note>> {
        let records = sqlx::query_as::<_, NoteRecord>(&format!(
            r"SELECT {NOTE_COLUMNS} FROM notes
              WHERE user_id = $1 AND (title ILIKE $2 ESCAPE '\' OR content ILIKE $2 ESCAPE '\')
              ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id)
        .bind(like_pattern(query))
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(NoteRecord::to_domain).collect())
    }
}

//=========================================================================================
// `ChatRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl ChatRepository for DbAdapter {
    async fn find_session_by_note(
        &self,
        note_id: i64,
        user_id: i64,
    ) -> PortResult<Option<ChatSession>> {
        let record = sqlx::query_as::<_, SessionRecord>(&format!(
            "SELECT {SESSION_COLUMNS} FROM chat_sessions WHERE note_id = $1 AND user_id = $2"
        ))
        .bind(note_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(SessionRecord::to_domain))
    }

    async fn find_session(&self, session_id: i64, user_id: i64) -> PortResult<Option<ChatSession>> {
        let record = sqlx::query_as::<_, SessionRecord>(&format!(
            "SELECT {SESSION_COLUMNS} FROM chat_sessions WHERE id = $1 AND user_id = $2"
        ))
        .bind(session_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(SessionRecord::to_domain))
    }

    async fn create_session(&self, note_id: i64, user_id: i64) -> PortResult<ChatSession> {
        let record = sqlx::query_as::<_, SessionRecord>(&format!(
            "INSERT INTO chat_sessions (note_id, user_id) VALUES ($1, $2) RETURNING {SESSION_COLUMNS}"
        ))
        .bind(note_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_db_error(e, &format!("chat session for note {note_id}")))?;
        Ok(record.to_domain())
    }

    async fn touch_session(&self, session_id: i64) -> PortResult<ChatSession> {
        let record = sqlx::query_as::<_, SessionRecord>(&format!(
            "UPDATE chat_sessions SET updated_at = NOW() WHERE id = $1 RETURNING {SESSION_COLUMNS}"
        ))
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        record
            .map(SessionRecord::to_domain)
            .ok_or_else(|| PortError::NotFound(format!("Chat session {} not found", session_id)))
    }

    async fn list_messages(&self, session_id: i64) -> PortResult<Vec<ChatMessage>> {
        let records = sqlx::query_as::<_, MessageRecord>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM chat_messages WHERE session_id = $1 ORDER BY created_at ASC, id ASC"
        ))
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        records.into_iter().map(MessageRecord::to_domain).collect()
    }

    async fn add_message(
        &self,
        session_id: i64,
        sender: Sender,
        message: &str,
    ) -> PortResult<ChatMessage> {
        let record = sqlx::query_as::<_, MessageRecord>(&format!(
            "INSERT INTO chat_messages (session_id, sender, message) VALUES ($1, $2, $3) RETURNING {MESSAGE_COLUMNS}"
        ))
        .bind(session_id)
        .bind(sender.as_str())
        .bind(message)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_db_error(e, &format!("Chat session {session_id} not found")))?;
        record.to_domain()
    }

    async fn list_user_sessions(&self, user_id: i64) -> PortResult<Vec<ChatSessionSummary>> {
        let records = sqlx::query_as::<_, SessionSummaryRecord>(
            "SELECT cs.id, cs.user_id, cs.note_id, cs.created_at, cs.updated_at,
                    n.title AS note_title, n.content AS note_content,
                    COUNT(cm.id) AS message_count
             FROM chat_sessions cs
             JOIN notes n ON n.id = cs.note_id
             LEFT JOIN chat_messages cm ON cm.session_id = cs.id
             WHERE cs.user_id = $1
             GROUP BY cs.id, n.id
             ORDER BY cs.updated_at DESC, cs.id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(SessionSummaryRecord::to_domain).collect())
    }

    async fn delete_session(
        &self,
        session_id: i64,
        user_id: i64,
    ) -> PortResult<Option<ChatSession>> {
        let record = sqlx::query_as::<_, SessionRecord>(&format!(
            "DELETE FROM chat_sessions WHERE id = $1 AND user_id = $2 RETURNING {SESSION_COLUMNS}"
        ))
        .bind(session_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(SessionRecord::to_domain))
    }
}

#[async_trait]
impl HealthCheck for DbAdapter {
    async fn ping(&self) -> PortResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }
}
