//! crates/notatnik_core/src/mock.rs
//!
//! In-memory implementations of the persistence ports and a programmable
//! generative model, used by the service and web tests.
//!
//! `MockStore` mirrors the relational schema: usernames, emails and
//! `chat_sessions.note_id` are unique, and deleting a note or session cascades.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, VecDeque};
use tokio::sync::Mutex;

use crate::domain::{
    ChatMessage, ChatSession, ChatSessionSummary, Note, Sender, User, UserCredentials,
};
use crate::ports::{
    ChatRepository, GenerativeModel, HealthCheck, ModelInfo, NoteRepository, PortError,
    PortResult, ProviderError, UserRepository,
};

//=========================================================================================
// MockStore
//=========================================================================================

#[derive(Default)]
struct Tables {
    next_id: i64,
    clock: Option<DateTime<Utc>>,
    users: Vec<UserCredentials>,
    notes: Vec<Note>,
    sessions: Vec<ChatSession>,
    messages: Vec<ChatMessage>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    /// Strictly increasing timestamps so ordering by time is deterministic.
    fn now(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let stamp = match self.clock {
            Some(last) if now <= last => last + Duration::milliseconds(1),
            _ => now,
        };
        self.clock = Some(stamp);
        stamp
    }
}

/// In-memory store implementing every persistence port.
#[derive(Default)]
pub struct MockStore {
    tables: Mutex<Tables>,
    offline: Mutex<bool>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `ping` fail, simulating an unreachable database.
    pub async fn set_offline(&self, offline: bool) {
        *self.offline.lock().await = offline;
    }
}

fn newest_first(notes: &mut [Note]) {
    notes.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

#[async_trait]
impl UserRepository for MockStore {
    async fn create_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> PortResult<User> {
        let mut tables = self.tables.lock().await;
        if tables
            .users
            .iter()
            .any(|c| c.user.username == username || c.user.email == email)
        {
            return Err(PortError::Conflict(format!(
                "user '{username}' or email '{email}' already exists"
            )));
        }
        let id = tables.next_id();
        let now = tables.now();
        let user = User {
            id,
            username: username.to_string(),
            email: email.to_string(),
            created_at: now,
            updated_at: now,
        };
        tables.users.push(UserCredentials {
            user: user.clone(),
            password_hash: password_hash.to_string(),
        });
        Ok(user)
    }

    async fn user_exists(&self, username: &str, email: &str) -> PortResult<bool> {
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .iter()
            .any(|c| c.user.username == username || c.user.email == email))
    }

    async fn get_credentials_by_username(
        &self,
        username: &str,
    ) -> PortResult<Option<UserCredentials>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .iter()
            .find(|c| c.user.username == username)
            .cloned())
    }

    async fn get_user_by_id(&self, user_id: i64) -> PortResult<Option<User>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .iter()
            .find(|c| c.user.id == user_id)
            .map(|c| c.user.clone()))
    }
}

#[async_trait]
impl NoteRepository for MockStore {
    async fn list_notes(&self, user_id: i64) -> PortResult<Vec<Note>> {
        let tables = self.tables.lock().await;
        let mut notes: Vec<Note> = tables
            .notes
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect();
        newest_first(&mut notes);
        Ok(notes)
    }

    async fn get_note(&self, note_id: i64, user_id: i64) -> PortResult<Option<Note>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .notes
            .iter()
            .find(|n| n.id == note_id && n.user_id == user_id)
            .cloned())
    }

    async fn create_note(&self, title: &str, content: &str, user_id: i64) -> PortResult<Note> {
        let mut tables = self.tables.lock().await;
        let id = tables.next_id();
        let now = tables.now();
        let note = Note {
            id,
            title: title.to_string(),
            content: content.to_string(),
            user_id,
            created_at: now,
            updated_at: now,
        };
        tables.notes.push(note.clone());
        Ok(note)
    }

    async fn update_note(
        &self,
        note_id: i64,
        title: &str,
        content: &str,
        user_id: i64,
    ) -> PortResult<Option<Note>> {
        let mut tables = self.tables.lock().await;
        let now = tables.now();
        Ok(tables
            .notes
            .iter_mut()
            .find(|n| n.id == note_id && n.user_id == user_id)
            .map(|note| {
                note.title = title.to_string();
                note.content = content.to_string();
                note.updated_at = now;
                note.clone()
            }))
    }

    async fn delete_note(&self, note_id: i64, user_id: i64) -> PortResult<Option<Note>> {
        let mut tables = self.tables.lock().await;
        let Some(pos) = tables
            .notes
            .iter()
            .position(|n| n.id == note_id && n.user_id == user_id)
        else {
            return Ok(None);
        };
        let note = tables.notes.remove(pos);
        let dropped: Vec<i64> = tables
            .sessions
            .iter()
            .filter(|s| s.note_id == note.id)
            .map(|s| s.id)
            .collect();
        tables.sessions.retain(|s| s.note_id != note.id);
        tables.messages.retain(|m| !dropped.contains(&m.session_id));
        Ok(Some(note))
    }

    async fn search_notes(&self, query: &str, user_id: i64) -> PortResult<Vec<Note>> {
        let needle = query.to_lowercase();
        let tables = self.tables.lock().await;
        let mut notes: Vec<Note> = tables
            .notes
            .iter()
            .filter(|n| n.user_id == user_id)
            .filter(|n| {
                n.title.to_lowercase().contains(&needle)
                    || n.content.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect();
        newest_first(&mut notes);
        Ok(notes)
    }
}

#[async_trait]
impl ChatRepository for MockStore {
    async fn find_session_by_note(
        &self,
        note_id: i64,
        user_id: i64,
    ) -> PortResult<Option<ChatSession>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .sessions
            .iter()
            .find(|s| s.note_id == note_id && s.user_id == user_id)
            .cloned())
    }

    async fn find_session(&self, session_id: i64, user_id: i64) -> PortResult<Option<ChatSession>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .sessions
            .iter()
            .find(|s| s.id == session_id && s.user_id == user_id)
            .cloned())
    }

    async fn create_session(&self, note_id: i64, user_id: i64) -> PortResult<ChatSession> {
        let mut tables = self.tables.lock().await;
        if tables.sessions.iter().any(|s| s.note_id == note_id) {
            return Err(PortError::Conflict(format!(
                "a chat session for note {note_id} already exists"
            )));
        }
        if !tables.notes.iter().any(|n| n.id == note_id) {
            return Err(PortError::NotFound(format!("Note {note_id} not found")));
        }
        let id = tables.next_id();
        let now = tables.now();
        let session = ChatSession {
            id,
            user_id,
            note_id,
            created_at: now,
            updated_at: now,
        };
        tables.sessions.push(session.clone());
        Ok(session)
    }

    async fn touch_session(&self, session_id: i64) -> PortResult<ChatSession> {
        let mut tables = self.tables.lock().await;
        let now = tables.now();
        tables
            .sessions
            .iter_mut()
            .find(|s| s.id == session_id)
            .map(|session| {
                session.updated_at = now;
                session.clone()
            })
            .ok_or_else(|| PortError::NotFound(format!("Chat session {session_id} not found")))
    }

    async fn list_messages(&self, session_id: i64) -> PortResult<Vec<ChatMessage>> {
        let tables = self.tables.lock().await;
        let mut messages: Vec<ChatMessage> = tables
            .messages
            .iter()
            .filter(|m| m.session_id == session_id)
            .cloned()
            .collect();
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(messages)
    }

    async fn add_message(
        &self,
        session_id: i64,
        sender: Sender,
        message: &str,
    ) -> PortResult<ChatMessage> {
        let mut tables = self.tables.lock().await;
        if !tables.sessions.iter().any(|s| s.id == session_id) {
            return Err(PortError::NotFound(format!(
                "Chat session {session_id} not found"
            )));
        }
        let id = tables.next_id();
        let now = tables.now();
        let message = ChatMessage {
            id,
            session_id,
            sender,
            message: message.to_string(),
            created_at: now,
        };
        tables.messages.push(message.clone());
        Ok(message)
    }

    async fn list_user_sessions(&self, user_id: i64) -> PortResult<Vec<ChatSessionSummary>> {
        let tables = self.tables.lock().await;
        let mut summaries: Vec<ChatSessionSummary> = tables
            .sessions
            .iter()
            .filter(|s| s.user_id == user_id)
            .filter_map(|session| {
                let note = tables.notes.iter().find(|n| n.id == session.note_id)?;
                let message_count = tables
                    .messages
                    .iter()
                    .filter(|m| m.session_id == session.id)
                    .count() as i64;
                Some(ChatSessionSummary {
                    session: session.clone(),
                    note_title: note.title.clone(),
                    note_content: note.content.clone(),
                    message_count,
                })
            })
            .collect();
        summaries.sort_by(|a, b| {
            b.session
                .updated_at
                .cmp(&a.session.updated_at)
                .then(b.session.id.cmp(&a.session.id))
        });
        Ok(summaries)
    }

    async fn delete_session(
        &self,
        session_id: i64,
        user_id: i64,
    ) -> PortResult<Option<ChatSession>> {
        let mut tables = self.tables.lock().await;
        let Some(pos) = tables
            .sessions
            .iter()
            .position(|s| s.id == session_id && s.user_id == user_id)
        else {
            return Ok(None);
        };
        let session = tables.sessions.remove(pos);
        tables.messages.retain(|m| m.session_id != session.id);
        Ok(Some(session))
    }
}

#[async_trait]
impl HealthCheck for MockStore {
    async fn ping(&self) -> PortResult<()> {
        if *self.offline.lock().await {
            return Err(PortError::Unexpected("store is offline".to_string()));
        }
        Ok(())
    }
}

//=========================================================================================
// ScriptedModel
//=========================================================================================

#[derive(Default)]
struct Script {
    broken: HashMap<String, ProviderError>,
    one_shot: HashMap<String, VecDeque<ProviderError>>,
    rejected_prompts: HashMap<String, ProviderError>,
    calls: Vec<(String, String)>,
    catalog: Vec<ModelInfo>,
    listing_error: Option<ProviderError>,
}

/// A programmable `GenerativeModel`.
///
/// Every model answers `"<model> says: ok"` unless it has been broken, either
/// permanently (`break_model`), for its next call only (`fail_next`), or for a
/// specific prompt (`reject_prompt`). `list_models` reports whatever was
/// passed to `set_catalog`, which starts empty.
#[derive(Default)]
pub struct ScriptedModel {
    script: Mutex<Script>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn break_model(&self, model: &str, error: ProviderError) {
        self.script
            .lock()
            .await
            .broken
            .insert(model.to_string(), error);
    }

    pub async fn repair_model(&self, model: &str) {
        self.script.lock().await.broken.remove(model);
    }

    pub async fn fail_next(&self, model: &str, error: ProviderError) {
        self.script
            .lock()
            .await
            .one_shot
            .entry(model.to_string())
            .or_default()
            .push_back(error);
    }

    /// Fails every call carrying exactly `prompt`, whatever the model.
    pub async fn reject_prompt(&self, prompt: &str, error: ProviderError) {
        self.script
            .lock()
            .await
            .rejected_prompts
            .insert(prompt.to_string(), error);
    }

    /// Every `(model, prompt)` pair received so far, in call order.
    pub async fn calls(&self) -> Vec<(String, String)> {
        self.script.lock().await.calls.clone()
    }

    /// Models reported by `list_models`, each supporting `generateContent`.
    pub async fn set_catalog(&self, names: &[&str]) {
        self.script.lock().await.catalog = names
            .iter()
            .map(|name| ModelInfo {
                name: name.to_string(),
                methods: vec!["generateContent".to_string()],
            })
            .collect();
    }

    pub async fn fail_listing(&self, error: ProviderError) {
        self.script.lock().await.listing_error = Some(error);
    }

    pub async fn models_called(&self) -> Vec<String> {
        self.calls().await.into_iter().map(|(model, _)| model).collect()
    }
}

#[async_trait]
impl GenerativeModel for ScriptedModel {
    async fn generate(&self, model: &str, prompt: &str) -> Result<String, ProviderError> {
        let mut script = self.script.lock().await;
        script.calls.push((model.to_string(), prompt.to_string()));
        if let Some(error) = script.one_shot.get_mut(model).and_then(|q| q.pop_front()) {
            return Err(error);
        }
        if let Some(error) = script.rejected_prompts.get(prompt) {
            return Err(error.clone());
        }
        if let Some(error) = script.broken.get(model) {
            return Err(error.clone());
        }
        Ok(format!("{model} says: ok"))
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, ProviderError> {
        let script = self.script.lock().await;
        match &script.listing_error {
            Some(error) => Err(error.clone()),
            None => Ok(script.catalog.clone()),
        }
    }
}
