//! crates/notatnik_core/src/notes.rs
//!
//! Note CRUD and search. Every operation is scoped to the calling user; a note
//! owned by someone else is reported exactly like a note that does not exist.

use std::sync::Arc;
use tracing::debug;

use crate::domain::{Note, MAX_TITLE_LEN};
use crate::error::{require_non_blank, ServiceError, ServiceResult};
use crate::ports::NoteRepository;

pub const NOTE_NOT_FOUND: &str = "Note not found";

#[derive(Clone)]
pub struct NotesService {
    notes: Arc<dyn NoteRepository>,
}

impl NotesService {
    pub fn new(notes: Arc<dyn NoteRepository>) -> Self {
        Self { notes }
    }

    pub async fn list(&self, user_id: i64) -> ServiceResult<Vec<Note>> {
        Ok(self.notes.list_notes(user_id).await?)
    }

    pub async fn get(&self, note_id: i64, user_id: i64) -> ServiceResult<Note> {
        self.notes
            .get_note(note_id, user_id)
            .await?
            .ok_or_else(not_found)
    }

    pub async fn create(&self, title: &str, content: &str, user_id: i64) -> ServiceResult<Note> {
        let (title, content) = validate(title, content)?;
        let note = self.notes.create_note(title, content, user_id).await?;
        debug!(note_id = note.id, user_id, "note created");
        Ok(note)
    }

    pub async fn update(
        &self,
        note_id: i64,
        title: &str,
        content: &str,
        user_id: i64,
    ) -> ServiceResult<Note> {
        let (title, content) = validate(title, content)?;
        self.notes
            .update_note(note_id, title, content, user_id)
            .await?
            .ok_or_else(not_found)
    }

    pub async fn delete(&self, note_id: i64, user_id: i64) -> ServiceResult<Note> {
        let note = self
            .notes
            .delete_note(note_id, user_id)
            .await?
            .ok_or_else(not_found)?;
        debug!(note_id, user_id, "note deleted");
        Ok(note)
    }

    pub async fn search(&self, query: &str, user_id: i64) -> ServiceResult<Vec<Note>> {
        let query = require_non_blank(query, "Search query is required")?;
        Ok(self.notes.search_notes(query, user_id).await?)
    }
}

fn validate<'a>(title: &'a str, content: &'a str) -> ServiceResult<(&'a str, &'a str)> {
    let title = require_non_blank(title, "Title and content are required")?;
    let content = require_non_blank(content, "Title and content are required")?;
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(ServiceError::Validation(format!(
            "Title must be at most {MAX_TITLE_LEN} characters long"
        )));
    }
    Ok((title, content))
}

fn not_found() -> ServiceError {
    ServiceError::NotFound(NOTE_NOT_FOUND.to_string())
}
