//! Scratchpad notes. Notes are shared by every signed-in user.

use crate::models::{Note, NotePatch, NoteType};
use crate::storage::{Query, Storage, find, insert, load, remove, replace};
use crate::{Error, Result};
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NewNote {
    #[serde(rename = "type")]
    pub note_type: NoteType,
    pub label: Option<String>,
    pub content: String,
    pub pinned: bool,
    pub hidden: bool,
}

fn check(note: &Note) -> Result<()> {
    let has_label = note.label.as_deref().is_some_and(|l| !l.trim().is_empty());
    if note.note_type == NoteType::Kv && !has_label {
        return Err(Error::Validation("Key/value notes need a label".to_string()));
    }
    Ok(())
}

/// Pinned notes first, then newest first.
pub fn list_notes(storage: &Storage) -> Result<Vec<Note>> {
    let mut notes: Vec<Note> = storage.read(|conn| find(conn, &Query::new().newest_first()))?;
    notes.sort_by_key(|note| !note.pinned);
    Ok(notes)
}

pub fn create_note(storage: &mut Storage, input: NewNote) -> Result<Note> {
    let mut note = Note::new(input.note_type, input.label, input.content);
    note.pinned = input.pinned;
    note.hidden = input.hidden;
    check(&note)?;

    storage.write(|tx| insert(tx, &note))?;
    info!(id = %note.id, "Created note");
    Ok(note)
}

pub fn update_note(storage: &mut Storage, id: &str, patch: NotePatch) -> Result<Note> {
    storage.write(|tx| {
        let mut note: Note = load(tx, id)?;
        patch.apply(&mut note);
        check(&note)?;
        replace(tx, &note)?;
        Ok(note)
    })
}

pub fn delete_note(storage: &mut Storage, id: &str) -> Result<()> {
    let removed = storage.write(|tx| remove::<Note>(tx, id))?;
    if !removed {
        return Err(Error::NotFound("Note not found".to_string()));
    }
    Ok(())
}
