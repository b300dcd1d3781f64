use super::AppError;
use crate::db::models::{Scribble, ScribbleNote};
use crate::AppState;

pub fn list_scribbles(state: &AppState, query: Option<&str>) -> Vec<Scribble> {
    match query {
        Some(q) => state.scribbles.search(q),
        None => state.scribbles.subjects(),
    }
}

pub fn add_scribble(state: &AppState, name: &str) -> Result<Scribble, AppError> {
    Ok(state.scribbles.add_subject(name)?)
}

pub fn rename_scribble(state: &AppState, id: &str, name: &str) -> Result<(), AppError> {
    Ok(state.scribbles.rename_subject(id, name)?)
}

pub fn delete_scribble(state: &AppState, id: &str) -> Result<(), AppError> {
    Ok(state.scribbles.delete_subject(id)?)
}

pub fn add_text_note(state: &AppState, subject_id: &str, content: &str) -> Result<ScribbleNote, AppError> {
    Ok(state.scribbles.add_text_note(subject_id, content)?)
}

pub fn add_link_note(state: &AppState, subject_id: &str, url: &str) -> Result<ScribbleNote, AppError> {
    Ok(state.scribbles.add_link_note(subject_id, url)?)
}

pub fn update_note(
    state: &AppState,
    subject_id: &str,
    note_id: &str,
    body: &str,
) -> Result<(), AppError> {
    Ok(state.scribbles.update_note(subject_id, note_id, body)?)
}

pub fn delete_note(state: &AppState, subject_id: &str, note_id: &str) -> Result<(), AppError> {
    Ok(state.scribbles.delete_note(subject_id, note_id)?)
}
