use crate::db::models::{Scribble, ScribbleNote};
use crate::db::{KeyValueStore, StoreError, SCRIBBLES_KEY};
use crate::store::PersistedValue;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum ScribbleError {
    #[error("subject name must not be empty")]
    EmptyName,
    #[error("a link note needs a URL")]
    EmptyUrl,
    #[error("scribble subject not found: {0}")]
    UnknownSubject(String),
    #[error("note {note_id} not found in subject {subject_id}")]
    UnknownNote { subject_id: String, note_id: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

fn text(id: &str, content: &str) -> ScribbleNote {
    ScribbleNote::Text {
        id: id.into(),
        content: content.into(),
    }
}

pub fn default_scribbles() -> Vec<Scribble> {
    let subject = |id: &str, name: &str, notes: Vec<ScribbleNote>| Scribble {
        id: id.into(),
        name: name.into(),
        notes,
    };
    vec![
        subject(
            "1",
            "Physics",
            vec![
                text("p1", "E = mc²"),
                text("p2", "V = I × R"),
                text("p3", "Rt = R1 + R2 + R3"),
            ],
        ),
        subject("2", "Math", vec![text("m1", "a² + b² = c²")]),
        subject("3", "Geography", Vec::new()),
        subject("4", "English", Vec::new()),
    ]
}

/// Quick Scribble: named subjects holding short text and link notes.
pub struct Scribbles {
    subjects: PersistedValue<Vec<Scribble>>,
}

impl Scribbles {
    pub fn open(backend: Arc<dyn KeyValueStore>) -> Self {
        Self {
            subjects: PersistedValue::new(backend, SCRIBBLES_KEY, default_scribbles()),
        }
    }

    pub fn subjects(&self) -> Vec<Scribble> {
        self.subjects.read()
    }

    pub fn subject(&self, id: &str) -> Option<Scribble> {
        self.subjects
            .with(|all| all.iter().find(|s| s.id == id).cloned())
    }

    /// Matches subject names and note bodies, ignoring case. An empty query
    /// returns everything.
    pub fn search(&self, query: &str) -> Vec<Scribble> {
        let query = query.to_lowercase();
        self.subjects.with(|all| {
            all.iter()
                .filter(|s| {
                    s.name.to_lowercase().contains(&query)
                        || s.notes
                            .iter()
                            .any(|n| n.body().to_lowercase().contains(&query))
                })
                .cloned()
                .collect()
        })
    }

    pub fn add_subject(&self, name: &str) -> Result<Scribble, ScribbleError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ScribbleError::EmptyName);
        }
        let subject = Scribble {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            notes: Vec::new(),
        };
        self.subjects.update(|all| all.push(subject.clone()))?;
        Ok(subject)
    }

    pub fn rename_subject(&self, id: &str, name: &str) -> Result<(), ScribbleError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ScribbleError::EmptyName);
        }
        self.subjects.try_update(|all| {
            find_mut(all, id)?.name = name.to_string();
            Ok(())
        })
    }

    pub fn delete_subject(&self, id: &str) -> Result<(), ScribbleError> {
        self.subjects.try_update(|all| {
            let before = all.len();
            all.retain(|s| s.id != id);
            if all.len() == before {
                return Err(ScribbleError::UnknownSubject(id.to_string()));
            }
            Ok(())
        })
    }

    /// Text notes may start out empty and be filled in later.
    pub fn add_text_note(&self, subject_id: &str, content: &str) -> Result<ScribbleNote, ScribbleError> {
        self.push_note(
            subject_id,
            ScribbleNote::Text {
                id: Uuid::new_v4().to_string(),
                content: content.to_string(),
            },
        )
    }

    pub fn add_link_note(&self, subject_id: &str, url: &str) -> Result<ScribbleNote, ScribbleError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(ScribbleError::EmptyUrl);
        }
        self.push_note(
            subject_id,
            ScribbleNote::Link {
                id: Uuid::new_v4().to_string(),
                url: url.to_string(),
            },
        )
    }

    /// Replaces a text note's content or a link note's URL.
    pub fn update_note(
        &self,
        subject_id: &str,
        note_id: &str,
        body: &str,
    ) -> Result<(), ScribbleError> {
        self.subjects.try_update(|all| {
            let note = find_mut(all, subject_id)?
                .notes
                .iter_mut()
                .find(|n| n.id() == note_id)
                .ok_or_else(|| ScribbleError::UnknownNote {
                    subject_id: subject_id.to_string(),
                    note_id: note_id.to_string(),
                })?;
            match note {
                ScribbleNote::Text { content, .. } => *content = body.to_string(),
                ScribbleNote::Link { url, .. } => {
                    if body.trim().is_empty() {
                        return Err(ScribbleError::EmptyUrl);
                    }
                    *url = body.trim().to_string();
                }
            }
            Ok(())
        })
    }

    pub fn delete_note(&self, subject_id: &str, note_id: &str) -> Result<(), ScribbleError> {
        self.subjects.try_update(|all| {
            let subject = find_mut(all, subject_id)?;
            let before = subject.notes.len();
            subject.notes.retain(|n| n.id() != note_id);
            if subject.notes.len() == before {
                return Err(ScribbleError::UnknownNote {
                    subject_id: subject_id.to_string(),
                    note_id: note_id.to_string(),
                });
            }
            Ok(())
        })
    }

    fn push_note(&self, subject_id: &str, note: ScribbleNote) -> Result<ScribbleNote, ScribbleError> {
        self.subjects.try_update(|all| {
            find_mut(all, subject_id)?.notes.push(note.clone());
            Ok(note)
        })
    }
}

fn find_mut<'a>(all: &'a mut [Scribble], id: &str) -> Result<&'a mut Scribble, ScribbleError> {
    all.iter_mut()
        .find(|s| s.id == id)
        .ok_or_else(|| ScribbleError::UnknownSubject(id.to_string()))
}
