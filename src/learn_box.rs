use crate::db::models::{ContentItem, ContentSection};
use crate::db::{KeyValueStore, StoreError, SECTIONS_KEY};
use crate::llm::Generator;
use crate::mind_map::MindMapService;
use crate::store::PersistedValue;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum LearnBoxError {
    #[error("section title must not be empty")]
    EmptyTitle,
    #[error("section not found: {0}")]
    UnknownSection(String),
    #[error("item {item_id} not found in section {section_id}")]
    UnknownItem { section_id: String, item_id: String },
    #[error("item {0} is not a text note")]
    NotEditable(String),
    #[error("a mind map is already being generated for section {0}")]
    Busy(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Content for a new section item; the store assigns its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NewItem {
    Text(String),
    Link(String),
    File { name: String, url: String },
    Video(String),
    Image(String),
}

impl NewItem {
    /// Uploaded files become image or video items by MIME prefix, otherwise plain files.
    pub fn upload(name: impl Into<String>, mime_type: &str, url: impl Into<String>) -> Self {
        let url = url.into();
        if mime_type.starts_with("image/") {
            NewItem::Image(url)
        } else if mime_type.starts_with("video/") {
            NewItem::Video(url)
        } else {
            NewItem::File {
                name: name.into(),
                url,
            }
        }
    }

    fn into_item(self, id: String) -> ContentItem {
        match self {
            NewItem::Text(content) => ContentItem::Text { id, content },
            NewItem::Link(url) => ContentItem::Link { id, url },
            NewItem::File { name, url } => ContentItem::File { id, name, url },
            NewItem::Video(url) => ContentItem::Video { id, url },
            NewItem::Image(url) => ContentItem::Image { id, url },
        }
    }
}

pub fn default_sections() -> Vec<ContentSection> {
    vec![
        ContentSection {
            id: "1".into(),
            title: "Physics".into(),
            items: vec![
                ContentItem::Text {
                    id: "c1".into(),
                    content: "- E = mc²\n- V = I × R".into(),
                },
                ContentItem::Link {
                    id: "c2".into(),
                    url: "https://youtu.be/Aq5WXmQQooo".into(),
                },
            ],
            mind_map: String::new(),
        },
        ContentSection {
            id: "2".into(),
            title: "Math".into(),
            items: Vec::new(),
            mind_map: String::new(),
        },
    ]
}

/// Study-note sections and their generated mind maps.
pub struct LearnBox {
    sections: PersistedValue<Vec<ContentSection>>,
    generating: Mutex<HashSet<String>>,
}

impl LearnBox {
    pub fn open(backend: Arc<dyn KeyValueStore>) -> Self {
        Self {
            sections: PersistedValue::new(backend, SECTIONS_KEY, default_sections()),
            generating: Mutex::new(HashSet::new()),
        }
    }

    pub fn sections(&self) -> Vec<ContentSection> {
        self.sections.read()
    }

    pub fn section(&self, id: &str) -> Option<ContentSection> {
        self.sections
            .with(|all| all.iter().find(|s| s.id == id).cloned())
    }

    /// Case-insensitive title filter; an empty query matches everything.
    pub fn search(&self, query: &str) -> Vec<ContentSection> {
        let query = query.to_lowercase();
        self.sections.with(|all| {
            all.iter()
                .filter(|s| s.title.to_lowercase().contains(&query))
                .cloned()
                .collect()
        })
    }

    pub fn add_section(&self, title: &str) -> Result<ContentSection, LearnBoxError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(LearnBoxError::EmptyTitle);
        }
        let section = ContentSection {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            items: Vec::new(),
            mind_map: String::new(),
        };
        self.sections.update(|all| all.push(section.clone()))?;
        Ok(section)
    }

    pub fn add_item(&self, section_id: &str, item: NewItem) -> Result<ContentItem, LearnBoxError> {
        let item = item.into_item(Uuid::new_v4().to_string());
        self.sections.try_update(|all| {
            find_mut(all, section_id)?.items.push(item.clone());
            Ok(item)
        })
    }

    /// Only text notes are edited in place.
    pub fn update_text(
        &self,
        section_id: &str,
        item_id: &str,
        text: &str,
    ) -> Result<(), LearnBoxError> {
        self.sections.try_update(|all| {
            let section = find_mut(all, section_id)?;
            let item = section
                .items
                .iter_mut()
                .find(|i| i.id() == item_id)
                .ok_or_else(|| LearnBoxError::UnknownItem {
                    section_id: section_id.to_string(),
                    item_id: item_id.to_string(),
                })?;
            match item {
                ContentItem::Text { content, .. } => {
                    *content = text.to_string();
                    Ok(())
                }
                _ => Err(LearnBoxError::NotEditable(item_id.to_string())),
            }
        })
    }

    pub fn delete_item(&self, section_id: &str, item_id: &str) -> Result<(), LearnBoxError> {
        self.sections.try_update(|all| {
            let section = find_mut(all, section_id)?;
            let before = section.items.len();
            section.items.retain(|i| i.id() != item_id);
            if section.items.len() == before {
                return Err(LearnBoxError::UnknownItem {
                    section_id: section_id.to_string(),
                    item_id: item_id.to_string(),
                });
            }
            Ok(())
        })
    }

    /// Synthesises a mind map and stores it, replacing any previous one.
    pub async fn generate_mind_map<G: Generator>(
        &self,
        section_id: &str,
        service: &MindMapService<G>,
    ) -> Result<String, LearnBoxError> {
        let section = self
            .section(section_id)
            .ok_or_else(|| LearnBoxError::UnknownSection(section_id.to_string()))?;
        let _busy = BusyGuard::acquire(&self.generating, section_id)?;

        let diagram = service.synthesize(&section).await;
        self.sections.try_update(|all| {
            find_mut(all, section_id)?.mind_map = diagram.clone();
            Ok::<_, LearnBoxError>(())
        })?;
        Ok(diagram)
    }

    pub fn clear_mind_map(&self, section_id: &str) -> Result<(), LearnBoxError> {
        self.sections.try_update(|all| {
            find_mut(all, section_id)?.mind_map.clear();
            Ok(())
        })
    }

    pub fn is_generating(&self, section_id: &str) -> bool {
        self.generating
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(section_id)
    }
}

struct BusyGuard<'a> {
    set: &'a Mutex<HashSet<String>>,
    id: String,
}

impl<'a> BusyGuard<'a> {
    fn acquire(set: &'a Mutex<HashSet<String>>, id: &str) -> Result<Self, LearnBoxError> {
        let mut busy = set.lock().unwrap_or_else(PoisonError::into_inner);
        if !busy.insert(id.to_string()) {
            return Err(LearnBoxError::Busy(id.to_string()));
        }
        Ok(Self {
            set,
            id: id.to_string(),
        })
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}

fn find_mut<'a>(
    all: &'a mut [ContentSection],
    id: &str,
) -> Result<&'a mut ContentSection, LearnBoxError> {
    all.iter_mut()
        .find(|s| s.id == id)
        .ok_or_else(|| LearnBoxError::UnknownSection(id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::llm::{GenerateRequest, GenerateResponse, LlmError};
    use crate::mind_map::ERROR_DIAGRAM;
    use async_trait::async_trait;
    use tokio::sync::Notify;

    fn learn_box() -> LearnBox {
        LearnBox::open(Arc::new(Database::open_in_memory().unwrap()))
    }

    struct Fixed(Result<&'static str, ()>);

    #[async_trait]
    impl Generator for Fixed {
        async fn generate(&self, _: &GenerateRequest) -> Result<GenerateResponse, LlmError> {
            match self.0 {
                Ok(text) => Ok(GenerateResponse {
                    text: text.into(),
                    grounding: vec![],
                }),
                Err(()) => Err(LlmError::Parse("no candidates".into())),
            }
        }
    }

    /// Blocks until released so a synthesis can be observed mid-flight.
    struct Gate(Arc<Notify>);

    #[async_trait]
    impl Generator for Gate {
        async fn generate(&self, _: &GenerateRequest) -> Result<GenerateResponse, LlmError> {
            self.0.notified().await;
            Ok(GenerateResponse {
                text: "flowchart TD\n A-->B".into(),
                grounding: vec![],
            })
        }
    }

    #[test]
    fn starts_with_starter_sections() {
        let titles: Vec<_> = learn_box().sections().into_iter().map(|s| s.title).collect();
        assert_eq!(titles, vec!["Physics", "Math"]);
    }

    #[test]
    fn search_is_case_insensitive() {
        let lb = learn_box();
        lb.add_section("Organic Chemistry").unwrap();
        let hits: Vec<_> = lb.search("CHEM").into_iter().map(|s| s.title).collect();
        assert_eq!(hits, vec!["Organic Chemistry"]);
        assert_eq!(lb.search("").len(), 3);
    }

    #[test]
    fn blank_titles_are_rejected() {
        assert!(matches!(
            learn_box().add_section("   "),
            Err(LearnBoxError::EmptyTitle)
        ));
    }

    #[test]
    fn items_are_added_edited_and_deleted_by_id() {
        let lb = learn_box();
        let note = lb.add_item("2", NewItem::Text("New note...".into())).unwrap();
        let clip = lb
            .add_item("2", NewItem::upload("clip.mp4", "video/mp4", "blob:clip"))
            .unwrap();
        assert!(matches!(clip, ContentItem::Video { .. }));
        assert_ne!(note.id(), clip.id());

        lb.update_text("2", note.id(), "Pythagoras").unwrap();
        assert!(matches!(
            lb.update_text("2", clip.id(), "nope"),
            Err(LearnBoxError::NotEditable(_))
        ));

        lb.delete_item("2", clip.id()).unwrap();
        assert!(matches!(
            lb.delete_item("2", clip.id()),
            Err(LearnBoxError::UnknownItem { .. })
        ));

        let math = lb.section("2").unwrap();
        assert_eq!(
            math.items,
            vec![ContentItem::Text {
                id: note.id().to_string(),
                content: "Pythagoras".into(),
            }]
        );
    }

    #[test]
    fn uploads_are_classified_by_mime_type() {
        assert!(matches!(NewItem::upload("a.png", "image/png", "u"), NewItem::Image(_)));
        assert!(matches!(
            NewItem::upload("a.pdf", "application/pdf", "u"),
            NewItem::File { ref name, .. } if name == "a.pdf"
        ));
    }

    #[tokio::test]
    async fn mind_map_is_stored_then_cleared() {
        let lb = learn_box();
        let service = MindMapService::new(Fixed(Ok("```mermaid\nflowchart TD\n P-->E\n```")));

        let diagram = lb.generate_mind_map("1", &service).await.unwrap();
        assert_eq!(diagram, "flowchart TD\n P-->E");
        assert_eq!(lb.section("1").unwrap().mind_map, diagram);

        lb.clear_mind_map("1").unwrap();
        assert!(lb.section("1").unwrap().mind_map.is_empty());
    }

    #[tokio::test]
    async fn failed_synthesis_still_stores_error_diagram() {
        let lb = learn_box();
        let service = MindMapService::new(Fixed(Err(())));
        lb.generate_mind_map("1", &service).await.unwrap();
        assert_eq!(lb.section("1").unwrap().mind_map, ERROR_DIAGRAM);
    }

    #[tokio::test]
    async fn unknown_section_is_reported() {
        let service = MindMapService::new(Fixed(Ok("flowchart TD")));
        assert!(matches!(
            learn_box().generate_mind_map("nope", &service).await,
            Err(LearnBoxError::UnknownSection(_))
        ));
    }

    #[tokio::test]
    async fn one_synthesis_per_section_at_a_time() {
        let lb = learn_box();
        let gate = Arc::new(Notify::new());
        let slow = MindMapService::new(Gate(gate.clone()));
        let quick = MindMapService::new(Fixed(Ok("flowchart TD\n M")));

        let first = lb.generate_mind_map("1", &slow);
        let contender = async {
            tokio::task::yield_now().await;
            assert!(lb.is_generating("1"));
            let again = lb.generate_mind_map("1", &quick).await;
            assert!(matches!(again, Err(LearnBoxError::Busy(_))));
            // A different section is unaffected.
            lb.generate_mind_map("2", &quick).await.unwrap();
            gate.notify_one();
        };
        let (first, ()) = tokio::join!(first, contender);

        assert_eq!(first.unwrap(), "flowchart TD\n A-->B");
        assert!(!lb.is_generating("1"));
        assert_eq!(lb.section("2").unwrap().mind_map, "flowchart TD\n M");
    }
}
