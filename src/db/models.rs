use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    #[serde(rename = "user")]
    User,
    #[serde(rename = "ai")]
    Assistant,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
}

/// Inline media attached to a message: base64 payload plus its MIME type.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MediaRef {
    #[serde(rename = "type")]
    pub kind: MediaKind,
    pub inline_data: String,
    pub mime_type: String,
}

impl MediaRef {
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.inline_data)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct Citation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl Citation {
    pub fn label(&self) -> &str {
        self.title
            .as_deref()
            .or(self.uri.as_deref())
            .unwrap_or("Untitled source")
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Message {
    pub sender: Sender,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<MediaRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<Citation>>,
}

impl Message {
    pub fn user(text: impl Into<String>, media: Option<MediaRef>) -> Self {
        Self {
            sender: Sender::User,
            text: text.into(),
            media,
            sources: None,
        }
    }

    pub fn assistant(text: impl Into<String>, sources: Option<Vec<Citation>>) -> Self {
        Self {
            sender: Sender::Assistant,
            text: text.into(),
            media: None,
            sources,
        }
    }

    /// A turn must carry non-blank text or an attachment.
    pub fn has_content(&self) -> bool {
        !self.text.trim().is_empty() || self.media.is_some()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub start_time: DateTime<Utc>,
    pub messages: Vec<Message>,
}

impl Conversation {
    /// Short label for history listings: the first user turn, else the greeting.
    pub fn title(&self) -> &str {
        self.messages
            .get(1)
            .filter(|m| !m.text.is_empty())
            .or_else(|| self.messages.first())
            .map(|m| m.text.as_str())
            .unwrap_or_default()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentItem {
    Text { id: String, content: String },
    Link { id: String, url: String },
    File { id: String, name: String, url: String },
    Video { id: String, url: String },
    Image { id: String, url: String },
}

impl ContentItem {
    pub fn id(&self) -> &str {
        match self {
            ContentItem::Text { id, .. }
            | ContentItem::Link { id, .. }
            | ContentItem::File { id, .. }
            | ContentItem::Video { id, .. }
            | ContentItem::Image { id, .. } => id,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ContentSection {
    pub id: String,
    pub title: String,
    #[serde(rename = "content")]
    pub items: Vec<ContentItem>,
    #[serde(default)]
    pub mind_map: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: String,
    pub text: String,
    pub completed: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Subject {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DayOfWeek {
    Sunday,
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

impl DayOfWeek {
    pub const ALL: [DayOfWeek; 7] = [
        DayOfWeek::Sunday,
        DayOfWeek::Monday,
        DayOfWeek::Tuesday,
        DayOfWeek::Wednesday,
        DayOfWeek::Thursday,
        DayOfWeek::Friday,
        DayOfWeek::Saturday,
    ];

    pub fn name(self) -> &'static str {
        match self {
            DayOfWeek::Sunday => "Sunday",
            DayOfWeek::Monday => "Monday",
            DayOfWeek::Tuesday => "Tuesday",
            DayOfWeek::Wednesday => "Wednesday",
            DayOfWeek::Thursday => "Thursday",
            DayOfWeek::Friday => "Friday",
            DayOfWeek::Saturday => "Saturday",
        }
    }

    /// Case-insensitive; accepts full names and three-letter abbreviations.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().to_lowercase();
        Self::ALL.into_iter().find(|day| {
            let full = day.name().to_lowercase();
            name == full || (name.len() == 3 && full.starts_with(&name))
        })
    }
}

/// Subjects studied on each day of the week. Every day is always present.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(transparent)]
pub struct WeeklySchedule {
    days: BTreeMap<DayOfWeek, Vec<Subject>>,
}

impl Default for WeeklySchedule {
    fn default() -> Self {
        Self {
            days: DayOfWeek::ALL.into_iter().map(|d| (d, Vec::new())).collect(),
        }
    }
}

impl WeeklySchedule {
    pub fn subjects(&self, day: DayOfWeek) -> &[Subject] {
        self.days.get(&day).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn subjects_mut(&mut self, day: DayOfWeek) -> &mut Vec<Subject> {
        self.days.entry(day).or_default()
    }

    /// Sunday through Saturday.
    pub fn iter(&self) -> impl Iterator<Item = (DayOfWeek, &[Subject])> + '_ {
        DayOfWeek::ALL.into_iter().map(|day| (day, self.subjects(day)))
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ScribbleNote {
    Text { id: String, content: String },
    Link { id: String, url: String },
}

impl ScribbleNote {
    pub fn id(&self) -> &str {
        match self {
            ScribbleNote::Text { id, .. } | ScribbleNote::Link { id, .. } => id,
        }
    }

    /// The note's text or URL.
    pub fn body(&self) -> &str {
        match self {
            ScribbleNote::Text { content, .. } => content,
            ScribbleNote::Link { url, .. } => url,
        }
    }
}

/// A named scribble subject holding quick notes.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Scribble {
    pub id: String,
    pub name: String,
    pub notes: Vec<ScribbleNote>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_uses_stored_sender_names() {
        let json = serde_json::to_value(Message::assistant("hi", None)).unwrap();
        assert_eq!(json["sender"], "ai");
        assert!(json.get("media").is_none());
        assert!(json.get("sources").is_none());
    }

    #[test]
    fn content_item_is_tagged_by_type() {
        let item: ContentItem =
            serde_json::from_str(r#"{"type":"file","id":"f1","name":"notes.pdf","url":"blob:x"}"#)
                .unwrap();
        assert_eq!(item.id(), "f1");
        assert!(matches!(item, ContentItem::File { ref name, .. } if name == "notes.pdf"));
    }

    #[test]
    fn section_without_mind_map_defaults_to_empty() {
        let section: ContentSection =
            serde_json::from_str(r#"{"id":"2","title":"Math","content":[]}"#).unwrap();
        assert!(section.mind_map.is_empty());
    }

    #[test]
    fn citation_label_falls_back() {
        let titled = Citation {
            uri: Some("https://a".into()),
            title: Some("A".into()),
        };
        let linked = Citation {
            uri: Some("https://b".into()),
            title: None,
        };
        assert_eq!(titled.label(), "A");
        assert_eq!(linked.label(), "https://b");
        assert_eq!(Citation::default().label(), "Untitled source");
    }

    #[test]
    fn conversation_title_prefers_first_user_turn() {
        let mut conv = Conversation {
            id: "c".into(),
            start_time: Utc::now(),
            messages: vec![Message::assistant("Welcome", None)],
        };
        assert_eq!(conv.title(), "Welcome");
        conv.messages.push(Message::user("What is entropy?", None));
        assert_eq!(conv.title(), "What is entropy?");
    }

    #[test]
    fn media_only_first_turn_falls_back_to_greeting() {
        let photo = MediaRef {
            kind: MediaKind::Image,
            inline_data: "cG5nIQ==".into(),
            mime_type: "image/png".into(),
        };
        let conv = Conversation {
            id: "c".into(),
            start_time: Utc::now(),
            messages: vec![
                Message::assistant("Welcome", None),
                Message::user("", Some(photo)),
            ],
        };
        assert_eq!(conv.title(), "Welcome");
    }

    #[test]
    fn schedule_serialises_as_day_keyed_object() {
        let mut schedule = WeeklySchedule::default();
        schedule.subjects_mut(DayOfWeek::Monday).push(Subject {
            id: "s1".into(),
            name: "Physics".into(),
        });
        let json = serde_json::to_value(&schedule).unwrap();
        assert_eq!(json["Monday"][0]["name"], "Physics");
        assert_eq!(json["Sunday"], serde_json::json!([]));
        assert_eq!(json.as_object().unwrap().len(), 7);

        let partial: WeeklySchedule = serde_json::from_str(r#"{"Friday":[]}"#).unwrap();
        assert!(partial.subjects(DayOfWeek::Tuesday).is_empty());
        assert_eq!(partial.iter().count(), 7);
    }

    #[test]
    fn day_names_parse_loosely() {
        assert_eq!(DayOfWeek::from_name("monday"), Some(DayOfWeek::Monday));
        assert_eq!(DayOfWeek::from_name(" Sat "), Some(DayOfWeek::Saturday));
        assert_eq!(DayOfWeek::from_name("th"), None);
        assert_eq!(DayOfWeek::from_name("someday"), None);
    }

    #[test]
    fn scribble_note_is_tagged_by_type() {
        let note: ScribbleNote =
            serde_json::from_str(r#"{"type":"link","id":"l1","url":"https://khanacademy.org"}"#)
                .unwrap();
        assert_eq!(note.id(), "l1");
        assert_eq!(note.body(), "https://khanacademy.org");
        assert!(serde_json::from_str::<ScribbleNote>(r#"{"type":"video","id":"v","url":"x"}"#).is_err());
    }
}
