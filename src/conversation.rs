use crate::db::models::{Citation, Conversation, MediaRef, Message, Sender};
use crate::db::{KeyValueStore, StoreError, CONVERSATIONS_KEY};
use crate::media::MediaError;
use crate::store::PersistedValue;
use chrono::Utc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use uuid::Uuid;

pub const WELCOME_MESSAGE: &str =
    "Learning Pal at your humble service, my friend. How can I help you today?";

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("a message needs text or an attachment")]
    Validation,
    #[error("conversation not found: {0}")]
    UnknownConversation(String),
    #[error("a reply is still pending for conversation {0}")]
    TurnInFlight(String),
    #[error(transparent)]
    Media(#[from] MediaError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Snapshot of all threads, most recently started first.
#[derive(Debug, Clone)]
pub struct ConversationList {
    items: Vec<Conversation>,
}

impl ConversationList {
    fn newest_first(conversations: &[Conversation]) -> Self {
        // Reverse before the stable sort so equal start times keep the later thread first.
        let mut items: Vec<Conversation> = conversations.iter().rev().cloned().collect();
        items.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Self { items }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Conversation> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<'a> IntoIterator for &'a ConversationList {
    type Item = &'a Conversation;
    type IntoIter = std::slice::Iter<'a, Conversation>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl IntoIterator for ConversationList {
    type Item = Conversation;
    type IntoIter = std::vec::IntoIter<Conversation>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

/// Owns every conversation thread and which one is active.
pub struct ConversationManager {
    conversations: PersistedValue<Vec<Conversation>>,
    active: Mutex<Option<String>>,
}

impl ConversationManager {
    /// Hydrates the threads and activates the newest one, seeding a fresh
    /// conversation when the store holds none.
    pub fn open(backend: Arc<dyn KeyValueStore>) -> Result<Self, ChatError> {
        let manager = Self {
            conversations: PersistedValue::new(backend, CONVERSATIONS_KEY, Vec::new()),
            active: Mutex::new(None),
        };

        match manager.newest_id() {
            Some(id) => *manager.active_guard() = Some(id),
            None => {
                manager.new_conversation()?;
            }
        }
        Ok(manager)
    }

    pub fn new_conversation(&self) -> Result<Conversation, ChatError> {
        let conversation = Conversation {
            id: Uuid::now_v7().to_string(),
            start_time: Utc::now(),
            messages: vec![Message::assistant(WELCOME_MESSAGE, None)],
        };
        self.conversations
            .update(|all| all.push(conversation.clone()))?;
        *self.active_guard() = Some(conversation.id.clone());

        tracing::info!(conversation_id = %conversation.id, "started conversation");
        Ok(conversation)
    }

    /// Returns `false` without changing anything when `id` is unknown.
    pub fn select_conversation(&self, id: &str) -> bool {
        let exists = self
            .conversations
            .with(|all| all.iter().any(|c| c.id == id));
        if exists {
            *self.active_guard() = Some(id.to_string());
        }
        exists
    }

    pub fn delete_conversation(&self, id: &str) -> Result<(), ChatError> {
        let removed = self.conversations.try_update(|all| {
            let idx = all
                .iter()
                .position(|c| c.id == id)
                .ok_or_else(|| ChatError::UnknownConversation(id.to_string()))?;
            all.remove(idx);
            Ok(())
        });
        match removed {
            Ok(()) => {}
            Err(ChatError::UnknownConversation(_)) => return Ok(()),
            Err(e) => return Err(e),
        }
        tracing::info!(conversation_id = %id, "deleted conversation");

        if self.active_id().as_deref() != Some(id) {
            return Ok(());
        }
        match self.newest_id() {
            Some(next) => *self.active_guard() = Some(next),
            None => {
                self.new_conversation()?;
            }
        }
        Ok(())
    }

    /// Appends a user turn and returns the history to send to the assistant.
    pub fn append_user_message(
        &self,
        conversation_id: &str,
        text: &str,
        media: Option<MediaRef>,
    ) -> Result<Vec<Message>, ChatError> {
        let message = Message::user(text, media);
        if !message.has_content() {
            return Err(ChatError::Validation);
        }
        self.conversations.try_update(|all| {
            let conversation = find_mut(all, conversation_id)?;
            conversation.messages.push(message);
            Ok(ai_history(&conversation.messages))
        })
    }

    pub fn append_assistant_message(
        &self,
        conversation_id: &str,
        text: &str,
        sources: Option<Vec<Citation>>,
    ) -> Result<Message, ChatError> {
        let message = Message::assistant(text, sources);
        self.conversations.try_update(|all| {
            find_mut(all, conversation_id)?
                .messages
                .push(message.clone());
            Ok(message)
        })
    }

    pub fn list_conversations(&self) -> ConversationList {
        self.conversations.with(|all| ConversationList::newest_first(all))
    }

    pub fn conversation(&self, id: &str) -> Option<Conversation> {
        self.conversations
            .with(|all| all.iter().find(|c| c.id == id).cloned())
    }

    pub fn active_id(&self) -> Option<String> {
        self.active_guard().clone()
    }

    pub fn active_conversation(&self) -> Option<Conversation> {
        self.active_id().and_then(|id| self.conversation(&id))
    }

    /// Every turn except the seeded greeting, in append order.
    pub fn history_for_ai(&self, id: &str) -> Result<Vec<Message>, ChatError> {
        self.conversation(id)
            .map(|c| ai_history(&c.messages))
            .ok_or_else(|| ChatError::UnknownConversation(id.to_string()))
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<Conversation>> {
        self.conversations.subscribe()
    }

    fn newest_id(&self) -> Option<String> {
        self.list_conversations().iter().next().map(|c| c.id.clone())
    }

    fn active_guard(&self) -> MutexGuard<'_, Option<String>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn find_mut<'a>(
    all: &'a mut [Conversation],
    id: &str,
) -> Result<&'a mut Conversation, ChatError> {
    all.iter_mut()
        .find(|c| c.id == id)
        .ok_or_else(|| ChatError::UnknownConversation(id.to_string()))
}

fn ai_history(messages: &[Message]) -> Vec<Message> {
    let skip = match messages.first() {
        Some(first) if first.sender == Sender::Assistant => 1,
        _ => 0,
    };
    messages[skip..].to_vec()
}
