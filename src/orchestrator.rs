//! One conversational round trip: history in, a well-formed reply out.
//!
//! Provider failures never cross this boundary. They come back as an
//! [`AiReply`] carrying an apology, so the caller appends every reply the same
//! way whether the turn succeeded or not.

use crate::conversation::ChatError;
use crate::db::models::{Citation, Message, Sender};
use crate::llm::{Content, GenerateRequest, Generator, LlmError, Part, Role};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

pub const UNKNOWN_ERROR_REPLY: &str =
    "I'm sorry, I encountered an unknown error. Please try again.";
pub const EMPTY_TURN_REPLY: &str =
    "I'm sorry, there was nothing to send. Please type a message or attach a file.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AiReply {
    pub text: String,
    pub sources: Vec<Citation>,
    /// True when `text` is an apology standing in for a failed call.
    #[serde(skip)]
    pub failed: bool,
}

impl AiReply {
    pub fn from_error(err: &LlmError) -> Self {
        let message = err.to_string();
        let text = if message.trim().is_empty() {
            UNKNOWN_ERROR_REPLY.to_string()
        } else {
            format!("Sorry, an error occurred: {message}")
        };
        Self::failure(text)
    }

    fn failure(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sources: Vec::new(),
            failed: true,
        }
    }
}

pub struct TurnOrchestrator<G> {
    generator: G,
}

impl<G: Generator> TurnOrchestrator<G> {
    pub fn new(generator: G) -> Self {
        Self { generator }
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    pub async fn send_turn(&self, history: &[Message], new_message: &Message) -> AiReply {
        if !new_message.has_content() {
            tracing::warn!("refusing to send a turn with neither text nor media");
            return AiReply::failure(EMPTY_TURN_REPLY);
        }

        let request = build_request(history, new_message);
        match self.generator.generate(&request).await {
            Ok(response) => {
                tracing::info!(
                    turns = request.contents.len(),
                    citations = response.grounding.len(),
                    "assistant reply received"
                );
                AiReply {
                    text: response.text,
                    sources: response.grounding,
                    failed: false,
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "assistant turn failed");
                AiReply::from_error(&e)
            }
        }
    }
}

pub fn build_request(history: &[Message], new_message: &Message) -> GenerateRequest {
    let contents = history
        .iter()
        .chain(std::iter::once(new_message))
        .filter_map(to_content)
        .collect();
    GenerateRequest {
        contents,
        search_grounding: true,
    }
}

/// Text first, then the attachment. Messages with neither are dropped.
fn to_content(message: &Message) -> Option<Content> {
    let role = match message.sender {
        Sender::User => Role::User,
        Sender::Assistant => Role::Model,
    };
    let mut parts = Vec::new();
    if !message.text.is_empty() {
        parts.push(Part::Text(message.text.clone()));
    }
    if let Some(media) = &message.media {
        parts.push(Part::InlineData {
            mime_type: media.mime_type.clone(),
            data: media.inline_data.clone(),
        });
    }
    (!parts.is_empty()).then_some(Content { role, parts })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnState {
    Idle,
    Sending,
    Completed,
    Failed,
}

/// Allows one outstanding turn per conversation.
#[derive(Debug, Default, Clone)]
pub struct TurnTracker {
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl TurnTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self, conversation_id: &str) -> Result<TurnTicket, ChatError> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if !in_flight.insert(conversation_id.to_string()) {
            return Err(ChatError::TurnInFlight(conversation_id.to_string()));
        }
        Ok(TurnTicket {
            conversation_id: conversation_id.to_string(),
            in_flight: Arc::clone(&self.in_flight),
        })
    }

    pub fn state(&self, conversation_id: &str) -> TurnState {
        let in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if in_flight.contains(conversation_id) {
            TurnState::Sending
        } else {
            TurnState::Idle
        }
    }
}

/// Held while a turn is `Sending`; dropping it returns the conversation to `Idle`.
#[derive(Debug)]
pub struct TurnTicket {
    conversation_id: String,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl TurnTicket {
    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn finish(self, reply: &AiReply) -> TurnState {
        if reply.failed {
            TurnState::Failed
        } else {
            TurnState::Completed
        }
    }
}

impl Drop for TurnTicket {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.conversation_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{MediaKind, MediaRef};
    use crate::llm::GenerateResponse;
    use async_trait::async_trait;

    struct Scripted {
        reply: Result<GenerateResponse, String>,
        seen: Mutex<Vec<GenerateRequest>>,
    }

    impl Scripted {
        fn ok(text: &str, grounding: Vec<Citation>) -> Self {
            Self {
                reply: Ok(GenerateResponse {
                    text: text.into(),
                    grounding,
                }),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn failing(message: &str) -> Self {
            Self {
                reply: Err(message.into()),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Generator for Scripted {
        async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, LlmError> {
            self.seen.lock().unwrap().push(request.clone());
            self.reply.clone().map_err(LlmError::Parse)
        }
    }

    fn image() -> MediaRef {
        MediaRef {
            kind: MediaKind::Image,
            inline_data: "aGVsbG8=".into(),
            mime_type: "image/png".into(),
        }
    }

    #[test]
    fn request_maps_roles_and_media() {
        let history = vec![
            Message::user("hi", None),
            Message::assistant("hello", Some(vec![])),
        ];
        let new = Message::user("", Some(image()));

        let request = build_request(&history, &new);
        assert!(request.search_grounding);
        assert_eq!(request.contents.len(), 3);
        assert_eq!(request.contents[1].role, Role::Model);
        assert_eq!(
            request.contents[2],
            Content {
                role: Role::User,
                parts: vec![Part::InlineData {
                    mime_type: "image/png".into(),
                    data: "aGVsbG8=".into(),
                }],
            }
        );
    }

    #[tokio::test]
    async fn success_carries_text_and_citations() {
        let citation = Citation {
            uri: Some("https://example.org".into()),
            title: Some("Example".into()),
        };
        let orchestrator = TurnOrchestrator::new(Scripted::ok("42", vec![citation.clone()]));

        let reply = orchestrator
            .send_turn(&[], &Message::user("meaning of life?", None))
            .await;
        assert_eq!(reply.text, "42");
        assert_eq!(reply.sources, vec![citation]);
        assert!(!reply.failed);
    }

    #[tokio::test]
    async fn provider_failure_becomes_apology() {
        let orchestrator = TurnOrchestrator::new(Scripted::failing("socket closed"));

        let reply = orchestrator
            .send_turn(&[], &Message::user("anyone there?", None))
            .await;
        assert!(reply.failed);
        assert!(!reply.text.is_empty());
        assert!(reply.text.contains("socket closed"));
        assert!(reply.sources.is_empty());
    }

    #[tokio::test]
    async fn empty_turn_never_reaches_provider() {
        let orchestrator = TurnOrchestrator::new(Scripted::ok("unused", vec![]));

        let reply = orchestrator.send_turn(&[], &Message::user("  ", None)).await;
        assert_eq!(reply.text, EMPTY_TURN_REPLY);
        assert!(reply.sources.is_empty());
        assert!(orchestrator.generator().seen.lock().unwrap().is_empty());
    }

    #[test]
    fn tracker_allows_one_turn_per_conversation() {
        let tracker = TurnTracker::new();
        let ticket = tracker.begin("a").unwrap();
        assert_eq!(tracker.state("a"), TurnState::Sending);
        assert!(matches!(tracker.begin("a"), Err(ChatError::TurnInFlight(_))));

        let other = tracker.begin("b").unwrap();
        assert_eq!(other.conversation_id(), "b");

        let outcome = ticket.finish(&AiReply::from_error(&LlmError::MissingApiKey));
        assert_eq!(outcome, TurnState::Failed);
        assert_eq!(tracker.state("a"), TurnState::Idle);
        assert!(tracker.begin("a").is_ok());

        drop(other);
        assert_eq!(tracker.state("b"), TurnState::Idle);
    }
}
