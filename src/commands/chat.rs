use super::AppError;
use crate::config::AppConfig;
use crate::conversation::{ChatError, ConversationList};
use crate::db::models::{Conversation, Message};
use crate::llm::LlmError;
use crate::media::{self, MediaFile};
use crate::orchestrator::{AiReply, TurnOrchestrator, TurnState};
use crate::AppState;

pub fn create_conversation(state: &AppState) -> Result<Conversation, AppError> {
    Ok(state.conversations.new_conversation()?)
}

pub fn list_conversations(state: &AppState) -> ConversationList {
    state.conversations.list_conversations()
}

pub fn select_conversation(state: &AppState, id: &str) -> bool {
    state.conversations.select_conversation(id)
}

pub fn delete_conversation(state: &AppState, id: &str) -> Result<(), AppError> {
    Ok(state.conversations.delete_conversation(id)?)
}

pub fn get_messages(state: &AppState, conversation_id: &str) -> Result<Vec<Message>, AppError> {
    state
        .conversations
        .conversation(conversation_id)
        .map(|c| c.messages)
        .ok_or_else(|| ChatError::UnknownConversation(conversation_id.to_string()).into())
}

pub fn turn_state(state: &AppState, conversation_id: &str) -> TurnState {
    state.turns.state(conversation_id)
}

/// Runs one full turn: user message in, assistant reply appended and returned.
///
/// Provider failures come back as an appended apology message, not as an
/// error. Errors are reserved for input problems (empty turn, unreadable or
/// unsupported attachment, unknown conversation, a turn already in flight)
/// and storage failures.
pub async fn send_message(
    state: &AppState,
    conversation_id: &str,
    content: &str,
    attachment: Option<MediaFile>,
) -> Result<Message, AppError> {
    // 1. Reject empty turns before any side effect
    if content.trim().is_empty() && attachment.is_none() {
        return Err(ChatError::Validation.into());
    }
    if state.conversations.conversation(conversation_id).is_none() {
        return Err(ChatError::UnknownConversation(conversation_id.to_string()).into());
    }

    // 2. Settings are read before anything is written
    let config = AppConfig::resolve(&state.db)?;

    // 3. One outstanding turn per conversation
    let ticket = state.turns.begin(conversation_id)?;

    // 4. Inline the attachment; nothing is stored if this fails
    let media = match &attachment {
        Some(file) => Some(media::encode(file).await?),
        None => None,
    };

    // 5. Save user message and collect the history for the assistant
    let history = state
        .conversations
        .append_user_message(conversation_id, content, media)?;
    let (latest, prior) = history.split_last().ok_or(ChatError::Validation)?;

    // 6. Round trip, optionally bounded by the configured timeout
    let orchestrator = TurnOrchestrator::new(state.generator(&config));
    let reply = match config.turn_timeout {
        Some(limit) => tokio::time::timeout(limit, orchestrator.send_turn(prior, latest))
            .await
            .unwrap_or_else(|_| {
                tracing::warn!(conversation_id, secs = limit.as_secs(), "assistant turn timed out");
                AiReply::from_error(&LlmError::Timeout(limit.as_secs()))
            }),
        None => orchestrator.send_turn(prior, latest).await,
    };
    let outcome = ticket.finish(&reply);
    tracing::info!(conversation_id, ?outcome, "turn finished");

    // 7. Save assistant message
    let message = state.conversations.append_assistant_message(
        conversation_id,
        &reply.text,
        Some(reply.sources),
    )?;
    Ok(message)
}
