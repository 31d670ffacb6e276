//! Conversation construction helpers

use uuid::Uuid;

use super::{Conversation, Message};

/// Build the conversation for a new user turn.
///
/// A fresh conversation (none given, or no messages yet) gets one system
/// message joining the trimmed system prompt and the tool prompt with a blank
/// line. The user message is always appended last. The session id of
/// `existing` is kept, otherwise a new one is minted.
pub fn build_conversation(
    existing: Option<&Conversation>,
    user_message: &str,
    system_prompt: Option<&str>,
    tool_prompt: Option<&str>,
) -> Conversation {
    let mut conversation = match existing {
        Some(conversation) => conversation.clone(),
        None => Conversation::new(Vec::new()),
    };

    if conversation.is_empty() {
        let parts: Vec<&str> = [system_prompt.map(str::trim), tool_prompt]
            .into_iter()
            .flatten()
            .filter(|part| !part.is_empty())
            .collect();
        if !parts.is_empty() {
            conversation = conversation.with_message(Message::system(parts.join("\n\n")));
        }
    }

    if conversation.session_id.is_none() {
        conversation.session_id = Some(Uuid::new_v4().to_string());
    }

    conversation.with_message(Message::user(user_message))
}
