//! Append-only conversation log.

use thiserror::Error;

use crate::llm::{ChatMessage, Role};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConversationError {
    #[error("tool message has no tool_call_id")]
    MissingToolCallId,

    #[error("tool message answers '{0}', which is not an open tool call of the preceding assistant message")]
    UnmatchedToolCall(String),

    #[error("tool calls still unanswered: {}", .0.join(", "))]
    UnansweredToolCalls(Vec<String>),
}

/// Ordered messages of one session.
///
/// Messages can only be appended. A tool message must answer an open tool
/// call of the latest assistant message, and every open call must be
/// answered before any other message is appended.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
    open_calls: Vec<String>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// A conversation seeded with a system prompt and the user's request.
    pub fn from_prompt(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::system(system), ChatMessage::user(user)],
            open_calls: Vec::new(),
        }
    }

    /// Rebuild from existing messages, checking tool-call pairing.
    pub fn from_messages(
        messages: impl IntoIterator<Item = ChatMessage>,
    ) -> Result<Self, ConversationError> {
        let mut conversation = Self::new();
        for message in messages {
            conversation.push(message)?;
        }
        Ok(conversation)
    }

    pub fn push(&mut self, message: ChatMessage) -> Result<(), ConversationError> {
        if message.role == Role::Tool {
            let id = message
                .tool_call_id
                .as_deref()
                .ok_or(ConversationError::MissingToolCallId)?;
            let pos = self
                .open_calls
                .iter()
                .position(|open| open == id)
                .ok_or_else(|| ConversationError::UnmatchedToolCall(id.to_string()))?;
            self.open_calls.remove(pos);
        } else {
            if !self.open_calls.is_empty() {
                return Err(ConversationError::UnansweredToolCalls(self.open_calls.clone()));
            }
            self.open_calls = message
                .requested_tool_calls()
                .iter()
                .map(|call| call.id.clone())
                .collect();
        }

        self.messages.push(message);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Tool call ids of the latest assistant message not yet answered.
    pub fn open_tool_calls(&self) -> &[String] {
        &self.open_calls
    }
}
