// src/client/conversation.rs
use thiserror::Error;

use crate::message::{ChatMessage, Role};

pub const GREETING: &str = "Hello! How can I assist you today?";

/// A message as shown to the user. `error` is set when the reply it holds
/// failed or was cut short.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayMessage {
    pub role: Role,
    pub content: String,
    pub error: Option<String>,
}

impl DisplayMessage {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self { role, content: content.into(), error: None }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationEvent {
    /// User text, plus an empty assistant placeholder after it.
    Submitted(String),
    /// A decoded fragment for the placeholder.
    Delta(String),
    Failed(String),
    Completed,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConversationError {
    #[error("a reply is still streaming")]
    ReplyInProgress,

    #[error("no reply is streaming")]
    NoActiveReply,
}

/// Ordered chat state owned by the UI layer. Only ever grows: messages are
/// appended and the streaming placeholder is extended, never rewritten.
#[derive(Debug, Clone)]
pub struct Conversation {
    messages: Vec<DisplayMessage>,
    streaming: bool,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    pub fn new() -> Self {
        Self::with_greeting(GREETING)
    }

    pub fn with_greeting(greeting: impl Into<String>) -> Self {
        Self {
            messages: vec![DisplayMessage::new(Role::Assistant, greeting)],
            streaming: false,
        }
    }

    pub fn messages(&self) -> &[DisplayMessage] {
        &self.messages
    }

    pub fn last(&self) -> Option<&DisplayMessage> {
        self.messages.last()
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    /// The reducer. Rejects events that would break the single-placeholder
    /// invariant and leaves the state untouched in that case.
    pub fn apply(&mut self, event: ConversationEvent) -> Result<(), ConversationError> {
        match event {
            ConversationEvent::Submitted(text) => {
                if self.streaming {
                    return Err(ConversationError::ReplyInProgress);
                }
                self.messages.push(DisplayMessage::new(Role::User, text));
                self.messages.push(DisplayMessage::new(Role::Assistant, ""));
                self.streaming = true;
            }
            ConversationEvent::Delta(fragment) => {
                self.placeholder()?.content.push_str(&fragment);
            }
            ConversationEvent::Failed(reason) => {
                self.placeholder()?.error = Some(reason);
                self.streaming = false;
            }
            ConversationEvent::Completed => {
                self.placeholder()?;
                self.streaming = false;
            }
        }
        Ok(())
    }

    fn placeholder(&mut self) -> Result<&mut DisplayMessage, ConversationError> {
        if !self.streaming {
            return Err(ConversationError::NoActiveReply);
        }
        self.messages.last_mut().ok_or(ConversationError::NoActiveReply)
    }

    /// Appends the user turn and placeholder, returning the only handle that
    /// may write into the placeholder until it is finished.
    pub fn submit(&mut self, text: impl Into<String>) -> Result<ReplySink<'_>, ConversationError> {
        self.apply(ConversationEvent::Submitted(text.into()))?;
        Ok(ReplySink { conversation: self, finished: false })
    }

    /// Completed turns to forward as `{"messages": [...]}`. The greeting,
    /// failed replies and any streaming placeholder are left out.
    pub fn history(&self) -> Vec<ChatMessage> {
        let settled = if self.streaming {
            &self.messages[..self.messages.len().saturating_sub(1)]
        } else {
            &self.messages[..]
        };
        settled
            .iter()
            .skip(1)
            .filter(|m| m.error.is_none() && !m.content.is_empty())
            .map(|m| ChatMessage::new(m.role, m.content.clone()))
            .collect()
    }
}

/// Append-only writer for an in-flight reply.
pub trait StreamSink {
    fn append(&mut self, fragment: &str);

    fn complete(self);

    fn fail(self, reason: impl Into<String>);
}

/// Exclusive writer for the current placeholder. Holding it mutably borrows
/// the conversation, so no second writer can exist. Dropping it unfinished
/// marks the reply as abandoned.
pub struct ReplySink<'a> {
    conversation: &'a mut Conversation,
    finished: bool,
}

impl ReplySink<'_> {
    pub fn conversation(&self) -> &Conversation {
        self.conversation
    }

    pub fn content(&self) -> &str {
        self.conversation.last().map(|m| m.content.as_str()).unwrap_or_default()
    }

    fn finish(&mut self, event: ConversationEvent) {
        if !self.finished {
            let _ = self.conversation.apply(event);
            self.finished = true;
        }
    }
}

impl StreamSink for ReplySink<'_> {
    fn append(&mut self, fragment: &str) {
        if fragment.is_empty() || self.finished {
            return;
        }
        // Cannot fail: the sink exists only while the placeholder streams.
        let _ = self.conversation.apply(ConversationEvent::Delta(fragment.to_string()));
    }

    fn complete(mut self) {
        self.finish(ConversationEvent::Completed);
    }

    fn fail(mut self, reason: impl Into<String>) {
        self.finish(ConversationEvent::Failed(reason.into()));
    }
}

impl Drop for ReplySink<'_> {
    fn drop(&mut self) {
        self.finish(ConversationEvent::Failed("reply abandoned".to_string()));
    }
}
