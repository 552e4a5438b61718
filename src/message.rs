// src/message.rs
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "system" => Some(Role::System),
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Payload accepted by `POST /api/chat`.
///
/// Either a single `{"message": "..."}` turn, or the full
/// `{"messages": [{role, content}, ...]}` history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ChatRequest {
    Single { message: String },
    Conversation { messages: Vec<ChatMessage> },
}

const MISSING_MESSAGE: &str = "Invalid or missing message";

impl ChatRequest {
    /// Parses and validates a raw request body.
    pub fn parse(body: &[u8]) -> Result<Self, AppError> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|_| AppError::BadRequest("Invalid JSON in request body".to_string()))?;

        let Value::Object(mut fields) = value else {
            return Err(AppError::BadRequest(
                "Request body must be a JSON object".to_string(),
            ));
        };

        if let Some(message) = fields.remove("message") {
            return match message {
                Value::String(s) if !s.is_empty() => Ok(ChatRequest::Single { message: s }),
                _ => Err(AppError::BadRequest(MISSING_MESSAGE.to_string())),
            };
        }

        match fields.remove("messages") {
            Some(Value::Array(items)) => parse_history(items),
            Some(_) => Err(AppError::BadRequest(
                "Field 'messages' must be an array".to_string(),
            )),
            None => Err(AppError::BadRequest(MISSING_MESSAGE.to_string())),
        }
    }

    /// The user-supplied turns, oldest first.
    pub fn into_messages(self) -> Vec<ChatMessage> {
        match self {
            ChatRequest::Single { message } => vec![ChatMessage::user(message)],
            ChatRequest::Conversation { messages } => messages,
        }
    }
}

fn parse_history(items: Vec<Value>) -> Result<ChatRequest, AppError> {
    if items.is_empty() {
        return Err(AppError::BadRequest(
            "Field 'messages' must not be empty".to_string(),
        ));
    }

    let mut messages = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        let role = item
            .get("role")
            .and_then(Value::as_str)
            .and_then(Role::parse)
            .ok_or_else(|| {
                AppError::BadRequest(format!("messages[{index}] has an invalid or missing role"))
            })?;
        let content = item
            .get("content")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                AppError::BadRequest(format!("messages[{index}] has invalid or missing content"))
            })?;
        messages.push(ChatMessage::new(role, content));
    }

    Ok(ChatRequest::Conversation { messages })
}

/// JSON body of every non-streaming error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}
