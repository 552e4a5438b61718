// src/client/consumer.rs
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::StatusCode;
use thiserror::Error;
use tracing::{debug, error, warn};

use super::conversation::{Conversation, ConversationError, StreamSink};
use super::decoder::Utf8StreamDecoder;
use crate::message::ChatRequest;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("message is empty")]
    EmptyMessage,

    #[error("{0}")]
    Busy(#[from] ConversationError),

    #[error("could not reach the chat service: {0}")]
    Fetch(String),

    #[error("chat service answered {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("reply was cut short: {0}")]
    Interrupted(String),
}

/// Sends chat turns to the relay and streams the answer into a
/// [`Conversation`].
#[derive(Clone)]
pub struct RelayClient {
    http: reqwest::Client,
    endpoint: String,
    send_history: bool,
}

impl RelayClient {
    /// `base_url` is the relay's origin, e.g. `http://localhost:3000`.
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: format!("{}/api/chat", base_url.trim_end_matches('/')),
            send_history: false,
        }
    }

    /// Forward every settled turn (`{"messages": [...]}`) instead of only the
    /// newest one.
    pub fn with_history(mut self, enabled: bool) -> Self {
        self.send_history = enabled;
        self
    }

    /// Caps the whole exchange, streaming included.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, ClientError> {
        self.http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Fetch(e.to_string()))?;
        Ok(self)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Submits `input` and streams the reply into `conversation`.
    ///
    /// `input` is cleared straight away. The user message and an empty
    /// assistant placeholder are appended before the request goes out, and
    /// `on_update` runs after every state change. Any failure is also
    /// recorded on the placeholder so the UI can show it.
    pub async fn send<F>(
        &self,
        conversation: &mut Conversation,
        input: &mut String,
        mut on_update: F,
    ) -> Result<(), ClientError>
    where
        F: FnMut(&Conversation),
    {
        let text = std::mem::take(input);
        if text.trim().is_empty() {
            return Err(ClientError::EmptyMessage);
        }

        let payload = if self.send_history {
            let mut messages = conversation.history();
            messages.push(crate::message::ChatMessage::user(text.clone()));
            ChatRequest::Conversation { messages }
        } else {
            ChatRequest::Single { message: text.clone() }
        };

        let mut sink = conversation.submit(text)?;
        on_update(sink.conversation());

        let resp = match self.http.post(&self.endpoint).json(&payload).send().await {
            Ok(resp) => resp,
            Err(e) => {
                error!("There was a problem with the fetch operation: {e}");
                let err = ClientError::Fetch(e.to_string());
                sink.fail(err.to_string());
                on_update(conversation);
                return Err(err);
            }
        };

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), %body, "response not ok");
            let err = ClientError::Status { status, body: error_message(&body) };
            sink.fail(err.to_string());
            on_update(conversation);
            return Err(err);
        }

        let mut decoder = Utf8StreamDecoder::new();
        let mut body = resp.bytes_stream();
        while let Some(read) = body.next().await {
            match read {
                Ok(bytes) => {
                    let text = decoder.decode(&bytes);
                    if text.is_empty() {
                        continue;
                    }
                    sink.append(&text);
                    on_update(sink.conversation());
                }
                Err(e) => {
                    warn!("reply stream broke: {e}");
                    let err = ClientError::Interrupted(e.to_string());
                    sink.append(&decoder.finish());
                    sink.fail(err.to_string());
                    on_update(conversation);
                    return Err(err);
                }
            }
        }

        let tail = decoder.finish();
        if !tail.is_empty() {
            sink.append(&tail);
        }
        debug!(chars = sink.content().chars().count(), "reply complete");
        sink.complete();
        on_update(conversation);
        Ok(())
    }
}

/// Pulls `error` (and `details`) out of a JSON error body, falling back to
/// the raw text.
fn error_message(body: &str) -> String {
    match serde_json::from_str::<crate::message::ErrorBody>(body) {
        Ok(parsed) => match parsed.details {
            Some(details) => format!("{} ({details})", parsed.error),
            None => parsed.error,
        },
        Err(_) => body.to_string(),
    }
}
