// src/services/provider.rs
use std::sync::Arc;

use futures_util::{future::BoxFuture, stream::BoxStream};
use thiserror::Error;

use crate::message::ChatMessage;

/// One incremental unit of a streamed completion. Role-only and terminal
/// chunks carry no `delta`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamChunk {
    pub delta: Option<String>,
    pub finish_reason: Option<String>,
}

impl StreamChunk {
    pub fn text(delta: impl Into<String>) -> Self {
        Self { delta: Some(delta.into()), finish_reason: None }
    }

    /// The textual delta, if this chunk has a non-empty one.
    pub fn delta(&self) -> Option<&str> {
        self.delta.as_deref().filter(|d| !d.is_empty())
    }
}

pub type ChunkStream = BoxStream<'static, Result<StreamChunk, ProviderError>>;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{0}")]
    Init(String),

    #[error("request to AI service failed: {0}")]
    Request(String),

    #[error("{status} {message}")]
    Api { status: u16, message: String },

    #[error("stream error: {0}")]
    Stream(String),

    #[error("could not decode stream chunk: {0}")]
    Decode(String),
}

/// A hosted completion API.
///
/// `create` either fails before anything is streamed, or resolves to the
/// ordered, lazy sequence of chunks for the given conversation.
pub trait CompletionProvider: Send + Sync {
    fn name(&self) -> &str;

    fn create(&self, messages: Vec<ChatMessage>) -> BoxFuture<'_, Result<ChunkStream, ProviderError>>;
}

/// Builds a ready-to-use provider for one request. Fails with
/// `ProviderError::Init` when the service cannot be set up (missing credential).
pub trait ProviderFactory: Send + Sync {
    fn connect(&self) -> Result<Arc<dyn CompletionProvider>, ProviderError>;
}
