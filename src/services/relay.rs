// src/services/relay.rs
use std::time::Duration;

use axum::body::Bytes;
use futures_util::{Stream, StreamExt, stream};
use tracing::{Instrument, Span, debug, info, warn};

use super::provider::{ChunkStream, CompletionProvider};
use crate::{
    error::{AppError, RelayError},
    message::{ChatMessage, ChatRequest},
};

pub const SYSTEM_PROMPT: &str = "Role: You are a friendly and efficient customer support bot.
Assist website visitors with any questions or issues related to the site, services, and products. You have very short responses.
Capabilities:
    Answer general inquiries and provide product details.
    Offer step-by-step guidance for processes like account setup or purchases.
    Solve technical issues or escalate them when needed.
    Handle customer service requests like refunds or order status.
    Engage proactively based on user behavior.
    Support multiple languages.
Behavior: Be polite, clear, and helpful. Personalize responses and focus on resolving issues quickly. Escalate when necessary.
Tone: Friendly, professional, relaxed, and patient.";

/// Per-deployment relay parameters. Immutable once the server starts.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub system_prompt: String,
    pub upstream_timeout: Duration,
    pub idle_timeout: Duration,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            system_prompt: SYSTEM_PROMPT.to_string(),
            upstream_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(60),
        }
    }
}

/// The fixed system instruction followed by the caller's turns.
pub fn upstream_messages(system_prompt: &str, request: ChatRequest) -> Vec<ChatMessage> {
    let user = request.into_messages();
    let mut messages = Vec::with_capacity(1 + user.len());
    messages.push(ChatMessage::system(system_prompt));
    messages.extend(user);
    messages
}

/// Starts the upstream completion. Nothing has been sent to the client yet,
/// so every failure here still becomes a status code.
pub async fn open(
    provider: &dyn CompletionProvider,
    messages: Vec<ChatMessage>,
    limit: Duration,
) -> Result<ChunkStream, AppError> {
    match tokio::time::timeout(limit, provider.create(messages)).await {
        Ok(Ok(chunks)) => {
            debug!(provider = provider.name(), "upstream stream opened");
            Ok(chunks)
        }
        Ok(Err(e)) => Err(AppError::Upstream { details: e.to_string() }),
        Err(_) => Err(AppError::UpstreamTimeout(limit)),
    }
}

/// Turns upstream chunks into response body bytes.
///
/// Non-empty deltas are forwarded one-to-one in arrival order. Chunks without
/// text are skipped. An upstream failure, or silence longer than
/// `idle_timeout`, yields a final `Err` so the transport is torn down instead
/// of closed cleanly. Log events stay inside the caller's current span.
pub fn relay_body(
    chunks: ChunkStream,
    idle_timeout: Duration,
) -> impl Stream<Item = Result<Bytes, RelayError>> + Send + 'static {
    let span = Span::current();
    stream::unfold(Some((chunks, 0usize)), move |state| {
        next_bytes(state, idle_timeout).instrument(span.clone())
    })
}

async fn next_bytes(
    state: Option<(ChunkStream, usize)>,
    idle_timeout: Duration,
) -> Option<(Result<Bytes, RelayError>, Option<(ChunkStream, usize)>)> {
    let (mut chunks, forwarded) = state?;
    loop {
        match tokio::time::timeout(idle_timeout, chunks.next()).await {
            Ok(Some(Ok(chunk))) => {
                let Some(delta) = chunk.delta.filter(|d| !d.is_empty()) else {
                    continue;
                };
                return Some((Ok(Bytes::from(delta)), Some((chunks, forwarded + 1))));
            }
            Ok(Some(Err(e))) => {
                warn!(forwarded, "upstream failed mid-stream: {e}");
                return Some((Err(RelayError::Interrupted(e.to_string())), None));
            }
            Ok(None) => {
                info!(forwarded, "relay complete");
                return None;
            }
            Err(_) => {
                warn!(forwarded, "upstream idle for {idle_timeout:?}, aborting relay");
                return Some((Err(RelayError::IdleTimeout(idle_timeout)), None));
            }
        }
    }
}
