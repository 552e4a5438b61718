// src/client/mod.rs
//! Streaming consumer side: the conversation state a chat UI renders, and
//! the HTTP client that fills it from the relay.
pub mod consumer;
pub mod conversation;
pub mod decoder;

pub use consumer::{ClientError, RelayClient};
pub use conversation::{Conversation, ConversationEvent, DisplayMessage, ReplySink, StreamSink};
pub use decoder::Utf8StreamDecoder;
