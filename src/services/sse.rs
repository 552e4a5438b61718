// src/services/sse.rs
use serde::Deserialize;

use super::provider::{ProviderError, StreamChunk};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseFrame {
    Data(String),
    Done,
}

/// Splits a server-sent-events byte stream into `data:` payloads. Lines may
/// be cut anywhere between reads.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) -> Vec<SseFrame> {
        self.buffer.extend_from_slice(bytes);
        let mut frames = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line_bytes: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line_bytes);
            let line = line.trim();
            if line.is_empty() || line.starts_with(':') {
                continue;
            }
            let Some(data) = line.strip_prefix("data:") else {
                continue;
            };
            let data = data.trim_start();
            if data == "[DONE]" {
                frames.push(SseFrame::Done);
            } else {
                frames.push(SseFrame::Data(data.to_string()));
            }
        }

        frames
    }

    /// Bytes left over that never saw a line terminator.
    pub fn remainder(&self) -> &[u8] {
        &self.buffer
    }

    /// Treats the unterminated tail as a final line once the body has ended.
    pub fn finish(&mut self) -> Vec<SseFrame> {
        if self.buffer.is_empty() {
            return Vec::new();
        }
        self.push(b"\n")
    }
}

#[derive(Deserialize)]
struct ChunkPayload {
    #[serde(default)]
    choices: Vec<ChoicePayload>,
    error: Option<ErrorPayload>,
}

#[derive(Deserialize)]
struct ChoicePayload {
    delta: Option<DeltaPayload>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct DeltaPayload {
    content: Option<String>,
}

#[derive(Deserialize)]
pub(crate) struct ErrorPayload {
    pub(crate) message: String,
}

/// Decodes one `data:` payload of a chat-completions stream.
pub fn parse_chunk(data: &str) -> Result<StreamChunk, ProviderError> {
    let payload: ChunkPayload =
        serde_json::from_str(data).map_err(|e| ProviderError::Decode(e.to_string()))?;

    if let Some(err) = payload.error {
        return Err(ProviderError::Stream(err.message));
    }

    let Some(choice) = payload.choices.into_iter().next() else {
        return Ok(StreamChunk::default());
    };

    Ok(StreamChunk {
        delta: choice.delta.and_then(|d| d.content),
        finish_reason: choice.finish_reason,
    })
}
