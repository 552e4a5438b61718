// src/services/openai_compat.rs
//! Adapters for hosted chat-completions APIs that speak the OpenAI wire
//! format (Groq and OpenAI itself).

use std::{sync::Arc, time::Duration};

use futures_util::{StreamExt, future::BoxFuture, stream};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use super::provider::{ChunkStream, CompletionProvider, ProviderError, ProviderFactory, StreamChunk};
use super::sse::{self, SseDecoder, SseFrame};
use crate::message::ChatMessage;

const COMPLETIONS_PATH: &str = "/chat/completions";
const CHANNEL_CAPACITY: usize = 32;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Groq,
    OpenAi,
}

impl ProviderKind {
    pub fn from_name(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "groq" => Some(Self::Groq),
            "openai" => Some(Self::OpenAi),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Groq => "groq",
            Self::OpenAi => "openai",
        }
    }

    pub fn api_key_var(&self) -> &'static str {
        match self {
            Self::Groq => "GROQ_API_KEY",
            Self::OpenAi => "OPENAI_API_KEY",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Self::Groq => "llama3-70b-8192",
            Self::OpenAi => "gpt-4o-mini",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::Groq => "https://api.groq.com/openai/v1",
            Self::OpenAi => "https://api.openai.com/v1",
        }
    }
}

/// Hands out providers sharing one pooled HTTP client.
pub struct OpenAiCompatFactory {
    kind: ProviderKind,
    http: reqwest::Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
}

impl OpenAiCompatFactory {
    pub fn new(
        kind: ProviderKind,
        api_key: Option<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .pool_max_idle_per_host(8)
            .build()
            .map_err(|e| ProviderError::Init(format!("could not build HTTP client: {e}")))?;
        Ok(Self {
            kind,
            http,
            api_key,
            model: model.into(),
            base_url: base_url.into(),
        })
    }
}

impl ProviderFactory for OpenAiCompatFactory {
    fn connect(&self) -> Result<Arc<dyn CompletionProvider>, ProviderError> {
        let api_key = self
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ProviderError::Init(format!("{} is not set", self.kind.api_key_var())))?;

        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|_| ProviderError::Init(format!("{} is not a valid header value", self.kind.api_key_var())))?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        Ok(Arc::new(OpenAiCompatProvider {
            kind: self.kind,
            http: self.http.clone(),
            headers,
            model: self.model.clone(),
            endpoint: format!("{}{}", self.base_url.trim_end_matches('/'), COMPLETIONS_PATH),
        }))
    }
}

pub struct OpenAiCompatProvider {
    kind: ProviderKind,
    http: reqwest::Client,
    headers: HeaderMap,
    model: String,
    endpoint: String,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: sse::ErrorPayload,
}

impl CompletionProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        self.kind.name()
    }

    fn create(&self, messages: Vec<ChatMessage>) -> BoxFuture<'_, Result<ChunkStream, ProviderError>> {
        Box::pin(async move {
            let body = CompletionRequest { model: &self.model, messages: &messages, stream: true };
            debug!(provider = self.name(), model = %self.model, messages = messages.len(), "opening completion stream");

            let resp = self
                .http
                .post(&self.endpoint)
                .headers(self.headers.clone())
                .json(&body)
                .send()
                .await
                .map_err(|e| ProviderError::Request(e.to_string()))?;

            let status = resp.status();
            if !status.is_success() {
                let text = resp.text().await.unwrap_or_default();
                let message = serde_json::from_str::<ApiErrorBody>(&text)
                    .map(|b| b.error.message)
                    .unwrap_or_else(|_| {
                        if text.trim().is_empty() {
                            status.canonical_reason().unwrap_or("request failed").to_string()
                        } else {
                            text
                        }
                    });
                error!(provider = self.name(), status = status.as_u16(), %message, "completion request rejected");
                return Err(ProviderError::Api { status: status.as_u16(), message });
            }

            let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
            tokio::spawn(pump(resp, tx));

            let chunks = stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|item| (item, rx))
            });
            Ok(chunks.boxed())
        })
    }
}

/// Reads the SSE body and forwards decoded chunks until `[DONE]`, an error,
/// or the receiver going away. A body that ends inside an event yields a
/// final `Stream` error.
async fn pump(resp: reqwest::Response, tx: mpsc::Sender<Result<StreamChunk, ProviderError>>) {
    let mut bytes = resp.bytes_stream();
    let mut decoder = SseDecoder::new();

    while let Some(read) = bytes.next().await {
        let data = match read {
            Ok(data) => data,
            Err(e) => {
                warn!("upstream body read failed: {e}");
                let _ = tx.send(Err(ProviderError::Stream(e.to_string()))).await;
                return;
            }
        };

        for frame in decoder.push(&data) {
            let item = match frame {
                SseFrame::Done => return,
                SseFrame::Data(payload) => sse::parse_chunk(&payload),
            };
            let failed = item.is_err();
            if tx.send(item).await.is_err() {
                debug!("relay consumer dropped, abandoning upstream stream");
                return;
            }
            if failed {
                return;
            }
        }
    }

    let tail = decoder.remainder().len();
    for frame in decoder.finish() {
        let item = match frame {
            SseFrame::Done => return,
            SseFrame::Data(payload) => sse::parse_chunk(&payload),
        };
        let item = item.map_err(|e| match e {
            ProviderError::Decode(reason) => {
                warn!(bytes = tail, "upstream closed with a partial event: {reason}");
                ProviderError::Stream("upstream closed mid-event".to_string())
            }
            other => other,
        });
        let _ = tx.send(item).await;
    }
}
