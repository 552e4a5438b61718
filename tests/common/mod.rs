#![allow(dead_code)]

use std::{
    net::SocketAddr,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use axum::Router;
use futures_util::{StreamExt, future::BoxFuture, stream};
use support_relay::{
    message::ChatMessage,
    routes::create_router,
    services::{
        provider::{ChunkStream, CompletionProvider, ProviderError, ProviderFactory, StreamChunk},
        relay::RelaySettings,
    },
    state::AppState,
};

/// What the fake upstream does when `create` is called.
#[derive(Clone)]
pub enum Script {
    Chunks(Vec<Result<StreamChunk, String>>),
    /// Sends the chunks, then never finishes.
    Stall(Vec<StreamChunk>),
    FailBeforeStream(ProviderErrorKind),
    Hang,
}

#[derive(Clone)]
pub enum ProviderErrorKind {
    Api(u16, &'static str),
    Network(&'static str),
}

/// Counts calls and records the messages each call received.
#[derive(Default)]
pub struct Calls {
    connects: AtomicUsize,
    creates: Mutex<Vec<Vec<ChatMessage>>>,
}

impl Calls {
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn creates(&self) -> Vec<Vec<ChatMessage>> {
        self.creates.lock().unwrap().clone()
    }
}

pub struct ScriptedFactory {
    pub script: Script,
    pub init_error: Option<&'static str>,
    pub calls: Arc<Calls>,
}

impl ScriptedFactory {
    pub fn new(script: Script) -> Self {
        Self { script, init_error: None, calls: Arc::new(Calls::default()) }
    }

    pub fn failing_init(reason: &'static str) -> Self {
        Self { init_error: Some(reason), ..Self::new(Script::Hang) }
    }
}

impl ProviderFactory for ScriptedFactory {
    fn connect(&self) -> Result<Arc<dyn CompletionProvider>, ProviderError> {
        self.calls.connects.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = self.init_error {
            return Err(ProviderError::Init(reason.to_string()));
        }
        Ok(Arc::new(ScriptedProvider { script: self.script.clone(), calls: self.calls.clone() }))
    }
}

struct ScriptedProvider {
    script: Script,
    calls: Arc<Calls>,
}

impl CompletionProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn create(&self, messages: Vec<ChatMessage>) -> BoxFuture<'_, Result<ChunkStream, ProviderError>> {
        self.calls.creates.lock().unwrap().push(messages);
        let script = self.script.clone();
        Box::pin(async move {
            match script {
                // Errors are delayed so the chunks before them reach the wire first.
                Script::Chunks(items) => Ok(stream::iter(items)
                    .then(|item| async move {
                        if item.is_err() {
                            tokio::time::sleep(Duration::from_millis(50)).await;
                        }
                        item.map_err(ProviderError::Stream)
                    })
                    .boxed()),
                Script::Stall(items) => Ok(stream::iter(items.into_iter().map(Ok))
                    .chain(stream::pending())
                    .boxed()),
                Script::FailBeforeStream(ProviderErrorKind::Api(status, message)) => {
                    Err(ProviderError::Api { status, message: message.to_string() })
                }
                Script::FailBeforeStream(ProviderErrorKind::Network(message)) => {
                    Err(ProviderError::Request(message.to_string()))
                }
                Script::Hang => std::future::pending().await,
            }
        })
    }
}

pub fn text(delta: &str) -> Result<StreamChunk, String> {
    Ok(StreamChunk::text(delta))
}

pub fn role_only() -> Result<StreamChunk, String> {
    Ok(StreamChunk::default())
}

pub fn finish() -> Result<StreamChunk, String> {
    Ok(StreamChunk { delta: None, finish_reason: Some("stop".to_string()) })
}

pub fn test_settings() -> RelaySettings {
    RelaySettings {
        system_prompt: "You are a test support bot.".to_string(),
        upstream_timeout: Duration::from_millis(200),
        idle_timeout: Duration::from_millis(200),
    }
}

pub fn test_app(factory: ScriptedFactory) -> (Router, Arc<Calls>) {
    let calls = factory.calls.clone();
    let state = Arc::new(AppState::new(Arc::new(factory), test_settings()));
    (create_router().with_state(state), calls)
}

/// Serves `router` on an ephemeral loopback port.
pub async fn serve(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}
