// src/state.rs
use std::sync::Arc;

use crate::config::Settings;
use crate::services::openai_compat::OpenAiCompatFactory;
use crate::services::provider::{ProviderError, ProviderFactory};
use crate::services::relay::RelaySettings;

pub type SharedState = Arc<AppState>;

/// Everything a request handler reads. Nothing in here changes after
/// startup, so concurrent relays never share mutable state.
pub struct AppState {
    pub providers: Arc<dyn ProviderFactory>,
    pub relay: RelaySettings,
}

impl AppState {
    pub fn new(providers: Arc<dyn ProviderFactory>, relay: RelaySettings) -> Self {
        Self { providers, relay }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, ProviderError> {
        let factory = OpenAiCompatFactory::new(
            settings.provider,
            settings.api_key.clone(),
            settings.model.clone(),
            settings.base_url.clone(),
        )?;
        let relay = RelaySettings {
            upstream_timeout: settings.upstream_timeout,
            idle_timeout: settings.idle_timeout,
            ..RelaySettings::default()
        };
        Ok(Self::new(Arc::new(factory), relay))
    }
}
