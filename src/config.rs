// src/config.rs
use std::{net::SocketAddr, time::Duration};

use thiserror::Error;

use crate::services::openai_compat::ProviderKind;

pub const DEFAULT_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 30;
const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Runtime configuration, read from the process environment.
#[derive(Clone)]
pub struct Settings {
    pub addr: SocketAddr,
    pub provider: ProviderKind,
    /// Absent keys are reported per request, not at startup.
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub upstream_timeout: Duration,
    pub idle_timeout: Duration,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("addr", &self.addr)
            .field("provider", &self.provider)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("upstream_timeout", &self.upstream_timeout)
            .field("idle_timeout", &self.idle_timeout)
            .finish()
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let addr_raw = get("RELAY_ADDR").unwrap_or_else(|| DEFAULT_ADDR.to_string());
        let addr: SocketAddr = addr_raw.parse().map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
            key: "RELAY_ADDR",
            value: addr_raw.clone(),
            reason: e.to_string(),
        })?;

        let provider = match get("LLM_PROVIDER") {
            None => ProviderKind::Groq,
            Some(raw) => ProviderKind::from_name(&raw).ok_or_else(|| ConfigError::Invalid {
                key: "LLM_PROVIDER",
                value: raw,
                reason: "expected 'groq' or 'openai'".to_string(),
            })?,
        };

        Ok(Self {
            addr,
            provider,
            api_key: get(provider.api_key_var()),
            model: get("LLM_MODEL").unwrap_or_else(|| provider.default_model().to_string()),
            base_url: get("LLM_BASE_URL").unwrap_or_else(|| provider.default_base_url().to_string()),
            upstream_timeout: secs(&get, "UPSTREAM_TIMEOUT_SECS", DEFAULT_UPSTREAM_TIMEOUT_SECS)?,
            idle_timeout: secs(&get, "STREAM_IDLE_TIMEOUT_SECS", DEFAULT_IDLE_TIMEOUT_SECS)?,
        })
    }
}

fn secs(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: u64,
) -> Result<Duration, ConfigError> {
    let Some(raw) = get(key) else {
        return Ok(Duration::from_secs(default));
    };
    match raw.trim().parse::<u64>() {
        Ok(0) => Err(ConfigError::Invalid { key, value: raw, reason: "must be positive".to_string() }),
        Ok(n) => Ok(Duration::from_secs(n)),
        Err(e) => Err(ConfigError::Invalid { key, value: raw, reason: e.to_string() }),
    }
}
