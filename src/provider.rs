//! AI provider detection and client configuration.
//!
//! Every supported provider exposes an OpenAI-compatible chat completions
//! endpoint, so a single `async-openai` client pointed at the right base URL
//! serves all of them.

use crate::error::{Result, VidchatError};
use async_openai::{config::OpenAIConfig, Client};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default timeout for provider API requests (5 minutes).
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Supported AI providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Mistral,
    Google,
    Anthropic,
    #[serde(rename = "openai")]
    OpenAI,
}

impl Provider {
    /// Detection priority: the first provider with a key wins.
    pub const PRIORITY: [Provider; 4] = [
        Provider::Mistral,
        Provider::Google,
        Provider::Anthropic,
        Provider::OpenAI,
    ];

    /// Environment variable holding the provider's API key.
    pub fn env_var(&self) -> &'static str {
        match self {
            Provider::Mistral => "MISTRAL_API_KEY",
            Provider::Google => "GOOGLE_GENERATIVE_AI_API_KEY",
            Provider::Anthropic => "ANTHROPIC_API_KEY",
            Provider::OpenAI => "OPENAI_API_KEY",
        }
    }

    /// Model used when no override is configured.
    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::Mistral => "mistral-small-latest",
            Provider::Google => "gemini-2.5-flash",
            Provider::Anthropic => "claude-3-5-haiku-latest",
            Provider::OpenAI => "gpt-4o-mini",
        }
    }

    /// OpenAI-compatible API base URL.
    pub fn api_base(&self) -> &'static str {
        match self {
            Provider::Mistral => "https://api.mistral.ai/v1",
            Provider::Google => "https://generativelanguage.googleapis.com/v1beta/openai",
            Provider::Anthropic => "https://api.anthropic.com/v1",
            Provider::OpenAI => "https://api.openai.com/v1",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Provider::Mistral => "Mistral",
            Provider::Google => "Google Gemini",
            Provider::Anthropic => "Anthropic Claude",
            Provider::OpenAI => "OpenAI",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provider::Mistral => write!(f, "mistral"),
            Provider::Google => write!(f, "google"),
            Provider::Anthropic => write!(f, "anthropic"),
            Provider::OpenAI => write!(f, "openai"),
        }
    }
}

impl std::str::FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mistral" => Ok(Provider::Mistral),
            "google" | "gemini" => Ok(Provider::Google),
            "anthropic" | "claude" => Ok(Provider::Anthropic),
            "openai" => Ok(Provider::OpenAI),
            _ => Err(format!("Unknown provider: {}", s)),
        }
    }
}

/// API keys read from the environment.
#[derive(Debug, Clone, Default)]
pub struct EnvironmentKeys {
    pub mistral: Option<String>,
    pub google: Option<String>,
    pub anthropic: Option<String>,
    pub openai: Option<String>,
}

impl EnvironmentKeys {
    /// Read all provider keys from the process environment.
    pub fn from_env() -> Self {
        let read = |p: Provider| std::env::var(p.env_var()).ok();
        Self {
            mistral: read(Provider::Mistral),
            google: read(Provider::Google),
            anthropic: read(Provider::Anthropic),
            openai: read(Provider::OpenAI),
        }
    }

    /// The non-blank key for a provider, if any.
    pub fn key_for(&self, provider: Provider) -> Option<&str> {
        let key = match provider {
            Provider::Mistral => self.mistral.as_deref(),
            Provider::Google => self.google.as_deref(),
            Provider::Anthropic => self.anthropic.as_deref(),
            Provider::OpenAI => self.openai.as_deref(),
        };
        key.map(str::trim).filter(|k| !k.is_empty())
    }
}

/// The provider, model and credentials used to build one conversation backend.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfiguration {
    pub provider: Provider,
    pub model_id: String,
    pub api_key: String,
    pub api_base: String,
}

/// Return the first provider, in priority order, with a non-blank key.
pub fn detect_available_provider(env: &EnvironmentKeys) -> Option<Provider> {
    Provider::PRIORITY
        .into_iter()
        .find(|p| env.key_for(*p).is_some())
}

/// Build the configuration for a specific provider.
pub fn create_model_configuration(
    provider: Provider,
    env: &EnvironmentKeys,
    model_override: Option<&str>,
) -> Result<ModelConfiguration> {
    let api_key = env.key_for(provider).ok_or_else(|| {
        VidchatError::Config(format!(
            "{} is not set. Set it with: export {}='...'",
            provider.env_var(),
            provider.env_var()
        ))
    })?;

    Ok(ModelConfiguration {
        provider,
        model_id: model_override
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(provider.default_model())
            .to_string(),
        api_key: api_key.to_string(),
        api_base: provider.api_base().to_string(),
    })
}

/// Select a model configuration, honouring an optional forced provider.
pub fn select_model(
    env: &EnvironmentKeys,
    forced: Option<Provider>,
    model_override: Option<&str>,
) -> Result<ModelConfiguration> {
    let provider = match forced {
        Some(p) => p,
        None => detect_available_provider(env).ok_or_else(|| {
            VidchatError::NoProvider(
                Provider::PRIORITY
                    .iter()
                    .map(|p| p.env_var())
                    .collect::<Vec<_>>()
                    .join(", "),
            )
        })?,
    };

    create_model_configuration(provider, env, model_override)
}

/// Create a chat client for the configured provider with the default timeout.
pub fn create_client(config: &ModelConfiguration) -> Result<Client<OpenAIConfig>> {
    create_client_with_timeout(config, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
}

/// Create a chat client for the configured provider with a custom timeout.
pub fn create_client_with_timeout(
    config: &ModelConfiguration,
    timeout: Duration,
) -> Result<Client<OpenAIConfig>> {
    let http_client = reqwest::Client::builder().timeout(timeout).build()?;

    let openai_config = OpenAIConfig::new()
        .with_api_key(config.api_key.clone())
        .with_api_base(config.api_base.clone());

    Ok(Client::with_config(openai_config).with_http_client(http_client))
}
