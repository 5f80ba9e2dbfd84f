//! Completion backend implementations for Parley.
//!
//! All backends implement the `parley_core::CompletionClient` trait.
//! `build_from_config` picks the endpoint from configuration.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatClient;

use parley_config::AppConfig;
use parley_core::error::CompletionError;
use std::sync::Arc;
use std::time::Duration;

/// Default base URL for a known backend name.
pub fn default_base_url(provider: &str) -> Option<&'static str> {
    match provider {
        "openai" => Some("https://api.openai.com/v1"),
        "openrouter" => Some("https://openrouter.ai/api/v1"),
        "ollama" => Some("http://localhost:11434/v1"),
        "together" => Some("https://api.together.xyz/v1"),
        _ => None,
    }
}

/// Build the completion client described by the configuration.
///
/// `api_url` wins over the backend's default URL. Every backend except
/// Ollama needs an API key.
pub fn build_from_config(
    config: &AppConfig,
) -> Result<Arc<OpenAiCompatClient>, CompletionError> {
    let base_url = match (&config.api_url, default_base_url(&config.provider)) {
        (Some(url), _) => url.clone(),
        (None, Some(url)) => url.to_string(),
        (None, None) => {
            return Err(CompletionError::NotConfigured(format!(
                "Unknown provider '{}' and no api_url set",
                config.provider
            )));
        }
    };

    let api_key = match (&config.api_key, config.provider.as_str()) {
        (Some(key), _) => key.clone(),
        (None, "ollama") => "ollama".to_string(),
        (None, _) => {
            return Err(CompletionError::NotConfigured(
                "No API key configured. Set PARLEY_API_KEY or api_key in config.toml".into(),
            ));
        }
    };

    tracing::debug!(provider = %config.provider, base_url = %base_url, "Building completion client");

    Ok(Arc::new(OpenAiCompatClient::with_timeout(
        config.provider.clone(),
        base_url,
        api_key,
        Duration::from_secs(config.request_timeout_secs),
    )))
}
