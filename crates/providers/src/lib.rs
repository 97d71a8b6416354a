//! LLM Provider implementations for SecondBrain.
//!
//! All providers implement the `secondbrain_core::Provider` trait.
//! [`build_from_config`] creates the configured backend.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;

use secondbrain_config::AppConfig;
use secondbrain_core::error::ProviderError;
use secondbrain_core::provider::Provider;
use std::sync::Arc;

/// Build the chat backend from configuration.
///
/// A missing API key is not an error here: requests will be rejected by the
/// backend and surface as upstream errors.
pub fn build_from_config(config: &AppConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    if !config.has_api_key() {
        tracing::warn!("No API key configured; set SECONDBRAIN_API_KEY or api_key in config.toml");
    }
    let api_key = config.api_key.clone().unwrap_or_default();
    let provider = OpenAiCompatProvider::new(provider_name(&config.api_url), &config.api_url, api_key)?;
    Ok(Arc::new(provider))
}

/// A short name for well-known endpoints, used in logs.
fn provider_name(api_url: &str) -> &'static str {
    if api_url.contains("openrouter.ai") {
        "openrouter"
    } else if api_url.contains("api.openai.com") {
        "openai"
    } else if api_url.contains("localhost:11434") {
        "ollama"
    } else {
        "custom"
    }
}
