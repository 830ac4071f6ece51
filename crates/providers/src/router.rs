//! Provider selection: builds the configured completion provider.

use std::sync::Arc;
use factchat_core::error::ProviderError;
use factchat_core::provider::Provider;
use crate::openai_compat::OpenAiCompatProvider;

/// Build the provider named in the configuration.
///
/// The HTTP client timeout follows `timeouts.provider_secs`.
pub fn build_from_config(
    config: &factchat_config::AppConfig,
) -> Result<Arc<dyn Provider>, ProviderError> {
    let base_url = config
        .api_url
        .clone()
        .unwrap_or_else(|| default_base_url(&config.provider));

    let api_key = match (&config.api_key, config.provider.as_str()) {
        (Some(key), _) => key.clone(),
        (None, "ollama" | "vllm" | "llamacpp") => config.provider.clone(),
        (None, name) => {
            return Err(ProviderError::NotConfigured(format!(
                "No API key for provider '{name}'; set FACTCHAT_API_KEY or OPENAI_API_KEY"
            )));
        }
    };

    let provider = OpenAiCompatProvider::with_timeout(
        &config.provider,
        base_url,
        api_key,
        config.timeouts.provider(),
    )?;

    Ok(Arc::new(provider))
}

/// Get the default base URL for well-known providers.
fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "openai" => "https://api.openai.com/v1".into(),
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        "groq" => "https://api.groq.com/openai/v1".into(),
        "together" => "https://api.together.xyz/v1".into(),
        "vllm" => "http://localhost:8000/v1".into(),
        "llamacpp" => "http://localhost:8080/v1".into(),
        _ => format!("https://{provider_name}.api.example.com/v1"),
    }
}
