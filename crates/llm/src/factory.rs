//! LLM backend factory.
//!
//! Builds the local or remote client from application configuration.

use crate::client::LlmClient;
use crate::providers::{HttpRemoteClient, OllamaClient, RemoteChatClient};
use cosmic_core::config::{LocalSettings, RemoteSettings};
use cosmic_core::{AppError, AppResult};
use std::sync::Arc;
use std::time::Duration;

/// Create a local generation client based on the provider name.
///
/// # Arguments
/// * `provider` - Provider identifier ("ollama")
/// * `settings` - Endpoint and timeout
///
/// # Errors
/// Returns `AppError::Config` if the provider is unknown.
pub fn create_client(provider: &str, settings: &LocalSettings) -> AppResult<Arc<dyn LlmClient>> {
    match provider.to_lowercase().as_str() {
        "ollama" | "local" => {
            let client = OllamaClient::new(settings.endpoint.as_str())
                .with_timeout(Duration::from_secs(settings.timeout));
            Ok(Arc::new(client))
        }
        _ => Err(AppError::Config(format!("Unknown provider: {}", provider))),
    }
}

/// Create the remote answer client.
///
/// # Errors
/// Returns `AppError::Config` when the URL or API key is missing.
pub fn create_remote_client(
    settings: &RemoteSettings,
    api_key: Option<&str>,
) -> AppResult<Arc<dyn RemoteChatClient>> {
    let url = settings
        .url
        .as_deref()
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| AppError::Config("Remote backend requires remote.url".to_string()))?;

    let api_key = api_key.ok_or_else(|| {
        AppError::Config(format!(
            "Remote backend requires an API key in {}",
            settings.api_key_env
        ))
    })?;

    let client = HttpRemoteClient::new(url, api_key, Duration::from_secs(settings.timeout))?;
    Ok(Arc::new(client))
}
