//! Neural embeddings from a local Ollama server (`/api/embeddings`), e.g.
//! `nomic-embed-text`.

use crate::embeddings::EmbeddingProvider;
use async_trait::async_trait;
use cosmic_core::config::EmbeddingSettings;
use cosmic_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{instrument, warn};

const MAX_ATTEMPTS: u32 = 3;
const BASE_BACKOFF: Duration = Duration::from_millis(100);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Serialize)]
struct EmbedBody<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbedReply {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct ErrorReply {
    error: String,
}

#[derive(Debug, Clone)]
pub struct OllamaProvider {
    http: reqwest::Client,
    url: String,
    model: String,
    dimensions: usize,
}

impl OllamaProvider {
    /// Provider for `settings`, after one successful probe embedding.
    pub async fn connect(settings: &EmbeddingSettings) -> AppResult<Self> {
        let provider = Self::from_settings(settings)?;

        provider.probe().await.map_err(|e| {
            AppError::Knowledge(format!(
                "Embedding model '{}' not available at {} ({}). Try: ollama pull {}",
                provider.model, provider.url, e, provider.model
            ))
        })?;

        Ok(provider)
    }

    fn from_settings(settings: &EmbeddingSettings) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AppError::Knowledge(format!("HTTP client: {}", e)))?;

        Ok(Self {
            http,
            url: format!("{}/api/embeddings", settings.endpoint.trim_end_matches('/')),
            model: settings.model.clone(),
            dimensions: settings.dimensions,
        })
    }

    #[instrument(skip(self), fields(model = %self.model))]
    async fn probe(&self) -> AppResult<()> {
        self.request("remiss").await.map(|_| ())
    }

    /// One request, retried with doubling backoff.
    async fn request_with_retry(&self, text: &str) -> AppResult<Vec<f32>> {
        let mut delay = BASE_BACKOFF;
        let mut attempt = 1;
        loop {
            match self.request(text).await {
                Ok(vector) => return Ok(vector),
                Err(e) if attempt < MAX_ATTEMPTS => {
                    warn!(
                        "Embedding attempt {}/{} failed: {}; retrying in {:?}",
                        attempt, MAX_ATTEMPTS, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn request(&self, text: &str) -> AppResult<Vec<f32>> {
        let response = self
            .http
            .post(&self.url)
            .json(&EmbedBody {
                model: &self.model,
                prompt: text,
            })
            .send()
            .await
            .map_err(|e| AppError::Knowledge(format!("embedding request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorReply>(&body)
                .map(|r| r.error)
                .unwrap_or(body);
            return Err(AppError::Knowledge(format!("HTTP {}: {}", status, message)));
        }

        let reply: EmbedReply = response
            .json()
            .await
            .map_err(|e| AppError::Knowledge(format!("unreadable embedding reply: {}", e)))?;

        if reply.embedding.len() != self.dimensions {
            return Err(AppError::Knowledge(format!(
                "model returned {} dimensions, configured {}",
                reply.embedding.len(),
                self.dimensions
            )));
        }

        Ok(reply.embedding)
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    #[instrument(skip(self, text), fields(text_len = text.len(), model = %self.model))]
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        if text.trim().is_empty() {
            return Ok(vec![0.0; self.dimensions]);
        }
        self.request_with_retry(text).await
    }
}
