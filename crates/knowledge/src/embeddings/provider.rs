//! The embedding seam and its factory.

use super::providers::{ollama::OllamaProvider, trigram::TrigramProvider};
use cosmic_core::config::EmbeddingSettings;
use cosmic_core::{AppError, AppResult};
use std::sync::Arc;

/// Maps text to a vector of fixed dimensionality.
///
/// Identical input must give identical vectors. Blank input gives the zero
/// vector.
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// Provider key as used in `embedding.provider`.
    fn name(&self) -> &str;

    fn model(&self) -> &str;

    fn dimensions(&self) -> usize;

    async fn embed(&self, text: &str) -> AppResult<Vec<f32>>;

    /// Embeds in order, one text at a time unless a provider batches.
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }
}

/// Build the configured provider.
///
/// Network providers probe their endpoint before returning, so a missing
/// model is reported here instead of on the first query.
pub async fn create_provider(
    settings: &EmbeddingSettings,
) -> AppResult<Arc<dyn EmbeddingProvider>> {
    let provider: Arc<dyn EmbeddingProvider> = match settings.provider.as_str() {
        "trigram" => Arc::new(TrigramProvider::new(settings.dimensions)),
        "ollama" => Arc::new(OllamaProvider::connect(settings).await?),
        other => {
            return Err(AppError::Knowledge(format!(
                "Unknown embedding provider '{}' (expected trigram or ollama)",
                other
            )))
        }
    };

    tracing::debug!(
        "Embedding provider ready: {} ({}, {} dims)",
        provider.name(),
        provider.model(),
        provider.dimensions()
    );
    Ok(provider)
}
