//! Embedding engine for the passage store.
//!
//! The provider is built lazily on first use and then shared for the lifetime
//! of the process.

pub mod provider;
pub mod providers;

pub use provider::{create_provider, EmbeddingProvider};

use cosmic_core::config::EmbeddingSettings;
use cosmic_core::{AppError, AppResult};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Embedding front-end with load-once provider construction.
///
/// Concurrent first calls are serialized by the `OnceCell`, so the provider
/// (and any model it loads) is created exactly once. A failed construction
/// leaves the cell empty and the next call tries again.
pub struct LazyEmbedder {
    settings: EmbeddingSettings,
    provider: OnceCell<Arc<dyn EmbeddingProvider>>,
    initializations: AtomicUsize,
}

impl LazyEmbedder {
    /// Embedder that creates its provider from settings on first use.
    pub fn new(settings: EmbeddingSettings) -> Self {
        Self {
            settings,
            provider: OnceCell::new(),
            initializations: AtomicUsize::new(0),
        }
    }

    /// Embedder around an already constructed provider.
    pub fn with_provider(provider: Arc<dyn EmbeddingProvider>) -> Self {
        let settings = EmbeddingSettings {
            provider: provider.name().to_string(),
            model: provider.model().to_string(),
            dimensions: provider.dimensions(),
            ..Default::default()
        };

        Self {
            settings,
            provider: OnceCell::new_with(Some(provider)),
            initializations: AtomicUsize::new(0),
        }
    }

    /// Embedding dimensionality D.
    pub fn dimensions(&self) -> usize {
        self.provider
            .get()
            .map(|p| p.dimensions())
            .unwrap_or(self.settings.dimensions)
    }

    /// How many times a provider was constructed by this embedder.
    pub fn initializations(&self) -> usize {
        self.initializations.load(Ordering::SeqCst)
    }

    /// Get the provider, constructing it on first use.
    pub async fn provider(&self) -> AppResult<&Arc<dyn EmbeddingProvider>> {
        self.provider
            .get_or_try_init(|| async {
                tracing::info!(
                    "Initializing embedding provider={} model={} dimensions={}",
                    self.settings.provider,
                    self.settings.model,
                    self.settings.dimensions
                );
                let provider = create_provider(&self.settings).await?;
                self.initializations.fetch_add(1, Ordering::SeqCst);
                Ok::<_, AppError>(provider)
            })
            .await
    }

    /// Embed one text.
    ///
    /// Empty or whitespace-only text is a valid zero-signal query and yields a
    /// zero vector of length D.
    pub async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        if text.trim().is_empty() {
            return Ok(vec![0.0; self.dimensions()]);
        }

        let provider = self.provider().await?;
        let embedding = provider.embed(text).await?;

        tracing::debug!(
            "Embedded {} chars into {} dimensions using '{}'",
            text.len(),
            embedding.len(),
            provider.name()
        );

        Ok(embedding)
    }

    /// Embed multiple texts.
    pub async fn embed_texts(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let provider = self.provider().await?;

        tracing::info!(
            "Embedding {} texts using provider '{}' (model: {})",
            texts.len(),
            provider.name(),
            provider.model()
        );

        provider.embed_batch(texts).await
    }
}
