//! Question → ranked passages.

use crate::embeddings::LazyEmbedder;
use crate::index::SqliteIndex;
use crate::types::RetrievalResult;
use crate::vector_index::VectorIndex;
use cosmic_core::config::RetrievalSettings;
use cosmic_core::{AppError, AppResult};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Minimum cosine similarity for a passage to count as relevant.
///
/// Range: -1.0 to 1.0. 0.20 suits the trigram embedder; neural models
/// usually want 0.3-0.5.
pub const MIN_RELEVANCE_SCORE: f32 = 0.20;

/// Embeds a question, queries the index and applies the relevance cutoff.
///
/// Both the embedder and the index are shared resources. The index is either
/// handed in already open or opened on first use from `index_path`.
pub struct Retriever {
    embedder: Arc<LazyEmbedder>,
    index: OnceCell<Arc<dyn VectorIndex>>,
    index_path: Option<PathBuf>,
    top_k: usize,
    min_score: f32,
}

impl Retriever {
    /// Retriever over an already open index.
    pub fn new(
        embedder: Arc<LazyEmbedder>,
        index: Arc<dyn VectorIndex>,
        top_k: usize,
        min_score: f32,
    ) -> Self {
        Self {
            embedder,
            index: OnceCell::new_with(Some(index)),
            index_path: None,
            top_k,
            min_score,
        }
    }

    /// Retriever that opens the SQLite index at `index_path` on first query.
    pub fn lazy(
        embedder: Arc<LazyEmbedder>,
        index_path: PathBuf,
        settings: &RetrievalSettings,
    ) -> Self {
        Self {
            embedder,
            index: OnceCell::new(),
            index_path: Some(index_path),
            top_k: settings.top_k,
            min_score: settings.min_score,
        }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn embedder(&self) -> &Arc<LazyEmbedder> {
        &self.embedder
    }

    /// The index, opening it on first use.
    pub async fn index(&self) -> AppResult<Arc<dyn VectorIndex>> {
        let index = self
            .index
            .get_or_try_init(|| async {
                let path = self.index_path.clone().ok_or_else(|| {
                    AppError::Knowledge("No index configured".to_string())
                })?;
                tracing::info!("Opening passage index at {:?}", path);
                let index = tokio::task::spawn_blocking(move || SqliteIndex::open(&path))
                    .await
                    .map_err(|e| {
                        AppError::Knowledge(format!("Index open task failed: {}", e))
                    })??;
                Ok::<Arc<dyn VectorIndex>, AppError>(Arc::new(index))
            })
            .await?;

        Ok(Arc::clone(index))
    }

    /// Retrieve up to the configured `top_k` passages.
    pub async fn retrieve(&self, question: &str) -> AppResult<RetrievalResult> {
        self.retrieve_k(question, self.top_k).await
    }

    /// Retrieve up to `k` passages scoring at least `min_score`.
    pub async fn retrieve_k(&self, question: &str, k: usize) -> AppResult<RetrievalResult> {
        tracing::info!("Retrieving passages (k={}) for: {}", k, question);

        let vector = self.embedder.embed(question).await?;
        let index = self.index().await?;
        let results = index.query(&vector, k)?;

        if !results.is_empty() {
            let all_scores: Vec<f32> = results.iter().map(|p| p.score).collect();
            tracing::debug!(
                "Retrieved {} passages before filtering - scores: {:?}",
                results.len(),
                all_scores
            );
        }

        let passages: Vec<_> = results
            .into_iter()
            .filter(|p| p.score >= self.min_score)
            .collect();

        if passages.is_empty() {
            tracing::info!(
                "No relevant passages found (all scores below {:.2} threshold)",
                self.min_score
            );
        } else {
            tracing::info!(
                "Retrieved {} relevant passages (top score: {:.3}, lowest: {:.3})",
                passages.len(),
                passages.first().map(|p| p.score).unwrap_or(0.0),
                passages.last().map(|p| p.score).unwrap_or(0.0)
            );
        }

        Ok(RetrievalResult::new(question, passages))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::providers::trigram::TrigramProvider;
    use crate::types::{Passage, PassageMetadata};
    use cosmic_core::config::EmbeddingSettings;

    async fn seeded_retriever(texts: &[(&str, &str)]) -> Retriever {
        let embedder = Arc::new(LazyEmbedder::with_provider(Arc::new(TrigramProvider::new(
            384,
        ))));
        let index = Arc::new(SqliteIndex::open_in_memory().unwrap());

        for (i, (title, text)) in texts.iter().enumerate() {
            let passage = Passage::new(format!("p{}", i), *text, PassageMetadata::titled(*title));
            let embedding = embedder.embed(text).await.unwrap();
            index.upsert(&passage, &embedding).unwrap();
        }

        Retriever::new(embedder, index, 5, MIN_RELEVANCE_SCORE)
    }

    #[tokio::test]
    async fn test_relevant_passage_ranks_first() {
        let retriever = seeded_retriever(&[
            ("Schema.pdf", "Schemaläggning av personal görs i bemanningsvyn."),
            ("Remisser.pdf", "Skapa remiss: öppna remissmodulen och välj mottagare."),
        ])
        .await;

        let result = retriever.retrieve("Hur skapar jag en remiss?").await.unwrap();

        assert!(!result.is_empty());
        assert_eq!(result.passages[0].passage.title(), "Remisser.pdf");
        for pair in result.passages.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[tokio::test]
    async fn test_irrelevant_question_is_empty() {
        let retriever =
            seeded_retriever(&[("Remisser.pdf", "Skapa remiss: öppna remissmodulen.")]).await;

        let result = retriever.retrieve("Vilken färg har himlen?").await.unwrap();
        assert!(result.is_empty());
        assert_eq!(result.max_score(), 0.0);
    }

    #[tokio::test]
    async fn test_empty_store_is_empty() {
        let retriever = seeded_retriever(&[]).await;
        let result = retriever.retrieve("remiss").await.unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_lazy_index_opens_on_first_query() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("index.sqlite");
        let embedder = Arc::new(LazyEmbedder::new(EmbeddingSettings::default()));

        let retriever = Retriever::lazy(embedder, path.clone(), &RetrievalSettings::default());
        assert!(!path.exists());

        let result = retriever.retrieve("remiss").await.unwrap();
        assert!(result.is_empty());
        assert!(path.exists());

        let first = retriever.index().await.unwrap();
        let second = retriever.index().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
