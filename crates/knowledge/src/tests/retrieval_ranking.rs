//! Tests for retrieval ranking correctness.

use crate::embeddings::LazyEmbedder;
use crate::index::SqliteIndex;
use crate::retriever::Retriever;
use crate::types::{Passage, PassageMetadata};
use crate::vector_index::VectorIndex;
use cosmic_core::config::EmbeddingSettings;
use std::sync::Arc;
use tempfile::TempDir;

#[cfg(test)]
mod tests {
    use super::*;

    fn passage(id: &str, title: &str, text: &str) -> Passage {
        Passage::new(id, text, PassageMetadata::titled(title))
    }

    /// Helper to create a normalized embedding.
    fn normalize(v: &[f32]) -> Vec<f32> {
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter().map(|x| x / norm).collect()
        } else {
            v.to_vec()
        }
    }

    #[test]
    fn test_scores_are_ordered_descending() {
        let temp_dir = TempDir::new().unwrap();
        let index = SqliteIndex::open(&temp_dir.path().join("index.sqlite")).unwrap();

        let rows = [
            ("p1", normalize(&[0.0, 1.0, 0.0])),
            ("p2", normalize(&[1.0, 0.0, 0.0])),
            ("p3", normalize(&[-1.0, 0.0, 0.0])),
            ("p4", normalize(&[0.7, 0.7, 0.0])),
        ];
        for (id, embedding) in &rows {
            index
                .upsert(&passage(id, "Dok.pdf", "Text"), embedding)
                .unwrap();
        }

        let results = index.query(&normalize(&[1.0, 0.0, 0.0]), 10).unwrap();

        assert_eq!(results.len(), 4);
        for i in 1..results.len() {
            assert!(
                results[i - 1].score >= results[i].score,
                "Scores should be ordered: {} >= {}",
                results[i - 1].score,
                results[i].score
            );
        }

        assert_eq!(results[0].passage.id, "p2");
        assert!(results[0].score > 0.99, "Perfect match should score near 1.0");
        assert_eq!(results[3].passage.id, "p3");
        assert!(results[3].score < -0.9, "Opposite vectors should score near -1.0");
    }

    #[test]
    fn test_top_k_limit_respected() {
        let index = SqliteIndex::open_in_memory().unwrap();

        for i in 0..10 {
            index
                .upsert(
                    &passage(&format!("p{}", i), "Dok.pdf", &format!("Text {}", i)),
                    &normalize(&[1.0, i as f32 / 10.0, 0.0]),
                )
                .unwrap();
        }

        let results = index.query(&normalize(&[1.0, 0.0, 0.0]), 3).unwrap();
        assert_eq!(results.len(), 3, "Should return exactly top_k results");
        assert_eq!(results[0].passage.id, "p0");
    }

    #[tokio::test]
    async fn test_conflicting_procedures_rank_by_question() {
        let embedder = Arc::new(LazyEmbedder::new(EmbeddingSettings::default()));
        let index = Arc::new(SqliteIndex::open_in_memory().unwrap());

        let passages = [
            passage(
                "a",
                "Remisser_2023.pdf",
                "Skapa remiss: klicka på Ny remiss, välj mottagare och signera.",
            ),
            passage(
                "b",
                "Remisser_2019.pdf",
                "Remiss skapas via journalmenyn, välj Remiss och sedan Skicka.",
            ),
            passage(
                "c",
                "Läkemedel.pdf",
                "Ordinera läkemedel genom att öppna läkemedelslistan.",
            ),
        ];
        for p in &passages {
            let embedding = embedder.embed(&p.text).await.unwrap();
            index.upsert(p, &embedding).unwrap();
        }

        let retriever = Retriever::new(embedder, index, 5, 0.20);
        let result = retriever.retrieve("Hur skapar jag en remiss?").await.unwrap();

        assert!(result.len() >= 2);
        assert!(result.passages[0].passage.title().starts_with("Remisser_"));
        assert!(result
            .passages
            .iter()
            .all(|p| p.passage.title() != "Läkemedel.pdf"));
    }
}
