//! Vector index abstraction for passages.
//!
//! Defines a trait for provider-agnostic vector storage and retrieval.

use crate::types::{Passage, ScoredPassage};
use cosmic_core::AppResult;

/// Trait for vector index backends.
///
/// Implementations are shared process-wide behind an `Arc`, so every method
/// takes `&self`. Requirements:
/// - `query` returns at most `k` passages ordered by non-increasing score
/// - `k` larger than the store returns everything
/// - an empty store returns an empty vector, never an error
pub trait VectorIndex: Send + Sync {
    /// Insert or replace a passage with its embedding.
    fn upsert(&self, passage: &Passage, embedding: &[f32]) -> AppResult<()>;

    /// Top-k most similar passages to the query vector.
    fn query(&self, vector: &[f32], k: usize) -> AppResult<Vec<ScoredPassage>>;

    /// Number of stored passages.
    fn count(&self) -> AppResult<usize>;

    /// Remove all passages.
    fn reset(&self) -> AppResult<()>;
}

/// Cosine similarity between two vectors.
///
/// Mismatched lengths and zero vectors score 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}
