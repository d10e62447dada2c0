//! Offline embedder hashing word trigrams into a fixed number of buckets.
//!
//! Not semantic, but content-dependent and deterministic: texts sharing
//! content words score high against each other. Used by default and in tests.

use crate::embeddings::provider::EmbeddingProvider;
use cosmic_core::AppResult;
use std::collections::BTreeMap;

/// Function words in Swedish and English; they carry no retrieval signal.
const STOP_WORDS: &[&str] = &[
    "och", "att", "det", "som", "för", "på", "är", "med", "till", "av", "den", "jag", "hur",
    "man", "kan", "ska", "har", "inte", "ett", "en", "om", "vad", "var", "när", "där", "du",
    "vi", "de", "sig", "så", "eller", "men", "från", "efter", "under", "mitt", "min", "din",
    "the", "is", "at", "which", "on", "a", "an", "as", "are", "was", "were", "for", "to", "of",
    "in", "and", "or", "but", "with", "by", "from", "this", "that", "be", "have", "has", "had",
    "it", "its", "their", "they", "them", "how",
];

const TRIGRAM_SEED: u64 = 37;
const WORD_SEED: u64 = 31;

#[derive(Debug)]
pub struct TrigramProvider {
    dimensions: usize,
}

/// Polynomial byte hash reduced to a bucket index.
fn bucket(s: &str, seed: u64, dimensions: usize) -> usize {
    let hash = s
        .bytes()
        .fold(0u64, |acc, b| acc.wrapping_mul(seed).wrapping_add(u64::from(b)));
    (hash as usize) % dimensions
}

/// Lowercased words longer than two characters, stop words removed, with
/// their counts. Sorted, so float accumulation order is stable.
fn word_counts(text: &str) -> BTreeMap<String, u32> {
    let lowered = text.to_lowercase();
    let mut counts = BTreeMap::new();
    for word in lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > 2 && !STOP_WORDS.contains(w))
    {
        *counts.entry(word.to_string()).or_insert(0) += 1;
    }
    counts
}

fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        vector.iter_mut().for_each(|x| *x /= norm);
    }
}

impl TrigramProvider {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];

        for (word, count) in word_counts(text) {
            let chars: Vec<char> = word.chars().collect();
            let trigram_weight = (count as f32).sqrt();
            for window in chars.windows(3) {
                let trigram: String = window.iter().collect();
                vector[bucket(&trigram, TRIGRAM_SEED, self.dimensions)] += trigram_weight;
            }
            vector[bucket(&word, WORD_SEED, self.dimensions)] += count as f32;
        }

        normalize(&mut vector);
        vector
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for TrigramProvider {
    fn name(&self) -> &str {
        "trigram"
    }

    fn model(&self) -> &str {
        "trigram-v1"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        Ok(self.vectorize(text))
    }
}
