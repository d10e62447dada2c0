//! Knowledge base for the Cosmic chat.
//!
//! Local-first retrieval: passages are embedded, stored in SQLite and ranked
//! by cosine similarity against the question.

pub mod embeddings;
pub mod index;
pub mod ingest;
pub mod retriever;
pub mod types;
pub mod vector_index;

#[cfg(test)]
mod tests;

pub use embeddings::{create_provider, EmbeddingProvider, LazyEmbedder};
pub use index::SqliteIndex;
pub use ingest::{ingest_path, passage_id};
pub use retriever::{Retriever, MIN_RELEVANCE_SCORE};
pub use types::{
    title_text, IngestStats, Passage, PassageMetadata, RetrievalResult, ScoredPassage,
    UNKNOWN_DOCUMENT,
};
pub use vector_index::{cosine_similarity, VectorIndex};
