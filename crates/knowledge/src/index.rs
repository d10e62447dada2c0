//! SQLite-backed vector index for passages.

use crate::types::{Passage, PassageMetadata, ScoredPassage};
use crate::vector_index::{cosine_similarity, VectorIndex};
use cosmic_core::{AppError, AppResult};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Passage index stored in a single SQLite file.
///
/// The connection is opened once and kept for the lifetime of the index.
/// Similarity is computed in-process over all stored embeddings.
pub struct SqliteIndex {
    conn: Mutex<Connection>,
}

impl SqliteIndex {
    /// Open (or create) the index database at `db_path`.
    pub fn open(db_path: &Path) -> AppResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::Knowledge(format!("Failed to create index directory: {}", e))
            })?;
        }

        let conn = Connection::open(db_path)
            .map_err(|e| AppError::Knowledge(format!("Failed to open SQLite index: {}", e)))?;

        tracing::debug!("Opened SQLite index at {:?}", db_path);
        Self::with_connection(conn)
    }

    /// In-memory index, used by tests and one-off runs.
    pub fn open_in_memory() -> AppResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| AppError::Knowledge(format!("Failed to open SQLite index: {}", e)))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> AppResult<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS passages (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                text TEXT NOT NULL,
                embedding BLOB NOT NULL,
                metadata TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_passages_title ON passages(title);
            "#,
        )
        .map_err(|e| AppError::Knowledge(format!("Failed to create tables: {}", e)))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::Knowledge("SQLite index lock poisoned".to_string()))
    }
}

impl VectorIndex for SqliteIndex {
    fn upsert(&self, passage: &Passage, embedding: &[f32]) -> AppResult<()> {
        let metadata_json = serde_json::to_string(&passage.metadata)
            .map_err(|e| AppError::Knowledge(format!("Failed to serialize metadata: {}", e)))?;

        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO passages (id, title, text, embedding, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                passage.id,
                passage.title(),
                passage.text,
                embedding_to_bytes(embedding),
                metadata_json,
            ],
        )
        .map_err(|e| AppError::Knowledge(format!("Failed to insert passage: {}", e)))?;

        Ok(())
    }

    fn query(&self, vector: &[f32], k: usize) -> AppResult<Vec<ScoredPassage>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT id, text, embedding, metadata FROM passages ORDER BY rowid")
            .map_err(|e| AppError::Knowledge(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map([], |row| {
                let id: String = row.get(0)?;
                let text: String = row.get(1)?;
                let embedding_bytes: Vec<u8> = row.get(2)?;
                let metadata_json: String = row.get(3)?;
                Ok((id, text, embedding_bytes, metadata_json))
            })
            .map_err(|e| AppError::Knowledge(format!("Failed to query passages: {}", e)))?;

        let mut results = Vec::new();
        for row in rows {
            let (id, text, embedding_bytes, metadata_json) =
                row.map_err(|e| AppError::Knowledge(format!("Failed to read passage: {}", e)))?;

            let embedding = match bytes_to_embedding(&embedding_bytes) {
                Ok(embedding) => embedding,
                Err(e) => {
                    tracing::warn!("Skipping passage {} with corrupt embedding: {}", id, e);
                    continue;
                }
            };

            let metadata: PassageMetadata =
                serde_json::from_str(&metadata_json).unwrap_or_default();

            let score = cosine_similarity(vector, &embedding);
            results.push(ScoredPassage {
                passage: Passage { id, text, metadata },
                score,
            });
        }

        // Stable sort: equal scores keep insertion order
        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(k);

        tracing::debug!("Retrieved {} passages (requested top-{})", results.len(), k);

        Ok(results)
    }

    fn count(&self) -> AppResult<usize> {
        let conn = self.lock()?;
        conn.query_row("SELECT COUNT(*) FROM passages", [], |row| {
            row.get::<_, i64>(0).map(|v| v as usize)
        })
        .map_err(|e| AppError::Knowledge(format!("Failed to count passages: {}", e)))
    }

    fn reset(&self) -> AppResult<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM passages", [])
            .map_err(|e| AppError::Knowledge(format!("Failed to delete passages: {}", e)))?;

        tracing::info!("Reset passage index");
        Ok(())
    }
}

/// Convert embedding vector to bytes for storage.
fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for &value in embedding {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Convert bytes back to embedding vector.
fn bytes_to_embedding(bytes: &[u8]) -> AppResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(AppError::Knowledge(
            "Invalid embedding bytes length".to_string(),
        ));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn passage(id: &str, title: &str, text: &str) -> Passage {
        Passage::new(id, text, PassageMetadata::titled(title))
    }

    #[test]
    fn test_empty_store_returns_empty() {
        let index = SqliteIndex::open_in_memory().unwrap();
        let results = index.query(&[1.0, 0.0, 0.0], 5).unwrap();
        assert!(results.is_empty());
        assert_eq!(index.count().unwrap(), 0);
    }

    #[test]
    fn test_insert_and_query() {
        let index = SqliteIndex::open_in_memory().unwrap();
        index
            .upsert(&passage("p1", "Remisser.pdf", "test text"), &[1.0, 0.0, 0.0])
            .unwrap();

        let results = index.query(&[1.0, 0.0, 0.0], 5).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].passage.id, "p1");
        assert_eq!(results[0].passage.metadata.title, "Remisser.pdf");
        assert!((results[0].score - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_k_larger_than_store() {
        let index = SqliteIndex::open_in_memory().unwrap();
        index.upsert(&passage("a", "A", "a"), &[1.0, 0.0]).unwrap();
        index.upsert(&passage("b", "B", "b"), &[0.0, 1.0]).unwrap();

        assert_eq!(index.query(&[1.0, 1.0], 100).unwrap().len(), 2);
        assert!(index.query(&[1.0, 1.0], 0).unwrap().is_empty());
    }

    #[test]
    fn test_upsert_replaces_by_id() {
        let index = SqliteIndex::open_in_memory().unwrap();
        index.upsert(&passage("a", "A", "old"), &[1.0, 0.0]).unwrap();
        index.upsert(&passage("a", "A", "new"), &[1.0, 0.0]).unwrap();

        assert_eq!(index.count().unwrap(), 1);
        let results = index.query(&[1.0, 0.0], 1).unwrap();
        assert_eq!(results[0].passage.text, "new");
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let index = SqliteIndex::open_in_memory().unwrap();
        for id in ["first", "second", "third"] {
            index.upsert(&passage(id, id, id), &[1.0, 0.0]).unwrap();
        }

        let ids: Vec<String> = index
            .query(&[1.0, 0.0], 3)
            .unwrap()
            .into_iter()
            .map(|r| r.passage.id)
            .collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_reset() {
        let index = SqliteIndex::open_in_memory().unwrap();
        index.upsert(&passage("a", "A", "a"), &[1.0]).unwrap();
        index.reset().unwrap();
        assert_eq!(index.count().unwrap(), 0);
    }

    #[test]
    fn test_persists_across_reopen() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested/index.sqlite");

        {
            let index = SqliteIndex::open(&path).unwrap();
            index.upsert(&passage("a", "A", "kept"), &[0.5, 0.5]).unwrap();
        }

        let reopened = SqliteIndex::open(&path).unwrap();
        assert_eq!(reopened.count().unwrap(), 1);
    }

    #[test]
    fn test_embedding_bytes_round_trip() {
        let embedding = vec![0.25, -1.5, 3.0];
        let bytes = embedding_to_bytes(&embedding);
        assert_eq!(bytes_to_embedding(&bytes).unwrap(), embedding);
        assert!(bytes_to_embedding(&bytes[..5]).is_err());
    }
}
