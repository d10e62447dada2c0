//! Populate the passage index from files on disk.
//!
//! Supported inputs:
//! - `.jsonl`: one `{"id"?, "text", "metadata"}` passage per line
//! - `.md` / `.txt`: split on blank lines, each paragraph titled by the file stem

use crate::embeddings::LazyEmbedder;
use crate::types::{IngestStats, Passage, PassageMetadata};
use crate::vector_index::VectorIndex;
use cosmic_core::{AppError, AppResult};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::time::Instant;
use walkdir::WalkDir;

/// One line of a `.jsonl` passage file.
#[derive(Debug, Deserialize)]
struct PassageRecord {
    #[serde(default)]
    id: Option<String>,
    text: String,
    #[serde(default)]
    metadata: PassageMetadata,
}

/// Ingest a file or directory tree into `index`.
///
/// Unreadable or unsupported files are skipped and counted. With `reset` the
/// index is emptied first.
pub async fn ingest_path(
    path: &Path,
    embedder: &LazyEmbedder,
    index: &dyn VectorIndex,
    reset: bool,
) -> AppResult<IngestStats> {
    let start = Instant::now();

    if !path.exists() {
        return Err(AppError::Knowledge(format!(
            "Path does not exist: {}",
            path.display()
        )));
    }

    tracing::info!("Starting ingestion from {:?}", path);

    if reset {
        tracing::info!("Resetting passage index");
        index.reset()?;
    }

    let mut stats = IngestStats::default();

    let files: Vec<_> = if path.is_file() {
        vec![path.to_path_buf()]
    } else {
        WalkDir::new(path)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .collect()
    };

    for file in files {
        let passages = match read_passages(&file) {
            Ok(Some(passages)) => passages,
            Ok(None) => {
                tracing::debug!("Skipping unsupported file {:?}", file);
                stats.skipped_count += 1;
                continue;
            }
            Err(e) => {
                tracing::warn!("Skipping {:?}: {}", file, e);
                stats.skipped_count += 1;
                continue;
            }
        };

        let texts: Vec<String> = passages.iter().map(|p| p.text.clone()).collect();
        let embeddings = embedder.embed_texts(&texts).await?;

        for (passage, embedding) in passages.iter().zip(embeddings.iter()) {
            index.upsert(passage, embedding)?;
        }

        tracing::debug!("Processed {:?}: {} passages", file, passages.len());
        stats.files_count += 1;
        stats.passages_count += passages.len() as u32;
    }

    stats.duration_secs = start.elapsed().as_secs_f64();

    tracing::info!(
        "Ingestion completed: {} files, {} passages, {} skipped in {:.2}s",
        stats.files_count,
        stats.passages_count,
        stats.skipped_count,
        stats.duration_secs
    );

    Ok(stats)
}

/// Passages from one file, `None` for unsupported extensions.
fn read_passages(path: &Path) -> AppResult<Option<Vec<Passage>>> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());

    match extension.as_deref() {
        Some("jsonl") => {
            let content = std::fs::read_to_string(path)?;
            parse_jsonl(&content).map(Some)
        }
        Some("md") | Some("markdown") | Some("txt") => {
            let content = std::fs::read_to_string(path)?;
            let title = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default();

            let mut metadata = PassageMetadata::titled(title);
            metadata.extra.insert(
                "source".to_string(),
                serde_json::Value::String(path.display().to_string()),
            );

            Ok(Some(split_paragraphs(&content, &metadata)))
        }
        _ => Ok(None),
    }
}

/// Parse a `.jsonl` passage file. Blank lines are ignored.
pub fn parse_jsonl(content: &str) -> AppResult<Vec<Passage>> {
    let mut passages = Vec::new();

    for (line_no, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        let record: PassageRecord = serde_json::from_str(line).map_err(|e| {
            AppError::Knowledge(format!("Invalid passage on line {}: {}", line_no + 1, e))
        })?;

        if record.text.trim().is_empty() {
            continue;
        }

        let id = record
            .id
            .unwrap_or_else(|| passage_id(&record.metadata.title, &record.text));
        passages.push(Passage::new(id, record.text, record.metadata));
    }

    Ok(passages)
}

/// Split plain text into paragraph passages sharing `metadata`.
pub fn split_paragraphs(content: &str, metadata: &PassageMetadata) -> Vec<Passage> {
    let mut passages = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in content.lines() {
        if line.trim().is_empty() {
            push_paragraph(&mut passages, &mut current, metadata);
        } else {
            current.push(line);
        }
    }
    push_paragraph(&mut passages, &mut current, metadata);

    passages
}

fn push_paragraph(passages: &mut Vec<Passage>, lines: &mut Vec<&str>, metadata: &PassageMetadata) {
    let text = lines.join("\n").trim().to_string();
    lines.clear();
    if !text.is_empty() {
        let id = passage_id(&metadata.title, &text);
        passages.push(Passage::new(id, text, metadata.clone()));
    }
}

/// Stable passage id: hex SHA-256 of title and text.
pub fn passage_id(title: &str, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    hasher.update([0u8]);
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
