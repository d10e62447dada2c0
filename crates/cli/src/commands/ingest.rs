//! Ingest command handler.

use super::render::print_json;
use clap::Args;
use cosmic_core::{config::AppConfig, AppResult};
use cosmic_knowledge::{ingest_path, LazyEmbedder, SqliteIndex};
use std::path::PathBuf;

/// Ingest documentation into the passage index
#[derive(Args, Debug)]
pub struct IngestCommand {
    /// File or directory to ingest (.jsonl, .md, .txt)
    pub path: PathBuf,

    /// Empty the index before ingesting
    #[arg(long)]
    pub reset: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl IngestCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ingest command for {:?}", self.path);

        let index_path = config.index_path();
        let index = SqliteIndex::open(&index_path)?;
        let embedder = LazyEmbedder::new(config.embedding.clone());

        let stats = ingest_path(&self.path, &embedder, &index, self.reset).await?;

        if self.json {
            print_json(&serde_json::json!({
                "index": index_path,
                "filesCount": stats.files_count,
                "passagesCount": stats.passages_count,
                "skippedCount": stats.skipped_count,
                "durationSecs": stats.duration_secs,
            }))?;
        } else {
            println!(
                "Ingested {} passages from {} files ({} skipped) in {:.2}s",
                stats.passages_count, stats.files_count, stats.skipped_count, stats.duration_secs
            );
        }

        Ok(())
    }
}
