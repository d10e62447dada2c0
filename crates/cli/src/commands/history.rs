//! History command handler.

use super::render::print_json;
use clap::Args;
use cosmic_chat::{conversation_title, ConversationStore, JsonFileStore};
use cosmic_core::{config::AppConfig, AppResult};

/// List a user's saved conversations, newest first
#[derive(Args, Debug)]
pub struct HistoryCommand {
    /// User name
    #[arg(short, long, env = "COSMIC_USER")]
    pub user: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl HistoryCommand {
    pub fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Listing history for user '{}'", self.user);

        // Read only; listing never creates a conversation
        let store = JsonFileStore::new(config.history_dir());
        let conversations = store.load(&self.user)?;

        if self.json {
            let entries: Vec<_> = conversations
                .iter()
                .rev()
                .map(|(id, messages)| {
                    serde_json::json!({
                        "id": id,
                        "title": conversation_title(id, messages),
                        "messageCount": messages.len(),
                    })
                })
                .collect();
            print_json(&serde_json::json!({
                "user": self.user,
                "conversations": entries,
            }))?;
            return Ok(());
        }

        if conversations.is_empty() {
            println!("Ingen sparad historik för {}", self.user);
            return Ok(());
        }

        for (n, (id, messages)) in conversations.iter().rev().enumerate() {
            println!("{:>3}. {}  {}", n + 1, id, conversation_title(id, messages));
        }

        Ok(())
    }
}
