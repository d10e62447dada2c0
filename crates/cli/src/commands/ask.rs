//! Ask command handler.
//!
//! Answers one question. With `--user` the exchange is saved to that user's
//! history as a new conversation, otherwise nothing is persisted.

use super::render::{answer_text, message_json, print_json, source_titles};
use clap::Args;
use cosmic_chat::{ChatPipeline, JsonFileStore, MemoryStore, Session};
use cosmic_core::{config::AppConfig, AppError, AppResult};
use std::sync::Arc;

/// Ask a single question
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: Vec<String>,

    /// Save the exchange to this user's history
    #[arg(short, long)]
    pub user: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");

        let question = self.question.join(" ");
        if question.trim().is_empty() {
            return Err(AppError::Chat("No question provided".to_string()));
        }
        tracing::debug!("Question: {}", question);

        let pipeline = ChatPipeline::from_config(config)?;

        let mut session = match &self.user {
            Some(user) => {
                let store = Arc::new(JsonFileStore::new(config.history_dir()));
                Session::open(user.as_str(), store)?
            }
            None => Session::new("anonym", Arc::new(MemoryStore::new())),
        };
        if !session.active_messages().is_empty() || session.active_id().is_none() {
            session.create_conversation()?;
        }

        let delta = pipeline.on_submit_question(&mut session, &question).await?;
        let Some(answer) = delta.answer() else {
            return Err(AppError::Chat("No answer produced".to_string()));
        };

        if self.json {
            let answer_entry = delta
                .messages
                .iter()
                .rev()
                .find(|m| m.message.is_assistant())
                .map(message_json);
            print_json(&serde_json::json!({
                "conversationId": delta.conversation_id,
                "backend": pipeline.backend_name(),
                "question": question,
                "answer": answer_entry,
            }))?;
        } else {
            println!("{}", answer_text(answer));
            let titles = source_titles(answer);
            if !titles.is_empty() {
                println!("\nKällor: {}", titles.join(", "));
            }
        }

        Ok(())
    }
}
