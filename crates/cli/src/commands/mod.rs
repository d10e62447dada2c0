//! Command handlers for the cosmic CLI.

pub mod ask;
pub mod chat;
pub mod history;
pub mod ingest;
mod render;

pub use ask::AskCommand;
pub use chat::ChatCommand;
pub use history::HistoryCommand;
pub use ingest::IngestCommand;
