//! Chat sessions for the Cosmic knowledge base.
//!
//! Ties retrieval, prompt assembly and generation into one pipeline with
//! persisted conversations and a feedback/retry loop.

pub mod feedback;
pub mod generator;
pub mod pipeline;
pub mod session;
pub mod store;
pub mod types;

#[cfg(test)]
mod tests;

pub use cosmic_prompt::NOT_FOUND_ANSWER;
pub use feedback::{
    FeedbackKey, FeedbackLog, FeedbackRecord, FeedbackStatus, JsonFeedbackLog, Judgment,
    MemoryFeedbackLog,
};
pub use generator::{
    create_generator, shape_answer, split_alternatives, AnswerGenerator, GeneratedAnswer,
    GenerationRequest, PassageSource, RagGenerator, RemoteGenerator, ALTERNATIVE_DELIMITER,
    BACKEND_ERROR_PREFIX, MALFORMED_ANSWER,
};
pub use pipeline::{AppendedMessage, ChatPipeline, StateDelta};
pub use session::{next_conversation_id, Session};
pub use store::{ConversationStore, JsonFileStore, MemoryStore};
pub use types::{conversation_title, ConversationMap, Message, Role, SourceRef};
