//! Context assembly for the Cosmic chat.
//!
//! This crate turns a question, retrieved passages and the prior transcript
//! into one prompt for the generation backend:
//! - Built-in Handlebars template with the answer rules
//! - Optional YAML overrides in `.cosmic/prompts/`

pub mod builder;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::ContextAssembler;
pub use loader::{load_optional_prompt, load_prompt};
pub use types::{
    AssembledPrompt, AssembledPromptMetadata, PromptDefinition, ANSWER_CUE, CITATION_PREFIX,
    DEFAULT_PROMPT_ID, NOT_FOUND_ANSWER,
};
