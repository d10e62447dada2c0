//! Prompt types for the Cosmic chat.

use serde::{Deserialize, Serialize};

/// Fixed answer when no passage contains the requested information.
pub const NOT_FOUND_ANSWER: &str =
    "Jag hittar ingen information om det i Cosmic-dokumentationen.";

/// Line prefix of the source citation at the end of an answer.
pub const CITATION_PREFIX: &str = "KÄLLA:";

/// Marker after which the generator writes its answer.
pub const ANSWER_CUE: &str = "SVAR:";

/// Prompt id looked up in `.cosmic/prompts/` for workspace overrides.
pub const DEFAULT_PROMPT_ID: &str = "cosmic.answer";

/// A prompt definition loaded from YAML.
///
/// `system` replaces the built-in instruction block, `template` the full
/// layout. Either may be omitted to keep the built-in one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptDefinition {
    /// Unique prompt identifier
    pub id: String,

    /// Human-readable title
    pub title: String,

    /// API version for schema evolution
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Creator identifier
    #[serde(rename = "createdBy", default)]
    pub created_by: String,

    /// Instruction block with Handlebars syntax
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// Full prompt layout with Handlebars syntax
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
}

/// A fully assembled prompt ready for the generation backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssembledPrompt {
    pub text: String,

    pub metadata: AssembledPromptMetadata,
}

/// Metadata about an assembled prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssembledPromptMetadata {
    /// Source prompt ID, `builtin` without an override
    #[serde(rename = "sourcePromptId")]
    pub source_prompt_id: String,

    #[serde(rename = "passageCount")]
    pub passage_count: usize,

    #[serde(rename = "historyTurns")]
    pub history_turns: usize,
}

/// Template view of one passage.
#[derive(Debug, Serialize)]
pub(crate) struct PassageView<'a> {
    pub title: String,
    pub text: &'a str,
}

/// Template view of one prior turn.
#[derive(Debug, Serialize)]
pub(crate) struct TurnView<'a> {
    pub label: &'a str,
    pub content: &'a str,
}

/// Everything the templates can reference.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PromptContext<'a> {
    pub passages: Vec<PassageView<'a>>,
    pub history: Vec<TurnView<'a>>,
    pub question: &'a str,
    pub not_found: &'static str,
    pub citation_prefix: &'static str,
    pub answer_cue: &'static str,
}
