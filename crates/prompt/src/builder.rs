//! Context assembler: renders passages and history into one prompt.

use crate::loader::load_optional_prompt;
use crate::types::{
    AssembledPrompt, AssembledPromptMetadata, PassageView, PromptContext, PromptDefinition,
    TurnView, ANSWER_CUE, CITATION_PREFIX, DEFAULT_PROMPT_ID, NOT_FOUND_ANSWER,
};
use cosmic_core::{AppError, AppResult};
use cosmic_knowledge::Passage;
use cosmic_llm::ChatTurn;
use handlebars::Handlebars;
use std::path::Path;

const BUILTIN_ID: &str = "builtin";

const DEFAULT_SYSTEM: &str = r#"Du är en assistent för journalsystemet Cosmic. Svara på svenska och endast utifrån dokumentutdragen under KONTEXT.

Regler:
1. Om utdragen beskriver olika tillvägagångssätt, välj ett sammanhängande tillvägagångssätt från ett dokument. Blanda aldrig steg från olika dokument.
2. Avsluta alltid svaret med en egen rad "{{citationPrefix}} <dokumentnamn>" som namnger det eller de dokument du använt.
3. Om inget utdrag innehåller informationen, svara exakt: "{{notFound}}""#;

const DEFAULT_TEMPLATE: &str = r#"{{> system}}

KONTEXT:
{{#each passages}}
[{{this.title}}]
{{this.text}}

{{/each}}
{{#if history}}
TIDIGARE KONVERSATION:
{{#each history}}
{{this.label}}: {{this.content}}
{{/each}}

{{/if}}
FRÅGA: {{question}}

{{answerCue}}"#;

/// Renders the fixed five-part prompt: instructions, context, transcript,
/// question, answer cue.
///
/// Rendering is deterministic: identical inputs give identical text.
pub struct ContextAssembler {
    registry: Handlebars<'static>,
    source_prompt_id: String,
}

impl ContextAssembler {
    /// Assembler with the built-in template.
    pub fn new() -> AppResult<Self> {
        Self::build(BUILTIN_ID.to_string(), DEFAULT_SYSTEM, DEFAULT_TEMPLATE)
    }

    /// Assembler using the parts a YAML definition overrides.
    pub fn from_definition(definition: &PromptDefinition) -> AppResult<Self> {
        let system = definition.system.as_deref().unwrap_or(DEFAULT_SYSTEM);
        let template = definition.template.as_deref().unwrap_or(DEFAULT_TEMPLATE);
        Self::build(definition.id.clone(), system, template)
    }

    /// Assembler for a workspace: uses `.cosmic/prompts/cosmic.answer.yml`
    /// when present, the built-in template otherwise.
    pub fn for_workspace(workspace_path: &Path) -> AppResult<Self> {
        match load_optional_prompt(workspace_path, DEFAULT_PROMPT_ID)? {
            Some(definition) => {
                tracing::info!("Using prompt override: {}", definition.id);
                Self::from_definition(&definition)
            }
            None => Self::new(),
        }
    }

    fn build(source_prompt_id: String, system: &str, template: &str) -> AppResult<Self> {
        let mut registry = Handlebars::new();

        // Prompts are plain text
        registry.register_escape_fn(handlebars::no_escape);

        registry
            .register_template_string("system", system)
            .map_err(|e| AppError::Prompt(format!("Failed to register system block: {}", e)))?;
        registry
            .register_template_string("prompt", template)
            .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

        Ok(Self {
            registry,
            source_prompt_id,
        })
    }

    pub fn source_prompt_id(&self) -> &str {
        &self.source_prompt_id
    }

    /// Assemble the prompt for `question`.
    ///
    /// `passages` are listed in rank order, each under its document title.
    /// `history` is the transcript before the question.
    pub fn assemble(
        &self,
        question: &str,
        passages: &[Passage],
        history: &[ChatTurn],
    ) -> AppResult<AssembledPrompt> {
        tracing::debug!(
            "Assembling prompt '{}' with {} passages and {} prior turns",
            self.source_prompt_id,
            passages.len(),
            history.len()
        );

        let context = PromptContext {
            passages: passages
                .iter()
                .map(|p| PassageView {
                    title: p.title(),
                    text: p.text.trim(),
                })
                .collect(),
            history: history
                .iter()
                .map(|turn| TurnView {
                    label: role_label(&turn.role),
                    content: turn.content.trim(),
                })
                .collect(),
            question: question.trim(),
            not_found: NOT_FOUND_ANSWER,
            citation_prefix: CITATION_PREFIX,
            answer_cue: ANSWER_CUE,
        };

        let text = self
            .registry
            .render("prompt", &context)
            .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))?;

        Ok(AssembledPrompt {
            text,
            metadata: AssembledPromptMetadata {
                source_prompt_id: self.source_prompt_id.clone(),
                passage_count: passages.len(),
                history_turns: history.len(),
            },
        })
    }
}

/// Transcript label for a role.
fn role_label(role: &str) -> &str {
    match role {
        "user" => "Användare",
        "assistant" => "Assistent",
        other => other,
    }
}
