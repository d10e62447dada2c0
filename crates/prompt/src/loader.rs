//! Prompt loader for YAML prompt definitions.

use crate::types::PromptDefinition;
use cosmic_core::{AppError, AppResult};
use std::path::{Path, PathBuf};

fn prompt_file(workspace_path: &Path, prompt_id: &str) -> PathBuf {
    workspace_path
        .join(".cosmic/prompts")
        .join(format!("{}.yml", prompt_id))
}

/// Load a prompt definition by ID from `.cosmic/prompts/<id>.yml`.
///
/// # Example
/// ```no_run
/// use cosmic_prompt::load_prompt;
/// use std::path::Path;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let prompt = load_prompt(Path::new("."), "cosmic.answer")?;
/// println!("Loaded prompt: {}", prompt.title);
/// # Ok(())
/// # }
/// ```
pub fn load_prompt(workspace_path: &Path, prompt_id: &str) -> AppResult<PromptDefinition> {
    load_optional_prompt(workspace_path, prompt_id)?.ok_or_else(|| {
        AppError::Prompt(format!(
            "Prompt file not found: {:?}",
            prompt_file(workspace_path, prompt_id)
        ))
    })
}

/// Like [`load_prompt`], but a missing file is `Ok(None)`.
///
/// A file that exists but does not parse is still an error.
pub fn load_optional_prompt(
    workspace_path: &Path,
    prompt_id: &str,
) -> AppResult<Option<PromptDefinition>> {
    let prompt_file = prompt_file(workspace_path, prompt_id);

    tracing::debug!("Loading prompt from: {:?}", prompt_file);

    if !prompt_file.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&prompt_file).map_err(|e| {
        AppError::Prompt(format!(
            "Failed to read prompt file {:?}: {}",
            prompt_file, e
        ))
    })?;

    let definition: PromptDefinition = serde_yaml::from_str(&contents).map_err(|e| {
        AppError::Prompt(format!(
            "Failed to parse prompt YAML {:?}: {}",
            prompt_file, e
        ))
    })?;

    validate_prompt(&definition)?;

    tracing::info!("Loaded prompt: {} ({})", definition.id, definition.title);

    Ok(Some(definition))
}

/// Validate a prompt definition.
fn validate_prompt(def: &PromptDefinition) -> AppResult<()> {
    if def.id.is_empty() {
        return Err(AppError::Prompt("Prompt ID cannot be empty".to_string()));
    }

    if def.title.is_empty() {
        return Err(AppError::Prompt("Prompt title cannot be empty".to_string()));
    }

    if !def.api_version.contains('.') {
        return Err(AppError::Prompt(format!(
            "Invalid apiVersion format: '{}'. Expected format: 'x.y'",
            def.api_version
        )));
    }

    let is_blank = |part: &Option<String>| part.as_deref().is_some_and(|s| s.trim().is_empty());
    if is_blank(&def.system) || is_blank(&def.template) {
        return Err(AppError::Prompt(
            "Prompt system and template cannot be empty when given".to_string(),
        ));
    }

    if def.system.is_none() && def.template.is_none() {
        return Err(AppError::Prompt(
            "Prompt must override at least one of system or template".to_string(),
        ));
    }

    Ok(())
}
