//! The local generation seam.
//!
//! A fully assembled prompt goes in, one complete (non-streamed) text comes
//! out. Retrieval and prompt assembly have already happened by then.

use cosmic_core::AppResult;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One generation call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRequest {
    pub prompt: String,

    /// Model identifier, e.g. "llama3.2"
    pub model: String,

    /// Sampling temperature, unset means 0.0
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Upper bound for the whole call; the client default applies when unset
    #[serde(skip)]
    pub timeout: Option<Duration>,
}

impl LlmRequest {
    pub fn new(prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: model.into(),
            temperature: None,
            timeout: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    /// Generated text, untrimmed
    pub content: String,

    /// Model that answered, as reported by the backend
    pub model: String,

    pub usage: LlmUsage,

    pub done: bool,
}

/// Token counts reported by the backend, zero when it reports none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct LlmUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl LlmUsage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
        }
    }

    pub fn total(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// Local generation backend.
///
/// Errors are `AppError::Llm`; the answer generator turns them into answer
/// text.
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    /// Short backend name for logs, e.g. "ollama".
    fn provider_name(&self) -> &str;

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse>;
}
