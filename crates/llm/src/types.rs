//! Backend payload types.
//!
//! The two answer backends reply with different shapes. Each shape is its own
//! tagged type and both implement the common [`Answer`] contract, so callers
//! never inspect raw JSON.

use crate::client::LlmResponse;
use serde::{Deserialize, Serialize};

/// One conversation turn as sent to the remote backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    /// "user" or "assistant"
    pub role: String,
    pub content: String,
}

impl ChatTurn {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// A source snippet reported by a backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSnippet {
    pub text: String,

    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Request body for the remote answer backend.
#[derive(Debug, Clone, Serialize)]
pub struct RemoteRequest {
    pub question: String,
    pub history: Vec<ChatTurn>,
}

/// Reply from the remote answer backend.
///
/// `answer` is optional on the wire; a reply without it is malformed and the
/// caller decides what to show. `raw_context` items are either plain strings
/// or `{text|content, metadata}` objects.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoteAnswer {
    #[serde(default)]
    pub answer: Option<String>,

    #[serde(default)]
    pub raw_context: Vec<serde_json::Value>,
}

/// Reply from the local generation backend (`/api/generate`).
#[derive(Debug, Clone, Deserialize)]
pub struct LocalAnswer {
    #[serde(default)]
    pub model: String,
    pub response: String,
    #[serde(default = "default_done")]
    pub done: bool,
    #[serde(default)]
    pub prompt_eval_count: Option<u32>,
    #[serde(default)]
    pub eval_count: Option<u32>,
}

fn default_done() -> bool {
    true
}

/// Common contract over backend replies.
pub trait Answer {
    /// The answer text, or `None` when the backend omitted it.
    fn text(&self) -> Option<&str>;

    /// Source snippets the backend reports for this answer.
    fn sources(&self) -> Vec<ContextSnippet>;
}

impl Answer for RemoteAnswer {
    fn text(&self) -> Option<&str> {
        self.answer.as_deref()
    }

    fn sources(&self) -> Vec<ContextSnippet> {
        self.raw_context.iter().filter_map(snippet_from_value).collect()
    }
}

impl Answer for LocalAnswer {
    fn text(&self) -> Option<&str> {
        Some(&self.response)
    }

    fn sources(&self) -> Vec<ContextSnippet> {
        Vec::new()
    }
}

impl Answer for LlmResponse {
    fn text(&self) -> Option<&str> {
        Some(&self.content)
    }

    fn sources(&self) -> Vec<ContextSnippet> {
        Vec::new()
    }
}

fn snippet_from_value(value: &serde_json::Value) -> Option<ContextSnippet> {
    match value {
        serde_json::Value::String(text) => Some(ContextSnippet {
            text: text.clone(),
            metadata: serde_json::Map::new(),
        }),
        serde_json::Value::Object(obj) => {
            let text = obj
                .get("text")
                .or_else(|| obj.get("content"))
                .or_else(|| obj.get("page_content"))
                .and_then(|v| v.as_str())?
                .to_string();
            let metadata = obj
                .get("metadata")
                .and_then(|v| v.as_object())
                .cloned()
                .unwrap_or_default();
            Some(ContextSnippet { text, metadata })
        }
        _ => None,
    }
}
