//! Conversation data model.

use cosmic_knowledge::{passage_id, title_text, Passage, PassageMetadata};
use cosmic_llm::{ChatTurn, ContextSnippet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// All conversations of one user, keyed by conversation id.
pub type ConversationMap = BTreeMap<String, Vec<Message>>;

/// Length of the message prefix used as a conversation title.
const TITLE_CHARS: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A passage an assistant answer was grounded in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    pub text: String,

    #[serde(default)]
    pub metadata: PassageMetadata,
}

impl SourceRef {
    pub fn title(&self) -> String {
        self.metadata.display_title()
    }

    /// The passage this source refers to, for reuse on retry.
    pub fn to_passage(&self) -> Passage {
        let id = passage_id(&self.metadata.title, &self.text);
        Passage::new(id, self.text.clone(), self.metadata.clone())
    }
}

impl From<&Passage> for SourceRef {
    fn from(passage: &Passage) -> Self {
        Self {
            text: passage.text.clone(),
            metadata: passage.metadata.clone(),
        }
    }
}

impl From<ContextSnippet> for SourceRef {
    fn from(snippet: ContextSnippet) -> Self {
        let mut extra = snippet.metadata;
        let title = extra
            .remove("title")
            .map(|value| title_text(&value))
            .unwrap_or_default();

        Self {
            text: snippet.text,
            metadata: PassageMetadata { title, extra },
        }
    }
}

/// One chat message.
///
/// Serialized as `{role, content, sources?}`, the layout of the history file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<SourceRef>>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            sources: None,
        }
    }

    /// Assistant message; an empty source list is stored as no sources.
    pub fn assistant(content: impl Into<String>, sources: Vec<SourceRef>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            sources: if sources.is_empty() {
                None
            } else {
                Some(sources)
            },
        }
    }

    pub fn is_assistant(&self) -> bool {
        self.role == Role::Assistant
    }

    pub fn sources(&self) -> &[SourceRef] {
        self.sources.as_deref().unwrap_or_default()
    }

    pub fn to_turn(&self) -> ChatTurn {
        ChatTurn::new(self.role.as_str(), self.content.clone())
    }
}

/// Sidebar title: the first message prefix, or a dated fallback.
pub fn conversation_title(id: &str, messages: &[Message]) -> String {
    match messages.first() {
        Some(first) => {
            let prefix: String = first.content.chars().take(TITLE_CHARS).collect();
            format!("{}...", prefix)
        }
        None => format!("Chatt från {}", id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_wire_format() {
        let message = Message::user("Hur skapar jag en remiss?");
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"role": "user", "content": "Hur skapar jag en remiss?"})
        );

        let assistant = Message::assistant(
            "Svar\n\nKÄLLA: Remisser.pdf",
            vec![SourceRef {
                text: "Skapa remiss".to_string(),
                metadata: PassageMetadata::titled("Remisser.pdf"),
            }],
        );
        let json = serde_json::to_value(&assistant).unwrap();
        assert_eq!(json["sources"][0]["metadata"]["title"], "Remisser.pdf");
    }

    #[test]
    fn test_original_history_entries_parse() {
        let json = r#"{"role": "assistant", "content": "Hej"}"#;
        let message: Message = serde_json::from_str(json).unwrap();
        assert!(message.is_assistant());
        assert!(message.sources().is_empty());
    }

    #[test]
    fn test_assistant_without_sources() {
        let message = Message::assistant("Svar", Vec::new());
        assert!(message.sources.is_none());
    }

    #[test]
    fn test_conversation_title() {
        let messages = vec![Message::user(
            "Hur gör jag för att skapa en remiss till röntgenavdelningen?",
        )];
        assert_eq!(
            conversation_title("2024-05-01 10:00:00.000", &messages),
            "Hur gör jag för att skapa en remiss till..."
        );
        assert_eq!(
            conversation_title("2024-05-01 10:00:00.000", &[]),
            "Chatt från 2024-05-01 10:00:00.000"
        );
    }

    #[test]
    fn test_source_from_snippet_lifts_title() {
        let mut metadata = serde_json::Map::new();
        metadata.insert("title".to_string(), "Remisser.pdf".into());
        metadata.insert("page".to_string(), 4.into());

        let source = SourceRef::from(ContextSnippet {
            text: "Skapa remiss".to_string(),
            metadata,
        });

        assert_eq!(source.title(), "Remisser.pdf");
        assert_eq!(source.metadata.extra["page"], 4);
        assert!(!source.metadata.extra.contains_key("title"));
    }

    #[test]
    fn test_source_from_snippet_stringifies_title() {
        let snippet = |title: serde_json::Value| {
            let mut metadata = serde_json::Map::new();
            metadata.insert("title".to_string(), title);
            SourceRef::from(ContextSnippet {
                text: "Skapa remiss".to_string(),
                metadata,
            })
        };

        let numeric = snippet(7.into());
        assert_eq!(numeric.metadata.title, "7");
        assert!(!numeric.metadata.extra.contains_key("title"));

        let null = snippet(serde_json::Value::Null);
        assert_eq!(null.metadata.title, "");
        assert!(null.metadata.extra.is_empty());
        assert_eq!(null.title(), cosmic_knowledge::UNKNOWN_DOCUMENT);
    }
}
