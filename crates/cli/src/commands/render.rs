//! Terminal and JSON rendering shared by the commands.

use cosmic_chat::{split_alternatives, AppendedMessage, Message};
use serde_json::{json, Value};

/// Human-readable form of an assistant message.
///
/// Several alternatives are numbered from 1 so they can be judged one by one.
pub fn answer_text(message: &Message) -> String {
    let alternatives = split_alternatives(&message.content);
    if alternatives.len() <= 1 {
        return message.content.clone();
    }

    alternatives
        .iter()
        .enumerate()
        .map(|(i, alt)| format!("Alternativ {}:\n{}", i + 1, alt))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Unique source titles in rank order.
pub fn source_titles(message: &Message) -> Vec<String> {
    let mut titles: Vec<String> = Vec::new();
    for source in message.sources() {
        let title = source.title();
        if !titles.contains(&title) {
            titles.push(title);
        }
    }
    titles
}

pub fn message_json(appended: &AppendedMessage) -> Value {
    let message = &appended.message;
    json!({
        "index": appended.index,
        "role": message.role.as_str(),
        "content": message.content,
        "alternatives": split_alternatives(&message.content),
        "sources": source_titles(message),
    })
}

pub fn print_json(value: &Value) -> cosmic_core::AppResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosmic_chat::SourceRef;
    use cosmic_knowledge::PassageMetadata;

    fn source(title: &str) -> SourceRef {
        SourceRef {
            text: "steg".to_string(),
            metadata: PassageMetadata::titled(title),
        }
    }

    #[test]
    fn test_single_answer_is_unchanged() {
        let message = Message::assistant("Klicka på Ny remiss.\n\nKÄLLA: A.pdf", Vec::new());
        assert_eq!(answer_text(&message), message.content);
    }

    #[test]
    fn test_alternatives_are_numbered() {
        let message = Message::assistant("Ett\n---ALTERNATIV---\nTvå", Vec::new());
        let text = answer_text(&message);
        assert!(text.starts_with("Alternativ 1:\nEtt"));
        assert!(text.contains("Alternativ 2:\nTvå"));
    }

    #[test]
    fn test_source_titles_deduplicated() {
        let message = Message::assistant(
            "svar",
            vec![source("B.pdf"), source("A.pdf"), source("B.pdf")],
        );
        assert_eq!(source_titles(&message), vec!["B.pdf", "A.pdf"]);
    }
}
