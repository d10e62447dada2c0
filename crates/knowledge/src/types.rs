//! Knowledge system type definitions.

use serde::{Deserialize, Deserializer, Serialize};

/// Title used when a passage carries no document name at all.
pub const UNKNOWN_DOCUMENT: &str = "Okänt dokument";

/// Metadata attached to a passage.
///
/// `title` is the document name shown in citations. Any other keys from the
/// source (page, section, url, ...) are kept verbatim in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PassageMetadata {
    #[serde(
        default,
        skip_serializing_if = "String::is_empty",
        deserialize_with = "lenient_title"
    )]
    pub title: String,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Text form of a `title` value from foreign metadata.
///
/// Null becomes empty, numbers and other scalars their JSON text.
pub fn title_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn lenient_title<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.as_ref().map(title_text).unwrap_or_default())
}

impl PassageMetadata {
    /// Metadata with only a title.
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            extra: serde_json::Map::new(),
        }
    }

    /// Document name for citations.
    ///
    /// Falls back to `document_name` or the file name in `source` when no
    /// title was stored.
    pub fn display_title(&self) -> String {
        if !self.title.trim().is_empty() {
            return self.title.trim().to_string();
        }

        for key in ["document_name", "source"] {
            if let Some(value) = self.extra.get(key).and_then(|v| v.as_str()) {
                let name = value.rsplit(['/', '\\']).next().unwrap_or(value).trim();
                if !name.is_empty() {
                    return name.to_string();
                }
            }
        }

        UNKNOWN_DOCUMENT.to_string()
    }
}

/// A chunk of source-document text stored in the vector store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    /// Stable identifier used for upserts
    pub id: String,

    pub text: String,

    #[serde(default)]
    pub metadata: PassageMetadata,
}

impl Passage {
    pub fn new(id: impl Into<String>, text: impl Into<String>, metadata: PassageMetadata) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            metadata,
        }
    }

    /// Document name for citations.
    pub fn title(&self) -> String {
        self.metadata.display_title()
    }
}

/// A passage returned by a similarity query.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPassage {
    pub passage: Passage,

    /// Cosine similarity; higher is more similar
    pub score: f32,
}

/// Ordered passages for one query. Not persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrievalResult {
    pub query: String,

    /// Sorted by non-increasing score; rank is the position
    pub passages: Vec<ScoredPassage>,
}

impl RetrievalResult {
    pub fn new(query: impl Into<String>, passages: Vec<ScoredPassage>) -> Self {
        Self {
            query: query.into(),
            passages,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    /// Highest score, 0.0 when empty.
    pub fn max_score(&self) -> f32 {
        self.passages.first().map(|p| p.score).unwrap_or(0.0)
    }

    /// The passages without scores, in rank order.
    pub fn into_passages(self) -> Vec<Passage> {
        self.passages.into_iter().map(|p| p.passage).collect()
    }
}

/// Statistics from an ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestStats {
    pub files_count: u32,
    pub passages_count: u32,
    pub skipped_count: u32,
    pub duration_secs: f64,
}
