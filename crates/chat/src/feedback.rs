//! Feedback records and the per-answer feedback state machine.

use crate::store::write_atomic;
use crate::types::SourceRef;
use chrono::{DateTime, Utc};
use cosmic_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// A user's judgment of one answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Judgment {
    #[serde(rename = "bra")]
    Positive,
    #[serde(rename = "dåligt")]
    Negative,
}

impl Judgment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Judgment::Positive => "bra",
            Judgment::Negative => "dåligt",
        }
    }
}

/// One entry of the append-only feedback log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub timestamp: DateTime<Utc>,

    pub feedback: Judgment,

    pub question: String,

    /// The judged answer, or the judged alternative of it
    pub answer: String,

    #[serde(default)]
    pub sources: Vec<SourceRef>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clarification: Option<String>,
}

/// Identifies one feedback-able answer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FeedbackKey {
    pub conversation_id: String,
    pub message_index: usize,
    pub alternative_index: usize,
}

/// Where an answer is in the feedback loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeedbackStatus {
    #[default]
    Unjudged,
    Positive,
    Negative {
        clarified: bool,
    },
}

/// Input to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackEvent {
    Judge(Judgment),
    Clarify,
}

/// Outcome of applying an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Move to the new status and write one record
    Record(FeedbackStatus),
    /// Repeated judgment; nothing is written
    Ignored,
    /// Not allowed in the current status
    Rejected(&'static str),
}

impl FeedbackStatus {
    pub fn apply(self, event: FeedbackEvent) -> Transition {
        match (self, event) {
            (FeedbackStatus::Unjudged, FeedbackEvent::Judge(Judgment::Positive)) => {
                Transition::Record(FeedbackStatus::Positive)
            }
            (FeedbackStatus::Unjudged, FeedbackEvent::Judge(Judgment::Negative)) => {
                Transition::Record(FeedbackStatus::Negative { clarified: false })
            }
            (FeedbackStatus::Positive, FeedbackEvent::Judge(_))
            | (FeedbackStatus::Negative { .. }, FeedbackEvent::Judge(_)) => Transition::Ignored,
            (FeedbackStatus::Negative { clarified: false }, FeedbackEvent::Clarify) => {
                Transition::Record(FeedbackStatus::Negative { clarified: true })
            }
            (FeedbackStatus::Negative { clarified: true }, FeedbackEvent::Clarify) => {
                Transition::Rejected("Answer has already been clarified")
            }
            (_, FeedbackEvent::Clarify) => {
                Transition::Rejected("Clarification requires negative feedback first")
            }
        }
    }
}

/// Append-only sink for feedback records.
pub trait FeedbackLog: Send + Sync {
    fn append(&self, record: &FeedbackRecord) -> AppResult<()>;

    fn records(&self) -> AppResult<Vec<FeedbackRecord>>;
}

/// Feedback log stored as one JSON array.
///
/// Each append rewrites the file through a temp file; a corrupt log is
/// logged and starts over as empty.
pub struct JsonFeedbackLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFeedbackLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> AppResult<Vec<FeedbackRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let contents = std::fs::read_to_string(&self.path)?;
        if contents.trim().is_empty() {
            return Ok(Vec::new());
        }

        match serde_json::from_str(&contents) {
            Ok(records) => Ok(records),
            Err(e) => {
                tracing::warn!("Ignoring malformed feedback log {:?}: {}", self.path, e);
                Ok(Vec::new())
            }
        }
    }
}

impl FeedbackLog for JsonFeedbackLog {
    fn append(&self, record: &FeedbackRecord) -> AppResult<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| AppError::Storage("Feedback log lock poisoned".to_string()))?;

        let mut records = self.read()?;
        records.push(record.clone());

        let json = serde_json::to_string_pretty(&records)?;
        write_atomic(&self.path, json.as_bytes())?;

        tracing::info!(
            "Recorded '{}' feedback ({} entries in log)",
            record.feedback.as_str(),
            records.len()
        );
        Ok(())
    }

    fn records(&self) -> AppResult<Vec<FeedbackRecord>> {
        self.read()
    }
}

/// Feedback log kept in memory, for one-off runs and tests.
#[derive(Default)]
pub struct MemoryFeedbackLog {
    records: Mutex<Vec<FeedbackRecord>>,
}

impl MemoryFeedbackLog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FeedbackLog for MemoryFeedbackLog {
    fn append(&self, record: &FeedbackRecord) -> AppResult<()> {
        self.records
            .lock()
            .map_err(|_| AppError::Storage("Feedback log lock poisoned".to_string()))?
            .push(record.clone());
        Ok(())
    }

    fn records(&self) -> AppResult<Vec<FeedbackRecord>> {
        Ok(self
            .records
            .lock()
            .map_err(|_| AppError::Storage("Feedback log lock poisoned".to_string()))?
            .clone())
    }
}
