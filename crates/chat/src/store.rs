//! Conversation persistence.

use crate::types::ConversationMap;
use cosmic_core::{AppError, AppResult};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Storage for a user's conversations.
///
/// `save` replaces everything stored for the user. Concurrent sessions for
/// the same user are last-writer-wins.
pub trait ConversationStore: Send + Sync {
    fn load(&self, user: &str) -> AppResult<ConversationMap>;

    fn save(&self, user: &str, conversations: &ConversationMap) -> AppResult<()>;
}

/// One pretty-printed JSON document per user: `<dir>/<user>_history.json`.
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, user: &str) -> PathBuf {
        self.dir.join(format!("{}_history.json", user))
    }
}

impl ConversationStore for JsonFileStore {
    /// Missing or corrupt files load as an empty history.
    fn load(&self, user: &str) -> AppResult<ConversationMap> {
        let path = self.path_for(user);
        if !path.exists() {
            tracing::debug!("No history at {:?}", path);
            return Ok(ConversationMap::new());
        }

        let contents = std::fs::read_to_string(&path)?;
        match serde_json::from_str::<ConversationMap>(&contents) {
            Ok(conversations) => {
                tracing::debug!(
                    "Loaded {} conversations for '{}' from {:?}",
                    conversations.len(),
                    user,
                    path
                );
                Ok(conversations)
            }
            Err(e) => {
                tracing::warn!("Ignoring malformed history file {:?}: {}", path, e);
                Ok(ConversationMap::new())
            }
        }
    }

    fn save(&self, user: &str, conversations: &ConversationMap) -> AppResult<()> {
        let json = serde_json::to_string_pretty(conversations)?;
        write_atomic(&self.path_for(user), json.as_bytes())?;
        tracing::debug!("Saved {} conversations for '{}'", conversations.len(), user);
        Ok(())
    }
}

/// Store that keeps conversations in process memory only.
#[derive(Default)]
pub struct MemoryStore {
    users: Mutex<std::collections::HashMap<String, ConversationMap>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConversationStore for MemoryStore {
    fn load(&self, user: &str) -> AppResult<ConversationMap> {
        let users = self
            .users
            .lock()
            .map_err(|_| AppError::Storage("Memory store lock poisoned".to_string()))?;
        Ok(users.get(user).cloned().unwrap_or_default())
    }

    fn save(&self, user: &str, conversations: &ConversationMap) -> AppResult<()> {
        let mut users = self
            .users
            .lock()
            .map_err(|_| AppError::Storage("Memory store lock poisoned".to_string()))?;
        users.insert(user.to_string(), conversations.clone());
        Ok(())
    }
}

/// Write through a sibling temp file and rename over the target.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> AppResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            AppError::Storage(format!("Failed to create directory {:?}: {}", parent, e))
        })?;
    }

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| AppError::Storage(format!("Invalid storage path: {:?}", path)))?;
    let tmp_path = path.with_file_name(format!(".{}.tmp", file_name));

    std::fs::write(&tmp_path, contents)
        .map_err(|e| AppError::Storage(format!("Failed to write {:?}: {}", tmp_path, e)))?;
    std::fs::rename(&tmp_path, path)
        .map_err(|e| AppError::Storage(format!("Failed to replace {:?}: {}", path, e)))?;

    Ok(())
}
