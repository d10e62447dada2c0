//! Per-user conversation state.

use crate::feedback::{FeedbackKey, FeedbackStatus};
use crate::store::ConversationStore;
use crate::types::{conversation_title, ConversationMap, Message};
use chrono::{DateTime, Duration, Local, NaiveDateTime};
use cosmic_core::{AppError, AppResult};
use std::collections::HashMap;
use std::sync::Arc;

/// Conversation id layout. Lexicographic order equals creation order.
pub const CONVERSATION_ID_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Id for a conversation created at `now`, sorting after every id in
/// `existing`.
///
/// When the clock reads earlier than the newest id (clock changes, daylight
/// saving fall-back) the id continues from the newest one. A collision
/// advances the timestamp one millisecond at a time.
pub fn next_conversation_id(now: DateTime<Local>, existing: &ConversationMap) -> String {
    let mut at: NaiveDateTime = now.naive_local();

    if let Some(newest) = existing.keys().next_back() {
        if at.format(CONVERSATION_ID_FORMAT).to_string() <= *newest {
            if let Ok(parsed) = NaiveDateTime::parse_from_str(newest, "%Y-%m-%d %H:%M:%S%.f") {
                at = parsed + Duration::milliseconds(1);
            }
        }
    }

    loop {
        let id = at.format(CONVERSATION_ID_FORMAT).to_string();
        if !existing.contains_key(&id) {
            return id;
        }
        at += Duration::milliseconds(1);
    }
}

/// Everything one user's chat needs between actions.
///
/// Conversations are persisted on every mutation. Feedback statuses live for
/// the session only.
pub struct Session {
    user: String,
    store: Arc<dyn ConversationStore>,
    conversations: ConversationMap,
    active: Option<String>,
    feedback: HashMap<FeedbackKey, FeedbackStatus>,
}

impl Session {
    /// Empty session with no conversations loaded.
    pub fn new(user: impl Into<String>, store: Arc<dyn ConversationStore>) -> Self {
        Self {
            user: user.into(),
            store,
            conversations: ConversationMap::new(),
            active: None,
            feedback: HashMap::new(),
        }
    }

    /// Load the user's history and select the newest conversation.
    ///
    /// A user without history starts with one fresh conversation.
    pub fn open(user: impl Into<String>, store: Arc<dyn ConversationStore>) -> AppResult<Self> {
        let mut session = Self::new(user, store);
        session.conversations = session.store.load(&session.user)?;

        match session.list_conversations().into_iter().next() {
            Some(newest) => {
                tracing::info!(
                    "Opened {} conversations for '{}', active {}",
                    session.conversations.len(),
                    session.user,
                    newest
                );
                session.active = Some(newest);
            }
            None => {
                session.create_conversation()?;
            }
        }

        Ok(session)
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    /// Start a new empty conversation and make it active.
    ///
    /// Nothing changes when the store rejects the save.
    pub fn create_conversation(&mut self) -> AppResult<String> {
        let id = next_conversation_id(Local::now(), &self.conversations);
        self.conversations.insert(id.clone(), Vec::new());

        if let Err(e) = self.persist() {
            self.conversations.remove(&id);
            return Err(e);
        }
        self.active = Some(id.clone());

        tracing::info!("Created conversation {} for '{}'", id, self.user);
        Ok(id)
    }

    /// Conversation ids, newest first.
    pub fn list_conversations(&self) -> Vec<String> {
        self.conversations.keys().rev().cloned().collect()
    }

    /// `(id, title)` pairs, newest first.
    pub fn conversation_titles(&self) -> Vec<(String, String)> {
        self.conversations
            .iter()
            .rev()
            .map(|(id, messages)| (id.clone(), conversation_title(id, messages)))
            .collect()
    }

    pub fn set_active(&mut self, id: &str) -> AppResult<()> {
        if !self.conversations.contains_key(id) {
            return Err(AppError::Chat(format!("Unknown conversation: {}", id)));
        }
        self.active = Some(id.to_string());
        Ok(())
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// The active conversation id, creating a conversation when none is active.
    pub fn ensure_active(&mut self) -> AppResult<String> {
        match self.active.clone() {
            Some(id) => Ok(id),
            None => self.create_conversation(),
        }
    }

    pub fn messages(&self, id: &str) -> Option<&[Message]> {
        self.conversations.get(id).map(Vec::as_slice)
    }

    pub fn active_messages(&self) -> &[Message] {
        self.active
            .as_deref()
            .and_then(|id| self.messages(id))
            .unwrap_or_default()
    }

    /// Append a message and persist. Returns the message index.
    ///
    /// The message is dropped again when the store rejects the save.
    pub fn append_message(&mut self, id: &str, message: Message) -> AppResult<usize> {
        let messages = self
            .conversations
            .get_mut(id)
            .ok_or_else(|| AppError::Chat(format!("Unknown conversation: {}", id)))?;

        messages.push(message);
        let index = messages.len() - 1;

        if let Err(e) = self.persist() {
            if let Some(messages) = self.conversations.get_mut(id) {
                messages.pop();
            }
            return Err(e);
        }

        Ok(index)
    }

    pub fn feedback_status(&self, key: &FeedbackKey) -> FeedbackStatus {
        self.feedback.get(key).copied().unwrap_or_default()
    }

    pub(crate) fn set_feedback_status(&mut self, key: FeedbackKey, status: FeedbackStatus) {
        self.feedback.insert(key, status);
    }

    fn persist(&self) -> AppResult<()> {
        self.store.save(&self.user, &self.conversations)
    }
}
