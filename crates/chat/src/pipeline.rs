//! Event handlers driving a chat session.
//!
//! Each handler takes the session explicitly, runs the answer pipeline and
//! returns a [`StateDelta`] describing exactly what changed.

use crate::feedback::{
    FeedbackEvent, FeedbackKey, FeedbackLog, FeedbackRecord, JsonFeedbackLog, Judgment, Transition,
};
use crate::generator::{
    create_generator, split_alternatives, AnswerGenerator, GenerationRequest, PassageSource,
};
use crate::session::Session;
use crate::types::{Message, SourceRef};
use chrono::Utc;
use cosmic_core::config::{AppConfig, RetryPolicy};
use cosmic_core::{AppError, AppResult};
use cosmic_llm::ChatTurn;
use std::sync::Arc;

/// A message added to a conversation, with its index.
#[derive(Debug, Clone, PartialEq)]
pub struct AppendedMessage {
    pub index: usize,
    pub message: Message,
}

/// What one handler changed.
#[derive(Debug, Clone, PartialEq)]
pub struct StateDelta {
    pub conversation_id: String,
    pub messages: Vec<AppendedMessage>,
    pub feedback: Vec<FeedbackRecord>,
}

impl StateDelta {
    fn new(conversation_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            messages: Vec::new(),
            feedback: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty() && self.feedback.is_empty()
    }

    /// The last appended assistant message, if any.
    pub fn answer(&self) -> Option<&Message> {
        self.messages
            .iter()
            .rev()
            .map(|m| &m.message)
            .find(|m| m.is_assistant())
    }
}

/// The assistant answer a feedback event refers to.
struct JudgedAnswer {
    question: String,
    alternative: String,
    sources: Vec<SourceRef>,
}

pub struct ChatPipeline {
    generator: Arc<dyn AnswerGenerator>,
    feedback_log: Arc<dyn FeedbackLog>,
    retry_policy: RetryPolicy,
}

impl ChatPipeline {
    pub fn new(
        generator: Arc<dyn AnswerGenerator>,
        feedback_log: Arc<dyn FeedbackLog>,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            generator,
            feedback_log,
            retry_policy,
        }
    }

    /// Pipeline for the configured backend, logging feedback to the
    /// configured file.
    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        let generator = create_generator(config)?;
        let feedback_log = Arc::new(JsonFeedbackLog::new(config.feedback_log_path()));
        Ok(Self::new(generator, feedback_log, config.retry))
    }

    pub fn backend_name(&self) -> &str {
        self.generator.backend_name()
    }

    /// Ask a question in the active conversation.
    ///
    /// Appends the user message and the generated answer. A new conversation
    /// is created when none is active.
    pub async fn on_submit_question(
        &self,
        session: &mut Session,
        question: &str,
    ) -> AppResult<StateDelta> {
        if question.trim().is_empty() {
            return Err(AppError::Chat("Question cannot be empty".to_string()));
        }

        let id = session.ensure_active()?;
        let history = history_turns(session, &id);
        let mut delta = StateDelta::new(&id);

        self.append(session, &mut delta, Message::user(question))?;

        let request = GenerationRequest::new(question.trim(), history);
        let answer = self.generator.generate(&request).await;
        if answer.failed {
            tracing::warn!("Answer generation failed for conversation {}", id);
        }

        self.append(
            session,
            &mut delta,
            Message::assistant(answer.text, answer.sources),
        )?;

        Ok(delta)
    }

    /// Judge one alternative of an assistant message in the active
    /// conversation.
    ///
    /// Repeated judgments are ignored and return an empty delta.
    pub async fn on_submit_feedback(
        &self,
        session: &mut Session,
        message_index: usize,
        alternative_index: usize,
        judgment: Judgment,
    ) -> AppResult<StateDelta> {
        let id = active_id(session)?;
        let judged = judged_answer(session, &id, message_index, alternative_index)?;
        let key = FeedbackKey {
            conversation_id: id.clone(),
            message_index,
            alternative_index,
        };
        let mut delta = StateDelta::new(&id);

        match session.feedback_status(&key).apply(FeedbackEvent::Judge(judgment)) {
            Transition::Record(status) => {
                let record = FeedbackRecord {
                    timestamp: Utc::now(),
                    feedback: judgment,
                    question: judged.question,
                    answer: judged.alternative,
                    sources: judged.sources,
                    clarification: None,
                };
                self.feedback_log.append(&record)?;
                session.set_feedback_status(key, status);
                delta.feedback.push(record);
            }
            Transition::Ignored => {
                tracing::debug!(
                    "Ignoring repeated feedback on {} message {} alternative {}",
                    id,
                    message_index,
                    alternative_index
                );
            }
            Transition::Rejected(reason) => return Err(AppError::Chat(reason.to_string())),
        }

        Ok(delta)
    }

    /// Clarify a negatively judged answer and generate a new one.
    ///
    /// Writes one feedback record, appends the clarification as a user message
    /// and appends the regenerated answer.
    pub async fn on_submit_clarification(
        &self,
        session: &mut Session,
        message_index: usize,
        alternative_index: usize,
        clarification: &str,
    ) -> AppResult<StateDelta> {
        if clarification.trim().is_empty() {
            return Err(AppError::Chat("Clarification cannot be empty".to_string()));
        }

        let id = active_id(session)?;
        let judged = judged_answer(session, &id, message_index, alternative_index)?;
        let key = FeedbackKey {
            conversation_id: id.clone(),
            message_index,
            alternative_index,
        };

        let status = match session.feedback_status(&key).apply(FeedbackEvent::Clarify) {
            Transition::Record(status) => status,
            Transition::Rejected(reason) => return Err(AppError::Chat(reason.to_string())),
            Transition::Ignored => {
                return Err(AppError::Chat("Clarification not accepted".to_string()))
            }
        };

        let mut delta = StateDelta::new(&id);

        let record = FeedbackRecord {
            timestamp: Utc::now(),
            feedback: Judgment::Negative,
            question: judged.question.clone(),
            answer: judged.alternative,
            sources: judged.sources.clone(),
            clarification: Some(clarification.to_string()),
        };
        self.feedback_log.append(&record)?;
        session.set_feedback_status(key, status);
        delta.feedback.push(record);

        let history = history_turns(session, &id);
        self.append(session, &mut delta, Message::user(clarification))?;

        let passages = self.retry_passages(&judged.question, clarification, &judged.sources);
        let request =
            GenerationRequest::new(clarification.trim(), history).with_passages(passages);
        let answer = self.generator.generate(&request).await;

        self.append(
            session,
            &mut delta,
            Message::assistant(answer.text, answer.sources),
        )?;

        Ok(delta)
    }

    /// Passages for a clarified retry under the configured policy.
    ///
    /// `reuse` falls back to retrieval when the judged answer had no sources.
    fn retry_passages(
        &self,
        question: &str,
        clarification: &str,
        sources: &[SourceRef],
    ) -> PassageSource {
        match self.retry_policy {
            RetryPolicy::Reuse if !sources.is_empty() => {
                PassageSource::Reuse(sources.iter().map(SourceRef::to_passage).collect())
            }
            _ => PassageSource::Retrieve {
                query: format!("{} {}", question.trim(), clarification.trim())
                    .trim()
                    .to_string(),
            },
        }
    }

    fn append(
        &self,
        session: &mut Session,
        delta: &mut StateDelta,
        message: Message,
    ) -> AppResult<()> {
        let index = session.append_message(&delta.conversation_id, message.clone())?;
        delta.messages.push(AppendedMessage { index, message });
        Ok(())
    }
}

fn active_id(session: &Session) -> AppResult<String> {
    session
        .active_id()
        .map(str::to_string)
        .ok_or_else(|| AppError::Chat("No active conversation".to_string()))
}

fn history_turns(session: &Session, id: &str) -> Vec<ChatTurn> {
    session
        .messages(id)
        .unwrap_or_default()
        .iter()
        .map(Message::to_turn)
        .collect()
}

fn judged_answer(
    session: &Session,
    id: &str,
    message_index: usize,
    alternative_index: usize,
) -> AppResult<JudgedAnswer> {
    let messages = session
        .messages(id)
        .ok_or_else(|| AppError::Chat(format!("Unknown conversation: {}", id)))?;

    let message = messages
        .get(message_index)
        .ok_or_else(|| AppError::Chat(format!("No message at index {}", message_index)))?;

    if !message.is_assistant() {
        return Err(AppError::Chat(
            "Feedback is only accepted for assistant messages".to_string(),
        ));
    }

    let alternative = split_alternatives(&message.content)
        .into_iter()
        .nth(alternative_index)
        .ok_or_else(|| {
            AppError::Chat(format!(
                "Message {} has no alternative {}",
                message_index, alternative_index
            ))
        })?;

    let question = messages[..message_index]
        .iter()
        .rev()
        .find(|m| !m.is_assistant())
        .map(|m| m.content.clone())
        .unwrap_or_default();

    Ok(JudgedAnswer {
        question,
        alternative,
        sources: message.sources().to_vec(),
    })
}
