//! Remote answer server client.
//!
//! The remote server owns retrieval and generation. It receives the question
//! and the prior turns and replies with a finished answer.

use crate::types::{ChatTurn, RemoteAnswer, RemoteRequest};
use cosmic_core::{AppError, AppResult};
use std::time::Duration;
use tracing::instrument;

/// Trait for remote answer backends.
#[async_trait::async_trait]
pub trait RemoteChatClient: Send + Sync {
    /// Endpoint the client talks to, for logging.
    fn endpoint(&self) -> &str;

    /// Ask a question with the conversation so far.
    async fn chat(&self, question: &str, history: &[ChatTurn]) -> AppResult<RemoteAnswer>;
}

/// HTTP client for the remote `/chat` endpoint, authenticated by bearer token.
pub struct HttpRemoteClient {
    url: String,
    api_key: String,
    client: reqwest::Client,
}

impl HttpRemoteClient {
    /// Create a client with a request timeout.
    pub fn new(
        url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Llm(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            url: url.into(),
            api_key: api_key.into(),
            client,
        })
    }
}

#[async_trait::async_trait]
impl RemoteChatClient for HttpRemoteClient {
    fn endpoint(&self) -> &str {
        &self.url
    }

    #[instrument(skip(self, question, history), fields(url = %self.url, history_len = history.len()))]
    async fn chat(&self, question: &str, history: &[ChatTurn]) -> AppResult<RemoteAnswer> {
        tracing::info!("Sending question to remote answer server");

        let body = RemoteRequest {
            question: question.to_string(),
            history: history.to_vec(),
        };

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Llm(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Llm(format!(
                "Remote server error ({}): {}",
                status, error_text
            )));
        }

        let reply: RemoteAnswer = response
            .json()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to parse remote response: {}", e)))?;

        tracing::debug!(
            "Remote reply: answer_present={}, raw_context={}",
            reply.answer.is_some(),
            reply.raw_context.len()
        );

        Ok(reply)
    }
}
