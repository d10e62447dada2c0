//! Local generation over the Ollama `/api/generate` endpoint.

use crate::client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use crate::types::LocalAnswer;
use cosmic_core::config::DEFAULT_TIMEOUT_SECS;
use cosmic_core::{AppError, AppResult};
use serde::Serialize;
use std::time::Duration;
use tracing::instrument;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434";

/// Body of `POST /api/generate`.
#[derive(Debug, Serialize)]
struct GenerateBody<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: SamplingOptions,
}

#[derive(Debug, Serialize)]
struct SamplingOptions {
    temperature: f32,
}

impl<'a> From<&'a LlmRequest> for GenerateBody<'a> {
    fn from(request: &'a LlmRequest) -> Self {
        Self {
            model: &request.model,
            prompt: &request.prompt,
            stream: false,
            options: SamplingOptions {
                temperature: request.temperature.unwrap_or(0.0),
            },
        }
    }
}

impl From<LocalAnswer> for LlmResponse {
    fn from(answer: LocalAnswer) -> Self {
        Self {
            usage: LlmUsage::new(
                answer.prompt_eval_count.unwrap_or(0),
                answer.eval_count.unwrap_or(0),
            ),
            content: answer.response,
            model: answer.model,
            done: answer.done,
        }
    }
}

pub struct OllamaClient {
    endpoint: String,
    timeout: Duration,
    http: reqwest::Client,
}

impl OllamaClient {
    /// Client for `endpoint` with the default timeout.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            http: reqwest::Client::new(),
        }
    }

    /// Timeout for requests that carry none of their own.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn generate_url(&self) -> String {
        format!("{}/api/generate", self.endpoint)
    }
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new(DEFAULT_ENDPOINT)
    }
}

fn send_error(error: reqwest::Error, timeout: Duration) -> AppError {
    if error.is_timeout() {
        AppError::Llm(format!("timed out after {}s", timeout.as_secs()))
    } else if error.is_connect() {
        AppError::Llm(format!("connection failed: {}", error))
    } else {
        AppError::Llm(error.to_string())
    }
}

#[async_trait::async_trait]
impl LlmClient for OllamaClient {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    #[instrument(skip(self, request), fields(model = %request.model, prompt_len = request.prompt.len()))]
    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        let timeout = request.timeout.unwrap_or(self.timeout);

        let response = self
            .http
            .post(self.generate_url())
            .timeout(timeout)
            .json(&GenerateBody::from(request))
            .send()
            .await
            .map_err(|e| send_error(e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Llm(format!("HTTP {}: {}", status, body.trim())));
        }

        let answer: LocalAnswer = response
            .json()
            .await
            .map_err(|e| AppError::Llm(format!("unreadable generate reply: {}", e)))?;

        let response = LlmResponse::from(answer);
        tracing::debug!(
            "Generated {} chars ({} tokens)",
            response.content.len(),
            response.usage.total()
        );
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_normalized() {
        let client = OllamaClient::new("http://gpu-box:11434/");
        assert_eq!(client.generate_url(), "http://gpu-box:11434/api/generate");
        assert_eq!(
            OllamaClient::default().generate_url(),
            "http://localhost:11434/api/generate"
        );
    }

    #[test]
    fn test_wire_format_matches_generate_api() {
        let request = LlmRequest::new("Fråga", "llama3.2");

        let value = serde_json::to_value(GenerateBody::from(&request)).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "model": "llama3.2",
                "prompt": "Fråga",
                "stream": false,
                "options": {"temperature": 0.0}
            })
        );
    }

    #[test]
    fn test_reply_conversion() {
        let answer: LocalAnswer = serde_json::from_str(
            r#"{"model": "llama3.2", "response": "Klicka på Ny remiss.", "prompt_eval_count": 40, "eval_count": 8}"#,
        )
        .unwrap();

        let response = LlmResponse::from(answer);
        assert_eq!(response.content, "Klicka på Ny remiss.");
        assert!(response.done);
        assert_eq!(response.usage.total(), 48);
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_llm_error() {
        // Port 9 (discard) is not expected to serve HTTP
        let client = OllamaClient::new("http://127.0.0.1:9").with_timeout(Duration::from_secs(2));
        let request = LlmRequest::new("Hej", "llama3.2");

        let result = client.complete(&request).await;
        assert!(matches!(result, Err(AppError::Llm(_))));
    }
}
