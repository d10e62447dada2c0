//! Answer generation over the local and remote backends.
//!
//! Generation never fails: backend errors come back as answer text marked
//! `failed`, so the conversation always records a reply.

use crate::types::SourceRef;
use async_trait::async_trait;
use cosmic_core::config::{AppConfig, BackendKind};
use cosmic_core::AppResult;
use cosmic_knowledge::{LazyEmbedder, Passage, Retriever};
use cosmic_llm::{
    create_client, create_remote_client, Answer, ChatTurn, LlmClient, LlmRequest,
    RemoteChatClient,
};
use cosmic_prompt::{ContextAssembler, CITATION_PREFIX, NOT_FOUND_ANSWER};
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// Separates alternative answers inside one reply.
pub const ALTERNATIVE_DELIMITER: &str = "---ALTERNATIV---";

/// Answer shown when the remote reply has no `answer` field.
pub const MALFORMED_ANSWER: &str = "Fick ett felaktigt svar från servern.";

/// Prefix of the answer shown when a backend call fails.
pub const BACKEND_ERROR_PREFIX: &str = "Kunde inte ansluta till AI-servern:";

/// Where the passages for a generation come from.
#[derive(Debug, Clone, PartialEq)]
pub enum PassageSource {
    /// Retrieve with this query
    Retrieve { query: String },
    /// Use these passages as-is
    Reuse(Vec<Passage>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub question: String,

    /// Turns before `question`
    pub history: Vec<ChatTurn>,

    pub passages: PassageSource,
}

impl GenerationRequest {
    /// Request that retrieves with the question itself.
    pub fn new(question: impl Into<String>, history: Vec<ChatTurn>) -> Self {
        let question = question.into();
        Self {
            passages: PassageSource::Retrieve {
                query: question.clone(),
            },
            question,
            history,
        }
    }

    pub fn with_passages(mut self, passages: PassageSource) -> Self {
        self.passages = passages;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedAnswer {
    pub text: String,

    /// Passages the answer was grounded in, in rank order
    pub sources: Vec<SourceRef>,

    /// The text is an error message, not an answer
    pub failed: bool,
}

impl GeneratedAnswer {
    fn answered(text: String, sources: Vec<SourceRef>) -> Self {
        Self {
            text,
            sources,
            failed: false,
        }
    }

    fn not_found() -> Self {
        Self::answered(NOT_FOUND_ANSWER.to_string(), Vec::new())
    }

    fn backend_error(error: impl std::fmt::Display) -> Self {
        Self {
            text: format!("{} {}", BACKEND_ERROR_PREFIX, error),
            sources: Vec::new(),
            failed: true,
        }
    }

    /// Alternatives of this answer, see [`split_alternatives`].
    pub fn alternatives(&self) -> Vec<String> {
        split_alternatives(&self.text)
    }
}

/// Produces one answer per request.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    fn backend_name(&self) -> &str;

    async fn generate(&self, request: &GenerationRequest) -> GeneratedAnswer;
}

/// Local retrieval-augmented generation.
pub struct RagGenerator {
    retriever: Arc<Retriever>,
    assembler: ContextAssembler,
    client: Arc<dyn LlmClient>,
    model: String,
    timeout: Duration,
}

impl RagGenerator {
    pub fn new(
        retriever: Arc<Retriever>,
        assembler: ContextAssembler,
        client: Arc<dyn LlmClient>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            retriever,
            assembler,
            client,
            model: model.into(),
            timeout,
        }
    }

    async fn passages(&self, source: &PassageSource) -> AppResult<Vec<Passage>> {
        match source {
            PassageSource::Reuse(passages) => {
                tracing::debug!("Reusing {} passages", passages.len());
                Ok(passages.clone())
            }
            PassageSource::Retrieve { query } => {
                Ok(self.retriever.retrieve(query).await?.into_passages())
            }
        }
    }

    async fn try_generate(&self, request: &GenerationRequest) -> AppResult<GeneratedAnswer> {
        let passages = self.passages(&request.passages).await?;
        if passages.is_empty() {
            tracing::info!("No passages for question, answering not-found");
            return Ok(GeneratedAnswer::not_found());
        }

        let prompt = self
            .assembler
            .assemble(&request.question, &passages, &request.history)?;

        let llm_request = LlmRequest::new(prompt.text, &self.model)
            .with_temperature(0.0)
            .with_timeout(self.timeout);
        let response = self.client.complete(&llm_request).await?;

        let text = shape_answer(response.text().unwrap_or_default(), &passages);
        let sources = if text == NOT_FOUND_ANSWER {
            Vec::new()
        } else {
            passages.iter().map(SourceRef::from).collect()
        };

        Ok(GeneratedAnswer::answered(text, sources))
    }
}

#[async_trait]
impl AnswerGenerator for RagGenerator {
    fn backend_name(&self) -> &str {
        "local"
    }

    #[instrument(skip(self, request), fields(backend = "local", model = %self.model))]
    async fn generate(&self, request: &GenerationRequest) -> GeneratedAnswer {
        match self.try_generate(request).await {
            Ok(answer) => answer,
            Err(e) => {
                tracing::warn!("Local generation failed: {}", e);
                GeneratedAnswer::backend_error(e)
            }
        }
    }
}

/// Answers from the remote chat server, which retrieves on its own.
pub struct RemoteGenerator {
    client: Arc<dyn RemoteChatClient>,
}

impl RemoteGenerator {
    pub fn new(client: Arc<dyn RemoteChatClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AnswerGenerator for RemoteGenerator {
    fn backend_name(&self) -> &str {
        "remote"
    }

    #[instrument(skip(self, request), fields(backend = "remote", url = %self.client.endpoint()))]
    async fn generate(&self, request: &GenerationRequest) -> GeneratedAnswer {
        if let PassageSource::Reuse(_) = request.passages {
            tracing::debug!("Remote backend retrieves server-side; reused passages not sent");
        }

        match self.client.chat(&request.question, &request.history).await {
            Ok(reply) => {
                let sources: Vec<SourceRef> =
                    reply.sources().into_iter().map(SourceRef::from).collect();
                match reply.text() {
                    Some(text) => GeneratedAnswer::answered(text.trim().to_string(), sources),
                    None => {
                        tracing::warn!("Remote reply without answer field");
                        GeneratedAnswer::answered(MALFORMED_ANSWER.to_string(), sources)
                    }
                }
            }
            Err(e) => {
                tracing::warn!("Remote generation failed: {}", e);
                GeneratedAnswer::backend_error(e)
            }
        }
    }
}

/// Build the generator for the configured backend.
pub fn create_generator(config: &AppConfig) -> AppResult<Arc<dyn AnswerGenerator>> {
    match config.backend {
        BackendKind::Local => {
            let embedder = Arc::new(LazyEmbedder::new(config.embedding.clone()));
            let retriever = Arc::new(Retriever::lazy(
                embedder,
                config.index_path(),
                &config.retrieval,
            ));
            let assembler = ContextAssembler::for_workspace(&config.workspace)?;
            let client = create_client("ollama", &config.local)?;

            tracing::info!(
                "Using local backend at {} (model: {})",
                config.local.endpoint,
                config.local.model
            );
            Ok(Arc::new(RagGenerator::new(
                retriever,
                assembler,
                client,
                &config.local.model,
                Duration::from_secs(config.local.timeout),
            )))
        }
        BackendKind::Remote => {
            let api_key = config.resolve_api_key();
            let client = create_remote_client(&config.remote, api_key.as_deref())?;

            tracing::info!("Using remote backend at {}", client.endpoint());
            Ok(Arc::new(RemoteGenerator::new(client)))
        }
    }
}

/// Normalize a raw local answer.
///
/// Each alternative is shaped on its own: not-found alternatives are dropped,
/// the rest get a `KÄLLA:` line naming the top passage unless their last line
/// already is one. A reply with nothing but not-found alternatives becomes
/// exactly [`NOT_FOUND_ANSWER`].
pub fn shape_answer(raw: &str, passages: &[Passage]) -> String {
    let shaped: Vec<String> = raw
        .split(ALTERNATIVE_DELIMITER)
        .filter_map(|alternative| shape_alternative(alternative, passages))
        .collect();

    if shaped.is_empty() {
        return NOT_FOUND_ANSWER.to_string();
    }
    shaped.join(&format!("\n{}\n", ALTERNATIVE_DELIMITER))
}

/// One cited alternative, or `None` when it is blank or a not-found reply.
fn shape_alternative(alternative: &str, passages: &[Passage]) -> Option<String> {
    let text = alternative.trim();
    if text.is_empty() || text.contains(NOT_FOUND_ANSWER) {
        return None;
    }

    let has_citation = text
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .is_some_and(|line| line.trim_start().starts_with(CITATION_PREFIX));

    Some(match passages.first() {
        Some(top) if !has_citation => {
            format!("{}\n\n{} {}", text, CITATION_PREFIX, top.title())
        }
        _ => text.to_string(),
    })
}

/// Split a reply into its alternatives.
///
/// Segments are trimmed and empty ones dropped. A reply without delimiter is
/// one alternative.
pub fn split_alternatives(text: &str) -> Vec<String> {
    let alternatives: Vec<String> = text
        .split(ALTERNATIVE_DELIMITER)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    if alternatives.is_empty() {
        vec![text.trim().to_string()]
    } else {
        alternatives
    }
}
