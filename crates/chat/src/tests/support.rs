//! Fakes and fixtures for the end-to-end chat tests.

use crate::feedback::MemoryFeedbackLog;
use crate::generator::RagGenerator;
use crate::pipeline::ChatPipeline;
use crate::session::Session;
use crate::store::MemoryStore;
use async_trait::async_trait;
use cosmic_core::config::{EmbeddingSettings, RetryPolicy};
use cosmic_core::{AppError, AppResult};
use cosmic_knowledge::{
    LazyEmbedder, Passage, PassageMetadata, Retriever, SqliteIndex, VectorIndex,
    MIN_RELEVANCE_SCORE,
};
use cosmic_llm::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use cosmic_prompt::ContextAssembler;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const REMISS_2023: &str = "Remisser_2023.pdf";
pub const REMISS_2023_TEXT: &str =
    "Steg 1: Klicka på Ny remiss i remissmodulen. Steg 2: Välj mottagare och signera remissen.";

pub const REMISS_2019: &str = "Remisser_2019.pdf";
pub const REMISS_2019_TEXT: &str =
    "Remiss skapas via journalmenyn: välj Remiss, fyll i blanketten och tryck Skicka.";

/// How the fake model replies.
pub enum Reply {
    /// Answer with the text of the first passage in the prompt
    FirstPassage,
    Fixed(String),
    Fail(String),
}

/// Local model fake that records every prompt it receives.
pub struct FakeLlm {
    reply: Reply,
    requests: Mutex<Vec<LlmRequest>>,
}

impl FakeLlm {
    pub fn new(reply: Reply) -> Arc<Self> {
        Arc::new(Self {
            reply,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn prompt(&self, call: usize) -> String {
        self.requests.lock().unwrap()[call].prompt.clone()
    }
}

/// Text of the first passage listed under `KONTEXT:`.
fn first_passage_text(prompt: &str) -> Option<String> {
    let context = prompt.split_once("KONTEXT:\n")?.1;
    let mut lines = context.lines().skip_while(|l| !l.starts_with('['));
    lines.next()?;
    let text: Vec<&str> = lines.take_while(|l| !l.trim().is_empty()).collect();
    Some(text.join("\n"))
}

#[async_trait]
impl LlmClient for FakeLlm {
    fn provider_name(&self) -> &str {
        "fake"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        self.requests.lock().unwrap().push(request.clone());

        let content = match &self.reply {
            Reply::FirstPassage => first_passage_text(&request.prompt)
                .ok_or_else(|| AppError::Llm("prompt has no passages".to_string()))?,
            Reply::Fixed(text) => text.clone(),
            Reply::Fail(message) => return Err(AppError::Llm(message.clone())),
        };

        Ok(LlmResponse {
            content,
            model: request.model.clone(),
            usage: LlmUsage::new(0, 0),
            done: true,
        })
    }
}

/// Everything a scenario needs.
pub struct Harness {
    pub pipeline: ChatPipeline,
    pub session: Session,
    pub llm: Arc<FakeLlm>,
    pub feedback: Arc<MemoryFeedbackLog>,
}

/// Pipeline over an in-memory index holding the two referral documents.
pub async fn harness(reply: Reply, retry_policy: RetryPolicy) -> Harness {
    let embedder = Arc::new(LazyEmbedder::new(EmbeddingSettings::default()));
    let index = Arc::new(SqliteIndex::open_in_memory().unwrap());

    for (title, text) in [(REMISS_2023, REMISS_2023_TEXT), (REMISS_2019, REMISS_2019_TEXT)] {
        let passage = Passage::new(title, text, PassageMetadata::titled(title));
        let embedding = embedder.embed(text).await.unwrap();
        index.upsert(&passage, &embedding).unwrap();
    }

    let retriever = Arc::new(Retriever::new(embedder, index, 5, MIN_RELEVANCE_SCORE));
    let llm = FakeLlm::new(reply);
    let generator = Arc::new(RagGenerator::new(
        retriever,
        ContextAssembler::new().unwrap(),
        llm.clone(),
        "llama3.2",
        Duration::from_secs(90),
    ));
    let feedback = Arc::new(MemoryFeedbackLog::new());

    Harness {
        pipeline: ChatPipeline::new(generator, feedback.clone(), retry_policy),
        session: Session::open("anna", Arc::new(MemoryStore::new())).unwrap(),
        llm,
        feedback,
    }
}

#[test]
fn test_first_passage_text() {
    let prompt = "Regler\n\nKONTEXT:\n[A.pdf]\nrad ett\nrad två\n\n[B.pdf]\nannat\n\nFRÅGA: x";
    assert_eq!(first_passage_text(prompt).unwrap(), "rad ett\nrad två");
}
