//! LLM integration crate for Cosmic Chat.
//!
//! This crate provides the two answer backends the pipeline can talk to:
//!
//! # Backends
//! - **Local** (`LlmClient`, Ollama): receives a fully assembled prompt and
//!   returns `{response}`
//! - **Remote** (`RemoteChatClient`): receives `{question, history}` and
//!   returns `{answer, raw_context}`
//!
//! # Example
//! ```no_run
//! use cosmic_llm::{LlmClient, LlmRequest, providers::OllamaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new("http://localhost:11434");
//! let request = LlmRequest::new("Hej!", "llama3.2").with_temperature(0.0);
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;
pub mod types;

// Re-export main types
pub use client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
pub use factory::{create_client, create_remote_client};
pub use providers::{HttpRemoteClient, OllamaClient, RemoteChatClient};
pub use types::{Answer, ChatTurn, ContextSnippet, LocalAnswer, RemoteAnswer, RemoteRequest};
