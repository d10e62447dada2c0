//! Backend implementations.

pub mod ollama;
pub mod remote;

pub use ollama::OllamaClient;
pub use remote::{HttpRemoteClient, RemoteChatClient};
