//! HTTP clients for embedding and answer generation backends

pub mod ollama;
pub mod openai;
pub mod prompt;

pub use ollama::OllamaClient;
pub use openai::OpenAiClient;
pub use prompt::{PromptBuilder, CONTEXT_DELIMITER};
