//! Provider abstractions for embeddings, answer synthesis, and vector storage
//!
//! This module provides trait-based abstractions that allow switching between
//! local (Ollama) and hosted (OpenAI-compatible) backends.

pub mod embedding;
pub mod llm;
pub mod ollama;
pub mod openai;
pub mod vector_store;

use std::sync::Arc;

use crate::config::{BackendProvider, RagConfig};
use crate::error::Result;

pub use embedding::EmbeddingProvider;
pub use llm::AnswerSynthesizer;
pub use ollama::{OllamaEmbedder, OllamaProvider, OllamaSynthesizer};
pub use openai::{OpenAiEmbedder, OpenAiSynthesizer};
pub use vector_store::VectorStore;

/// The embedding and synthesis backends selected by configuration
#[derive(Clone)]
pub struct ProviderSet {
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub synthesizer: Arc<dyn AnswerSynthesizer>,
}

impl ProviderSet {
    /// Create providers for the configured backend
    pub fn from_config(config: &RagConfig) -> Result<Self> {
        let set = match config.backend {
            BackendProvider::Ollama => {
                let (embedder, synthesizer) =
                    OllamaProvider::new(&config.llm, &config.embeddings, &config.timeouts)?.split();
                Self {
                    embedder: Arc::new(embedder),
                    synthesizer: Arc::new(synthesizer),
                }
            }
            BackendProvider::OpenAi => {
                let (embedder, synthesizer) =
                    openai::openai_pair(&config.llm, &config.embeddings, &config.timeouts)?;
                Self {
                    embedder: Arc::new(embedder),
                    synthesizer: Arc::new(synthesizer),
                }
            }
        };

        tracing::info!(
            "Using {} embeddings ({} dims) and {} synthesis",
            set.embedder.name(),
            set.embedder.dimensions(),
            set.synthesizer.name()
        );
        Ok(set)
    }
}
