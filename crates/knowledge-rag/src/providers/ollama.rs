//! Ollama-based providers for embeddings and answer synthesis
//!
//! Wraps `OllamaClient` to implement the provider traits.

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{EmbeddingConfig, LlmConfig, TimeoutConfig};
use crate::error::Result;
use crate::generation::OllamaClient;

use super::embedding::EmbeddingProvider;
use super::llm::AnswerSynthesizer;

/// Ollama embedding provider using nomic-embed-text or similar models
pub struct OllamaEmbedder {
    client: Arc<OllamaClient>,
    dimensions: usize,
}

impl OllamaEmbedder {
    /// Create from existing OllamaClient
    pub fn from_client(client: Arc<OllamaClient>, dimensions: usize) -> Self {
        Self { client, dimensions }
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.client.embed(text).await
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

/// Ollama answer synthesizer
pub struct OllamaSynthesizer {
    client: Arc<OllamaClient>,
}

impl OllamaSynthesizer {
    /// Create from existing OllamaClient
    pub fn from_client(client: Arc<OllamaClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AnswerSynthesizer for OllamaSynthesizer {
    async fn complete(&self, question: &str, context: &str) -> Result<String> {
        self.client.generate_answer(question, context).await
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

/// Combined Ollama provider that shares a single client for both embeddings and synthesis
pub struct OllamaProvider {
    embedder: OllamaEmbedder,
    synthesizer: OllamaSynthesizer,
}

impl OllamaProvider {
    /// Create a new combined Ollama provider
    pub fn new(
        llm: &LlmConfig,
        embeddings: &EmbeddingConfig,
        timeouts: &TimeoutConfig,
    ) -> Result<Self> {
        let client = Arc::new(OllamaClient::new(llm, &embeddings.model, timeouts)?);
        Ok(Self {
            embedder: OllamaEmbedder::from_client(Arc::clone(&client), embeddings.dimensions),
            synthesizer: OllamaSynthesizer::from_client(client),
        })
    }

    /// Split into separate providers
    pub fn split(self) -> (OllamaEmbedder, OllamaSynthesizer) {
        (self.embedder, self.synthesizer)
    }
}
