//! OpenAI-compatible providers

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{EmbeddingConfig, LlmConfig, TimeoutConfig};
use crate::error::Result;
use crate::generation::OpenAiClient;

use super::embedding::EmbeddingProvider;
use super::llm::AnswerSynthesizer;

/// Embeddings from `/embeddings`
pub struct OpenAiEmbedder {
    client: Arc<OpenAiClient>,
    dimensions: usize,
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.client.embed(text).await
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "openai"
    }
}

/// Answers from `/chat/completions`
pub struct OpenAiSynthesizer {
    client: Arc<OpenAiClient>,
}

#[async_trait]
impl AnswerSynthesizer for OpenAiSynthesizer {
    async fn complete(&self, question: &str, context: &str) -> Result<String> {
        self.client.generate_answer(question, context).await
    }

    fn name(&self) -> &str {
        "openai"
    }
}

/// Build an embedder and synthesizer sharing one client
pub fn openai_pair(
    llm: &LlmConfig,
    embeddings: &EmbeddingConfig,
    timeouts: &TimeoutConfig,
) -> Result<(OpenAiEmbedder, OpenAiSynthesizer)> {
    let client = Arc::new(OpenAiClient::new(llm, &embeddings.model, timeouts)?);
    Ok((
        OpenAiEmbedder {
            client: Arc::clone(&client),
            dimensions: embeddings.dimensions,
        },
        OpenAiSynthesizer { client },
    ))
}
