//! Answer synthesizer trait for generating grounded answers

use async_trait::async_trait;
use crate::error::Result;

/// Trait for LLM-based answer generation
///
/// Output is treated as non-deterministic even at temperature 0.
///
/// Implementations:
/// - `OllamaSynthesizer`: Local Ollama server (`/api/generate`)
/// - `OpenAiSynthesizer`: OpenAI-compatible chat completions
#[async_trait]
pub trait AnswerSynthesizer: Send + Sync {
    /// Answer `question` using only the retrieved `context` block
    async fn complete(&self, question: &str, context: &str) -> Result<String>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}
