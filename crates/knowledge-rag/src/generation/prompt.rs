//! Prompt templates for grounded answer generation

use crate::types::ScoredRecord;

/// Separator placed between retrieved chunks in the context block
pub const CONTEXT_DELIMITER: &str = "\n\n---\n\n";

/// Prompt builder for retrieval-augmented queries
pub struct PromptBuilder;

impl PromptBuilder {
    /// Join chunk texts in the given (descending score) order
    pub fn build_context(results: &[ScoredRecord]) -> String {
        results
            .iter()
            .map(|r| r.record.chunk.text.as_str())
            .collect::<Vec<_>>()
            .join(CONTEXT_DELIMITER)
    }

    /// System instructions for chat-style models
    pub fn system_prompt() -> &'static str {
        "You answer questions using only the provided context. \
         If the context does not contain the answer, say that you don't know."
    }

    /// Build the full single-turn prompt
    pub fn build_rag_prompt(question: &str, context: &str) -> String {
        format!(
            r#"Answer the question based only on the following context:

{context}

---

Answer the question based on the above context: {question}"#,
            context = context,
            question = question
        )
    }
}
