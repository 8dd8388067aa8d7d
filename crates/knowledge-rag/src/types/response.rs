//! Query results and HTTP response bodies

use serde::{Deserialize, Serialize};

use crate::error::Error;

use super::document::ScoredRecord;

/// Text returned when no stored chunk is relevant enough to answer from
pub const NO_ANSWER_TEXT: &str = "Unable to find matching results.";

/// Result of answering one question
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    /// Synthesized answer, or [`NO_ANSWER_TEXT`]
    pub text: String,
    /// Records the answer was grounded on, descending by score
    pub supporting_chunks: Vec<ScoredRecord>,
    /// False for the "no answer found" result
    grounded: bool,
}

impl Answer {
    /// An answer produced by the synthesizer
    pub fn grounded(text: String, supporting_chunks: Vec<ScoredRecord>) -> Self {
        Self {
            text,
            supporting_chunks,
            grounded: true,
        }
    }

    /// The "no answer found" result; the synthesizer was not consulted
    pub fn not_found() -> Self {
        Self {
            text: NO_ANSWER_TEXT.to_string(),
            supporting_chunks: Vec::new(),
            grounded: false,
        }
    }

    /// Whether the synthesizer produced this answer
    pub fn is_grounded(&self) -> bool {
        self.grounded
    }

    /// Best relevance score among the supporting chunks
    pub fn top_score(&self) -> Option<f32> {
        self.supporting_chunks.first().map(|r| r.score)
    }
}

/// Context retrieved for a question without synthesis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedContext {
    /// Chunk texts joined by the context delimiter
    pub context: String,
    /// Records that made it past the relevance gate
    pub records: Vec<ScoredRecord>,
}

/// Body of `POST /upload`
///
/// Failures are reported in the body with HTTP 200.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UploadResponse {
    Success { message: String },
    Failure { error: String },
}

impl UploadResponse {
    /// Successful ingestion
    pub fn processed() -> Self {
        Self::Success {
            message: "Document processed successfully".to_string(),
        }
    }
}

impl From<&Error> for UploadResponse {
    fn from(err: &Error) -> Self {
        Self::Failure {
            error: err.user_message(),
        }
    }
}

/// Body of `POST /query`
///
/// Failures are reported in the body with HTTP 200.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryResponse {
    Success { response: String },
    Failure { error: String },
}

impl From<Answer> for QueryResponse {
    fn from(answer: Answer) -> Self {
        Self::Success {
            response: answer.text,
        }
    }
}

impl From<&Error> for QueryResponse {
    fn from(err: &Error) -> Self {
        Self::Failure {
            error: err.user_message(),
        }
    }
}
