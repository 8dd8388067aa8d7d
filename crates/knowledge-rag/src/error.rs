//! Error types for the ingestion and query pipelines

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline errors
///
/// Every collaborator failure is mapped onto one of these variants at the call
/// site, including timeouts, so callers can match on the stage that failed.
#[derive(Debug, Error)]
pub enum Error {
    /// File type is not in the supported set
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// Content could not be read as the declared file type
    #[error("Failed to extract text from '{filename}': {message}")]
    ExtractionFailure { filename: String, message: String },

    /// Embedding provider failed or timed out
    #[error("Embedding generation failed: {0}")]
    EmbeddingFailure(String),

    /// Vector store failed or timed out
    #[error("Vector store error: {0}")]
    StoreFailure(String),

    /// Answer synthesizer failed or timed out
    #[error("Answer synthesis failed: {0}")]
    SynthesisFailure(String),

    /// Caller supplied an invalid argument
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create an extraction error
    pub fn extraction(filename: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ExtractionFailure {
            filename: filename.into(),
            message: message.into(),
        }
    }

    /// Create an embedding error
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::EmbeddingFailure(message.into())
    }

    /// Create a vector store error
    pub fn store(message: impl Into<String>) -> Self {
        Self::StoreFailure(message.into())
    }

    /// Create a synthesis error
    pub fn synthesis(message: impl Into<String>) -> Self {
        Self::SynthesisFailure(message.into())
    }

    /// Create an invalid input error
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Short machine-readable kind, used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            Error::UnsupportedFormat(_) => "unsupported_format",
            Error::ExtractionFailure { .. } => "extraction_failure",
            Error::EmbeddingFailure(_) => "embedding_failure",
            Error::StoreFailure(_) => "store_failure",
            Error::SynthesisFailure(_) => "synthesis_failure",
            Error::InvalidInput(_) => "invalid_input",
            Error::Config(_) => "config_error",
            Error::Io(_) => "io_error",
        }
    }

    /// Human-readable message safe to hand back to HTTP clients.
    ///
    /// Collaborator failures are reported by stage only; their details stay in
    /// the server log.
    pub fn user_message(&self) -> String {
        match self {
            Error::UnsupportedFormat(ext) => format!("Unsupported file format: {}", ext),
            Error::ExtractionFailure { filename, .. } => {
                format!("Could not read text from '{}'", filename)
            }
            Error::EmbeddingFailure(_) => "Embedding service is unavailable".to_string(),
            Error::StoreFailure(_) => "Document store is unavailable".to_string(),
            Error::SynthesisFailure(_) => "Answer service is unavailable".to_string(),
            Error::InvalidInput(msg) => msg.clone(),
            Error::Config(_) | Error::Io(_) => "Internal server error".to_string(),
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::StoreFailure(err.to_string())
    }
}
