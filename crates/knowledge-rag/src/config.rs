//! Configuration for the ingestion and query service

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Main service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Backend provider for embeddings and answer synthesis
    pub backend: BackendProvider,
    /// Server configuration
    pub server: ServerConfig,
    /// Chunking configuration
    pub chunking: ChunkingConfig,
    /// Retrieval configuration
    pub retrieval: RetrievalConfig,
    /// Embedding configuration
    pub embeddings: EmbeddingConfig,
    /// LLM configuration
    pub llm: LlmConfig,
    /// Vector database configuration
    pub vector_db: VectorDbConfig,
    /// Ingestion configuration
    pub ingestion: IngestionConfig,
    /// Call-site timeouts for external collaborators
    pub timeouts: TimeoutConfig,
}

impl RagConfig {
    /// Load configuration from an optional TOML file, then apply environment overrides.
    ///
    /// Missing sections and fields fall back to their defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    Error::Config(format!("Failed to read {}: {}", path.display(), e))
                })?;
                Self::from_toml_str(&raw)?
            }
            None => Self::default(),
        };

        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| Error::Config(format!("Invalid config: {}", e)))
    }

    /// Apply `OPENAI_API_KEY` and `KNOWLEDGE_RAG_*` environment overrides
    pub fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            if !key.trim().is_empty() {
                self.llm.api_key = Some(key);
            }
        }
        if let Ok(url) = std::env::var("KNOWLEDGE_RAG_LLM_URL") {
            self.llm.base_url = url;
        }
        if let Ok(path) = std::env::var("KNOWLEDGE_RAG_DB_PATH") {
            self.vector_db.path = PathBuf::from(path);
        }
        if let Ok(port) = std::env::var("KNOWLEDGE_RAG_PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!("Ignoring invalid KNOWLEDGE_RAG_PORT: {}", port),
            }
        }
    }

    /// Reject configurations the pipelines cannot run with
    pub fn validate(&self) -> Result<()> {
        self.chunking.validate()?;
        self.timeouts.validate()?;

        if !(0.0..=1.0).contains(&self.retrieval.relevance_threshold) {
            return Err(Error::Config(format!(
                "retrieval.relevance_threshold must be within [0, 1], got {}",
                self.retrieval.relevance_threshold
            )));
        }
        if self.retrieval.top_k == 0 {
            return Err(Error::Config("retrieval.top_k must be at least 1".to_string()));
        }
        if self.embeddings.dimensions == 0 {
            return Err(Error::Config("embeddings.dimensions must be at least 1".to_string()));
        }
        if self.backend == BackendProvider::OpenAi && self.llm.api_key.is_none() {
            return Err(Error::Config(
                "backend = \"openai\" requires llm.api_key or OPENAI_API_KEY".to_string(),
            ));
        }
        Ok(())
    }
}

/// Which hosted service backs embeddings and answer synthesis
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendProvider {
    /// Local Ollama server
    #[default]
    Ollama,
    /// OpenAI-compatible API
    #[serde(rename = "openai")]
    OpenAi,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
    /// Maximum upload size in bytes (default: 50MB)
    pub max_upload_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            enable_cors: true,
            max_upload_size: 50 * 1024 * 1024,
        }
    }
}

/// Text chunking configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Window size in characters
    pub chunk_size: usize,
    /// Characters shared by consecutive windows
    pub chunk_overlap: usize,
}

impl ChunkingConfig {
    /// Check `chunk_size > 0` and `overlap < chunk_size`
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::invalid("chunk_size must be greater than 0"));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(Error::invalid(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of chunks retrieved per question
    pub top_k: usize,
    /// Minimum score of the best match before the synthesizer is called
    pub relevance_threshold: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 4,
            relevance_threshold: 0.7,
        }
    }
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Embedding model name
    pub model: String,
    /// Embedding dimensions (768 for nomic-embed-text, 1536 for text-embedding-3-small)
    pub dimensions: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "nomic-embed-text".to_string(),
            dimensions: 768,
        }
    }
}

/// LLM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Ollama base URL
    pub base_url: String,
    /// OpenAI-compatible API base URL
    pub openai_base_url: String,
    /// Generation model name
    pub generate_model: String,
    /// Temperature for generation
    pub temperature: f32,
    /// Retries for failed requests, applied inside the HTTP clients
    pub max_retries: u32,
    /// API key, only used by the OpenAI backend
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            openai_base_url: "https://api.openai.com/v1".to_string(),
            generate_model: "llama3.2:3b".to_string(),
            temperature: 0.0,
            max_retries: 2,
            api_key: None,
        }
    }
}

/// Vector database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorDbConfig {
    /// SQLite file holding the corpus; `:memory:` keeps it in process
    pub path: PathBuf,
}

impl VectorDbConfig {
    /// Whether the store lives only in memory
    pub fn is_in_memory(&self) -> bool {
        self.path.as_os_str() == ":memory:"
    }
}

impl Default for VectorDbConfig {
    fn default() -> Self {
        let path = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("knowledge-rag")
            .join("vectors.sqlite3");

        Self { path }
    }
}

/// Ingestion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    /// Concurrent embedding requests per document (default: CPU count, max 4)
    pub embed_concurrency: Option<usize>,
}

impl IngestionConfig {
    /// Effective embedding fan-out
    pub fn embed_concurrency(&self) -> usize {
        self.embed_concurrency
            .unwrap_or_else(|| num_cpus::get().min(4))
            .max(1)
    }
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            embed_concurrency: None,
        }
    }
}

/// Timeouts applied around every external call
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Text extraction of one document
    pub extraction_secs: u64,
    /// One embedding request
    pub embedding_secs: u64,
    /// One vector store operation
    pub store_secs: u64,
    /// One answer synthesis request
    pub synthesis_secs: u64,
}

impl TimeoutConfig {
    pub fn extraction(&self) -> Duration {
        Duration::from_secs(self.extraction_secs)
    }

    pub fn embedding(&self) -> Duration {
        Duration::from_secs(self.embedding_secs)
    }

    pub fn store(&self) -> Duration {
        Duration::from_secs(self.store_secs)
    }

    pub fn synthesis(&self) -> Duration {
        Duration::from_secs(self.synthesis_secs)
    }

    /// A zero timeout would fail every call of its stage
    pub fn validate(&self) -> Result<()> {
        let limits = [
            ("extraction_secs", self.extraction_secs),
            ("embedding_secs", self.embedding_secs),
            ("store_secs", self.store_secs),
            ("synthesis_secs", self.synthesis_secs),
        ];
        match limits.iter().find(|(_, secs)| *secs == 0) {
            Some((name, _)) => Err(Error::Config(format!("timeouts.{} must be at least 1", name))),
            None => Ok(()),
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            extraction_secs: 60,
            embedding_secs: 60,
            store_secs: 30,
            synthesis_secs: 300,
        }
    }
}
