//! knowledge-rag binary: HTTP server plus ingestion and query commands
//!
//! Run with: cargo run -p knowledge-rag -- serve

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use knowledge_rag::{
    config::{BackendProvider, RagConfig},
    generation::OllamaClient,
    server::{state::AppState, RagServer},
    Document, FileKind,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "knowledge-rag")]
#[command(about = "Document ingestion and question answering with grounded answers")]
#[command(version)]
struct Cli {
    /// Path to a TOML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve,

    /// Ingest every supported file under a directory
    Ingest {
        /// Directory to walk
        path: PathBuf,

        /// Only ingest files with these extensions (e.g. md, pdf)
        #[arg(short, long = "ext")]
        extensions: Vec<String>,

        /// Clear the store before ingesting
        #[arg(long)]
        reset: bool,
    },

    /// Ask a question against the stored documents
    Query {
        /// The question
        question: String,

        /// Number of chunks to retrieve (default: retrieval.top_k)
        #[arg(short, long)]
        k: Option<usize>,

        /// Print the retrieved context instead of an answer
        #[arg(long)]
        context_only: bool,
    },

    /// Delete every stored record
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "knowledge_rag=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = RagConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Serve => serve(config).await,
        Commands::Ingest {
            path,
            extensions,
            reset,
        } => ingest_dir(config, &path, &extensions, reset).await,
        Commands::Query {
            question,
            k,
            context_only,
        } => query(config, &question, k, context_only).await,
        Commands::Clear => {
            let state = AppState::new(config)?;
            let removed = state.store().len().await?;
            state.store().clear().await?;
            println!("Removed {} records", removed);
            Ok(())
        }
    }
}

async fn serve(config: RagConfig) -> Result<()> {
    println!(
        r#"
╔═══════════════════════════════════════════════════════════╗
║                      Knowledge RAG                        ║
║           Document Q&A with Grounded Answers              ║
╚═══════════════════════════════════════════════════════════╝
"#
    );

    tracing::info!("Configuration loaded");
    tracing::info!("  - Backend: {:?}", config.backend);
    tracing::info!("  - Embedding model: {}", config.embeddings.model);
    tracing::info!("  - Embedding dimensions: {}", config.embeddings.dimensions);
    tracing::info!("  - LLM model: {}", config.llm.generate_model);
    tracing::info!(
        "  - Chunk size: {} (overlap {})",
        config.chunking.chunk_size,
        config.chunking.chunk_overlap
    );
    tracing::info!("  - Vector store: {}", config.vector_db.path.display());

    if config.backend == BackendProvider::Ollama {
        tracing::info!("Checking Ollama at {}...", config.llm.base_url);
        let client = OllamaClient::new(&config.llm, &config.embeddings.model, &config.timeouts)?;
        if client.health_check().await {
            tracing::info!("Ollama is running");
        } else {
            tracing::warn!("Ollama not available at {}", config.llm.base_url);
            tracing::warn!("Please start Ollama:");
            tracing::warn!("  1. Start: ollama serve");
            tracing::warn!(
                "  2. Pull models: ollama pull {} && ollama pull {}",
                config.embeddings.model,
                config.llm.generate_model
            );
        }
    }

    let server = RagServer::new(config)?;

    println!("\nServer starting...");
    println!("  API: http://{}", server.address());
    println!("  Health: http://{}/health", server.address());
    println!("  Info: http://{}/info", server.address());
    println!("\nEndpoints:");
    println!("  POST /upload - Upload a document");
    println!("  POST /query  - Ask a question");
    println!("\nPress Ctrl+C to stop\n");

    server.start().await?;
    Ok(())
}

/// Whether `path` should be ingested under the extension filter
fn wanted(path: &Path, extensions: &[String]) -> bool {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return false;
    };
    if extensions.is_empty() {
        return FileKind::from_extension(ext).is_some();
    }
    extensions
        .iter()
        .any(|wanted| wanted.trim_start_matches('.').eq_ignore_ascii_case(ext))
}

async fn ingest_dir(config: RagConfig, root: &Path, extensions: &[String], reset: bool) -> Result<()> {
    let state = AppState::new(config)?;

    if reset {
        state.store().clear().await?;
        tracing::info!("Cleared vector store");
    }

    let files: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!("Skipping unreadable entry: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| wanted(path, extensions))
        .collect();

    tracing::info!("Found {} files under {}", files.len(), root.display());

    let mut total_records = 0usize;
    let mut failed = 0usize;
    for path in &files {
        let source_id = path
            .strip_prefix(root)
            .unwrap_or(path)
            .to_string_lossy()
            .to_string();

        match ingest_file(&state, path, &source_id).await {
            Ok(stored) => {
                total_records += stored;
                println!("  ✓ {} ({} chunks)", source_id, stored);
            }
            Err(e) => {
                failed += 1;
                tracing::error!("Failed to ingest {}: {}", source_id, e);
                println!("  ✗ {}: {}", source_id, e.user_message());
            }
        }
    }

    println!(
        "\nIngested {} files ({} failed), {} records stored, {} in store",
        files.len() - failed,
        failed,
        total_records,
        state.store().len().await?
    );
    Ok(())
}

async fn ingest_file(state: &AppState, path: &Path, source_id: &str) -> knowledge_rag::Result<usize> {
    let data = tokio::fs::read(path).await?;
    let document = Document::new(source_id, data)?;
    let metadata = BTreeMap::from([("filename".to_string(), source_id.to_string())]);
    state.ingestion().ingest(document, source_id, &metadata).await
}

async fn query(config: RagConfig, question: &str, k: Option<usize>, context_only: bool) -> Result<()> {
    let k = k.unwrap_or(config.retrieval.top_k);
    let state = AppState::new(config)?;

    if context_only {
        match state.query().retrieve(question, k).await? {
            Some(retrieved) => {
                println!("{}", retrieved.context);
                for scored in &retrieved.records {
                    println!(
                        "\n[{:.3}] {} @ {}",
                        scored.score,
                        scored.record.chunk.source_id,
                        scored.record.chunk.start_offset
                    );
                }
            }
            None => println!("{}", knowledge_rag::NO_ANSWER_TEXT),
        }
        return Ok(());
    }

    let answer = state.query().answer(question, k).await?;
    println!("Response: {}", answer.text);
    if answer.is_grounded() {
        let sources: Vec<&str> = answer
            .supporting_chunks
            .iter()
            .map(|s| s.record.chunk.source_id.as_str())
            .collect();
        println!("Sources: {:?}", sources);
    }
    Ok(())
}
