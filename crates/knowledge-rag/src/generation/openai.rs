//! OpenAI-compatible client for embeddings and chat completions

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;

use crate::config::{LlmConfig, TimeoutConfig};
use crate::error::{Error, Result};

use super::prompt::PromptBuilder;

/// Client for `/embeddings` and `/chat/completions` with bearer auth
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: String,
    chat_model: String,
    embed_model: String,
    temperature: f32,
    max_retries: u32,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

impl OpenAiClient {
    /// Create a client; fails when no API key is configured
    pub fn new(config: &LlmConfig, embed_model: &str, timeouts: &TimeoutConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| Error::Config("OpenAI backend requires an API key".to_string()))?;

        let client = Client::builder()
            .timeout(timeouts.synthesis().max(timeouts.embedding()))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.openai_base_url.trim_end_matches('/').to_string(),
            api_key,
            chat_model: config.generate_model.clone(),
            embed_model: embed_model.to_string(),
            temperature: config.temperature,
            max_retries: config.max_retries,
        })
    }

    async fn retry_request<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if attempt < self.max_retries => {
                    let delay = Duration::from_millis(500 * 2u64.pow(attempt));
                    tracing::warn!(
                        "OpenAI request failed (attempt {}/{}): {}, retrying in {:?}",
                        attempt + 1,
                        self.max_retries + 1,
                        e,
                        delay
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Embed one text
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/embeddings", self.base_url);

        let client = self.client.clone();
        let api_key = self.api_key.clone();
        let model = self.embed_model.clone();
        let text = text.to_string();

        self.retry_request(|| {
            let url = url.clone();
            let api_key = api_key.clone();
            let model = model.clone();
            let text = text.clone();
            let client = client.clone();

            async move {
                let response = client
                    .post(&url)
                    .bearer_auth(&api_key)
                    .json(&EmbeddingRequest {
                        model: &model,
                        input: &text,
                    })
                    .send()
                    .await
                    .map_err(|e| Error::embedding(format!("Embedding request failed: {}", e)))?;

                if !response.status().is_success() {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    return Err(Error::embedding(format!(
                        "Embedding failed: HTTP {} - {}",
                        status, body
                    )));
                }

                let parsed: EmbeddingResponse = response
                    .json()
                    .await
                    .map_err(|e| Error::embedding(format!("Failed to parse embedding response: {}", e)))?;

                parsed
                    .data
                    .into_iter()
                    .next()
                    .map(|d| d.embedding)
                    .ok_or_else(|| Error::embedding("Embedding response contained no data"))
            }
        })
        .await
    }

    /// Answer `question` from `context` with a system + user message pair
    pub async fn generate_answer(&self, question: &str, context: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let prompt = PromptBuilder::build_rag_prompt(question, context);

        tracing::info!("Generating answer with model: {}", self.chat_model);

        let client = self.client.clone();
        let api_key = self.api_key.clone();
        let model = self.chat_model.clone();
        let temperature = self.temperature;

        self.retry_request(|| {
            let url = url.clone();
            let api_key = api_key.clone();
            let model = model.clone();
            let prompt = prompt.clone();
            let client = client.clone();

            async move {
                let request = ChatRequest {
                    model: &model,
                    messages: vec![
                        ChatMessage {
                            role: "system",
                            content: PromptBuilder::system_prompt(),
                        },
                        ChatMessage {
                            role: "user",
                            content: &prompt,
                        },
                    ],
                    temperature,
                };

                let response = client
                    .post(&url)
                    .bearer_auth(&api_key)
                    .json(&request)
                    .send()
                    .await
                    .map_err(|e| Error::synthesis(format!("Chat request failed: {}", e)))?;

                if !response.status().is_success() {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    return Err(Error::synthesis(format!(
                        "Chat completion failed: HTTP {} - {}",
                        status, body
                    )));
                }

                let parsed: ChatResponse = response
                    .json()
                    .await
                    .map_err(|e| Error::synthesis(format!("Failed to parse chat response: {}", e)))?;

                parsed
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.message.content)
                    .map(|text| text.trim().to_string())
                    .ok_or_else(|| Error::synthesis("Chat response contained no content"))
            }
        })
        .await
    }
}
