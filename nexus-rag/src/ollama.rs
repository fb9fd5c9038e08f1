//! Embedding and chat completion against a local Ollama daemon.
//!
//! This module is only available when the `ollama` feature is enabled.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::completion::{ChatMessage, TextCompletion};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};

/// Default address of the Ollama HTTP API.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Default embedding model, a MiniLM-L6 sentence encoder.
pub const DEFAULT_EMBEDDING_MODEL: &str = "all-minilm";

/// Dimensionality of [`DEFAULT_EMBEDDING_MODEL`].
pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 384;

/// Default chat model.
pub const DEFAULT_CHAT_MODEL: &str = "llama3.2";

const PROVIDER: &str = "Ollama";

fn build_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder().timeout(timeout).build().unwrap_or_else(|e| {
        error!(provider = PROVIDER, error = %e, "falling back to default HTTP client");
        reqwest::Client::new()
    })
}

fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{path}", base_url.trim_end_matches('/'))
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
}

async fn error_detail(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ErrorResponse>(&body).map(|e| e.error).unwrap_or(body);
    format!("API returned {status}: {detail}")
}

/// An [`EmbeddingProvider`] backed by Ollama's `/api/embed` endpoint.
///
/// # Example
///
/// ```rust,ignore
/// use nexus_rag::ollama::OllamaEmbeddingProvider;
///
/// let provider = OllamaEmbeddingProvider::new(DEFAULT_OLLAMA_URL);
/// let embedding = provider.embed("The sky is blue.").await?;
/// ```
pub struct OllamaEmbeddingProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dimensions: usize,
}

impl OllamaEmbeddingProvider {
    /// Create a provider for the daemon at `base_url` using the default model.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: build_client(Duration::from_secs(30)),
            base_url: base_url.into(),
            model: DEFAULT_EMBEDDING_MODEL.into(),
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }

    /// Use a different model. `dimensions` must match what the model returns.
    pub fn with_model(mut self, model: impl Into<String>, dimensions: usize) -> Self {
        self.model = model.into();
        self.dimensions = dimensions;
        self
    }

    /// Set the HTTP request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = build_client(timeout);
        self
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed_batch(&[text]).await?;
        results.into_iter().next().ok_or_else(|| RagError::EmbeddingError {
            provider: PROVIDER.into(),
            message: "API returned empty response".into(),
        })
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            provider = PROVIDER,
            batch_size = texts.len(),
            model = %self.model,
            "embedding batch"
        );

        let response = self
            .client
            .post(endpoint(&self.base_url, "api/embed"))
            .json(&EmbedRequest { model: &self.model, input: texts.to_vec() })
            .send()
            .await
            .map_err(|e| {
                error!(provider = PROVIDER, error = %e, "request failed");
                RagError::EmbeddingError {
                    provider: PROVIDER.into(),
                    message: format!("request failed: {e}"),
                }
            })?;

        if !response.status().is_success() {
            let message = error_detail(response).await;
            error!(provider = PROVIDER, %message, "API error");
            return Err(RagError::EmbeddingError { provider: PROVIDER.into(), message });
        }

        let parsed: EmbedResponse = response.json().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "failed to parse response");
            RagError::EmbeddingError {
                provider: PROVIDER.into(),
                message: format!("failed to parse response: {e}"),
            }
        })?;

        if let Some(bad) = parsed.embeddings.iter().find(|e| e.len() != self.dimensions) {
            return Err(RagError::EmbeddingError {
                provider: PROVIDER.into(),
                message: format!(
                    "model '{}' returned {} dimensions, expected {}",
                    self.model,
                    bad.len(),
                    self.dimensions
                ),
            });
        }

        Ok(parsed.embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        PROVIDER
    }

    fn model_id(&self) -> String {
        format!("ollama/{}/{}", self.model, self.dimensions)
    }
}

/// A [`TextCompletion`] backed by Ollama's `/api/chat` endpoint.
pub struct OllamaCompletion {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaCompletion {
    /// Create a client for the daemon at `base_url` using [`DEFAULT_CHAT_MODEL`].
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: build_client(Duration::from_secs(300)),
            base_url: base_url.into(),
            model: DEFAULT_CHAT_MODEL.into(),
        }
    }

    /// Use a different chat model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the HTTP request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = build_client(timeout);
        self
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

#[async_trait]
impl TextCompletion for OllamaCompletion {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        debug!(provider = PROVIDER, model = %self.model, message_count = messages.len(), "chat");

        let response = self
            .client
            .post(endpoint(&self.base_url, "api/chat"))
            .json(&ChatRequest { model: &self.model, messages, stream: false })
            .send()
            .await
            .map_err(|e| RagError::CompletionError {
                provider: PROVIDER.into(),
                message: format!("request failed: {e}"),
            })?;

        if !response.status().is_success() {
            let message = error_detail(response).await;
            error!(provider = PROVIDER, %message, "chat API error");
            return Err(RagError::CompletionError { provider: PROVIDER.into(), message });
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| RagError::CompletionError {
            provider: PROVIDER.into(),
            message: format!("failed to parse response: {e}"),
        })?;
        Ok(parsed.message.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_without_double_slash() {
        assert_eq!(
            endpoint("http://localhost:11434/", "api/embed"),
            "http://localhost:11434/api/embed"
        );
        assert_eq!(endpoint("http://gpu:11434", "api/chat"), "http://gpu:11434/api/chat");
    }

    #[test]
    fn chat_request_uses_lowercase_roles() {
        let messages = [ChatMessage::system("be brief"), ChatMessage::user("hi")];
        let body = serde_json::to_value(ChatRequest {
            model: DEFAULT_CHAT_MODEL,
            messages: &messages,
            stream: false,
        })
        .unwrap();
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hi");
        assert_eq!(body["stream"], false);
    }

    #[test]
    fn chat_response_parses_assistant_message() {
        let raw = r#"{"model":"llama3.2","message":{"role":"assistant","content":"Blue."},"done":true}"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.message.content, "Blue.");
    }

    #[test]
    fn model_id_differs_from_offline_embedder_of_same_size() {
        let ollama = OllamaEmbeddingProvider::new(DEFAULT_OLLAMA_URL);
        let offline = crate::HashEmbeddingProvider::new(DEFAULT_EMBEDDING_DIMENSIONS);
        assert_eq!(ollama.dimensions(), offline.dimensions());
        assert_ne!(ollama.model_id(), offline.model_id());
        assert_ne!(
            ollama.model_id(),
            OllamaEmbeddingProvider::new(DEFAULT_OLLAMA_URL)
                .with_model("nomic-embed-text", 384)
                .model_id()
        );
    }
}
