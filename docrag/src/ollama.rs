//! Ollama embedding provider and chat model.
//!
//! This module is only available when the `ollama` feature is enabled.

use async_trait::async_trait;
use ollama_rs::Ollama;
use ollama_rs::generation::chat::ChatMessage;
use ollama_rs::generation::chat::request::ChatMessageRequest;
use ollama_rs::generation::embeddings::request::{EmbeddingsInput, GenerateEmbeddingsRequest};
use tracing::{debug, error, info};

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::llm::{LanguageModel, Message, Role};

const PROVIDER: &str = "Ollama";
const DEFAULT_PORT: u16 = 11434;

/// Split `http://host:port` into the form `Ollama::new` expects.
fn parse_host_port(url: &str) -> (String, u16) {
    let url = url.trim_end_matches('/');
    match url.rsplit_once(':').map(|(host, port)| (host, port.parse::<u16>())) {
        Some((host, Ok(port))) => (host.to_string(), port),
        _ => (url.to_string(), DEFAULT_PORT),
    }
}

fn client(base_url: &str) -> Ollama {
    let (host, port) = parse_host_port(base_url);
    Ollama::new(host, port)
}

fn embedding_error(message: impl Into<String>) -> RagError {
    RagError::EmbeddingProvider { provider: PROVIDER.to_string(), message: message.into() }
}

/// An [`EmbeddingProvider`] backed by a local Ollama server.
///
/// # Example
///
/// ```rust,ignore
/// use docrag::ollama::OllamaEmbeddingProvider;
///
/// let provider = OllamaEmbeddingProvider::connect("http://localhost:11434", "nomic-embed-text").await?;
/// let embedding = provider.embed("hello world").await?;
/// ```
#[derive(Debug, Clone)]
pub struct OllamaEmbeddingProvider {
    client: Ollama,
    model: String,
    dimensions: usize,
}

impl OllamaEmbeddingProvider {
    /// Create a provider for a model whose dimensionality is known.
    pub fn new(base_url: &str, model: impl Into<String>, dimensions: usize) -> Self {
        Self { client: client(base_url), model: model.into(), dimensions }
    }

    /// Create a provider, discovering the dimensionality with one probe request.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmbeddingProvider`] if the server is unreachable or
    /// the model is not pulled.
    pub async fn connect(base_url: &str, model: impl Into<String>) -> Result<Self> {
        let mut provider = Self::new(base_url, model, 0);
        let probe = provider.request(vec!["dimension probe".to_string()]).await?;
        provider.dimensions = probe.first().map_or(0, Vec::len);
        if provider.dimensions == 0 {
            let message = format!("model '{}' returned an empty embedding", provider.model);
            return Err(embedding_error(message));
        }
        info!(model = %provider.model, dimensions = provider.dimensions, "connected to Ollama");
        Ok(provider)
    }

    async fn request(&self, inputs: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let request =
            GenerateEmbeddingsRequest::new(self.model.clone(), EmbeddingsInput::Multiple(inputs));
        let response = self.client.generate_embeddings(request).await.map_err(|e| {
            error!(provider = PROVIDER, model = %self.model, error = %e, "embedding request failed");
            embedding_error(format!("embedding request failed: {e}"))
        })?;
        Ok(response.embeddings)
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!(provider = PROVIDER, text_len = text.len(), "embedding single text");
        self.request(vec![text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| embedding_error("server returned no embedding"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(provider = PROVIDER, batch_size = texts.len(), model = %self.model, "embedding batch");
        self.request(texts.iter().map(|t| (*t).to_string()).collect()).await
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

/// A [`LanguageModel`] backed by Ollama's chat endpoint.
#[derive(Debug, Clone)]
pub struct OllamaChatModel {
    client: Ollama,
    model: String,
}

impl OllamaChatModel {
    /// Create a chat model client.
    pub fn new(base_url: &str, model: impl Into<String>) -> Self {
        Self { client: client(base_url), model: model.into() }
    }
}

fn convert_message(message: &Message) -> ChatMessage {
    let content = message.content.clone();
    match message.role {
        Role::System => ChatMessage::system(content),
        Role::User => ChatMessage::user(content),
        Role::Assistant => ChatMessage::assistant(content),
    }
}

#[async_trait]
impl LanguageModel for OllamaChatModel {
    async fn generate(&self, messages: &[Message]) -> Result<String> {
        let messages = messages.iter().map(convert_message).collect();
        let request = ChatMessageRequest::new(self.model.clone(), messages);
        let response = self.client.send_chat_messages(request).await.map_err(|e| {
            error!(provider = PROVIDER, model = %self.model, error = %e, "chat request failed");
            RagError::Generation {
                provider: PROVIDER.to_string(),
                message: format!("chat request failed: {e}"),
            }
        })?;
        Ok(response.message.content)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_host_port_with_port() {
        let (host, port) = parse_host_port("http://localhost:11434/");
        assert_eq!(host, "http://localhost");
        assert_eq!(port, 11434);
        assert_eq!(parse_host_port("http://gpu-box:8080").1, 8080);
    }

    #[test]
    fn parse_host_port_without_port() {
        assert_eq!(parse_host_port("http://localhost"), ("http://localhost".to_string(), 11434));
    }

    #[test]
    fn provider_reports_model_and_dimensions() {
        let provider =
            OllamaEmbeddingProvider::new("http://localhost:11434", "nomic-embed-text", 768);
        assert_eq!(provider.model_id(), "nomic-embed-text");
        assert_eq!(provider.dimensions(), 768);
    }

    #[test]
    fn converts_roles() {
        let converted = convert_message(&Message::system("rules"));
        assert_eq!(converted.content, "rules");
        let converted = convert_message(&Message::assistant("reply"));
        assert_eq!(converted.content, "reply");
    }
}
