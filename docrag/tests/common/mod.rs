//! Deterministic providers shared by the integration tests.

#![allow(dead_code)]

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use docrag::{EmbeddingProvider, LanguageModel, Message, RagError, Result};

/// Embeds text as keyword counts over a fixed vocabulary, plus a small bias
/// component so no vector is all zeros.
pub struct KeywordEmbedder {
    vocabulary: Vec<&'static str>,
    model: String,
    pub calls: AtomicUsize,
}

impl KeywordEmbedder {
    pub fn new(vocabulary: &[&'static str]) -> Self {
        Self::with_model(vocabulary, "keyword-test")
    }

    pub fn with_model(vocabulary: &[&'static str], model: &str) -> Self {
        Self {
            vocabulary: vocabulary.to_vec(),
            model: model.to_string(),
            calls: AtomicUsize::new(0),
        }
    }

    fn vector(&self, text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        let mut vector: Vec<f32> =
            self.vocabulary.iter().map(|word| lower.matches(word).count() as f32).collect();
        vector.push(0.01);
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.vector(text))
    }

    fn dimensions(&self) -> usize {
        self.vocabulary.len() + 1
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

/// Fails on any text containing `trigger`.
pub struct FailingEmbedder {
    pub inner: KeywordEmbedder,
    pub trigger: &'static str,
}

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.contains(self.trigger) {
            return Err(RagError::EmbeddingProvider {
                provider: "failing".to_string(),
                message: format!("refusing to embed '{}'", self.trigger),
            });
        }
        self.inner.embed(text).await
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn model_id(&self) -> &str {
        self.inner.model_id()
    }
}

/// Returns one vector fewer than requested from `embed_batch`.
pub struct ShortBatchEmbedder(pub KeywordEmbedder);

#[async_trait]
impl EmbeddingProvider for ShortBatchEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.0.embed(text).await
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::new();
        for text in texts.iter().skip(1) {
            out.push(self.0.embed(text).await?);
        }
        Ok(out)
    }

    fn dimensions(&self) -> usize {
        self.0.dimensions()
    }

    fn model_id(&self) -> &str {
        self.0.model_id()
    }
}

/// Records every request and replies with a fixed answer, or an error when
/// the question contains `fail_on`.
pub struct ScriptedModel {
    pub reply: String,
    pub fail_on: Option<&'static str>,
    pub requests: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedModel {
    pub fn new(reply: &str) -> Self {
        Self { reply: reply.to_string(), fail_on: None, requests: Mutex::new(Vec::new()) }
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn generate(&self, messages: &[Message]) -> Result<String> {
        self.requests.lock().unwrap().push(messages.to_vec());
        let triggered =
            self.fail_on.is_some_and(|t| messages.iter().any(|m| m.content.contains(t)));
        if triggered {
            return Err(RagError::Generation {
                provider: "scripted".to_string(),
                message: "model unavailable".to_string(),
            });
        }
        Ok(self.reply.clone())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Never answers within any reasonable timeout.
pub struct StalledModel;

#[async_trait]
impl LanguageModel for StalledModel {
    async fn generate(&self, _messages: &[Message]) -> Result<String> {
        tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        Ok(String::new())
    }

    fn name(&self) -> &str {
        "stalled"
    }
}
