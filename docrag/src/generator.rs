//! Grounded answer generation.
//!
//! [`GroundedGenerator`] wraps a [`LanguageModel`] and constrains it to the
//! retrieved context with a fixed system instruction.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::document::RetrievedChunk;
use crate::error::{RagError, Result};
use crate::llm::{LanguageModel, Message};

/// The default grounding instruction sent as the system message.
pub const DEFAULT_INSTRUCTION: &str = "You are a helpful assistant that answers questions \
strictly based on the provided context. If the answer cannot be found in the context, reply \
\"I cannot answer this question based on the available documents.\" Do not make up or infer \
information that is not supported by the context.";

/// Produces answers grounded in retrieved chunks.
///
/// # Example
///
/// ```rust,ignore
/// let generator = GroundedGenerator::new(Arc::new(OllamaChatModel::new(url, "mistral")?));
/// let answer = generator.generate("What is the notice period?", &chunks).await?;
/// ```
pub struct GroundedGenerator {
    model: Arc<dyn LanguageModel>,
    instruction: String,
    timeout: Option<Duration>,
}

impl std::fmt::Debug for GroundedGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroundedGenerator")
            .field("model", &self.model.name())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl GroundedGenerator {
    /// Create a generator with the default instruction and no timeout.
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model, instruction: DEFAULT_INSTRUCTION.to_string(), timeout: None }
    }

    /// Replace the system instruction.
    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = instruction.into();
        self
    }

    /// Bound each model call by `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// The system instruction in use.
    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    /// Build the `[system, user]` message pair for a question.
    pub fn build_messages(&self, context: &str, query: &str) -> [Message; 2] {
        [
            Message::system(self.instruction.clone()),
            Message::user(format!("Context: {context}\n\nQuestion: {query}")),
        ]
    }

    /// Answer `query` from retrieved chunks, joined with newlines in order.
    pub async fn generate(&self, query: &str, chunks: &[RetrievedChunk]) -> Result<String> {
        let context = chunks.iter().map(|c| c.text.as_str()).collect::<Vec<_>>().join("\n");
        self.generate_with_context(&context, query).await
    }

    /// Answer `query` from an already assembled context string.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Generation`] if the model fails or the timeout elapses.
    pub async fn generate_with_context(&self, context: &str, query: &str) -> Result<String> {
        let messages = self.build_messages(context, query);
        debug!(model = self.model.name(), context_len = context.len(), "generating answer");

        let call = self.model.generate(&messages);
        let response = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call).await.map_err(|_| {
                let timeout_ms = limit.as_millis() as u64;
                error!(model = self.model.name(), timeout_ms, "generation timed out");
                RagError::Generation {
                    provider: self.model.name().to_string(),
                    message: format!("timed out after {limit:?}"),
                }
            })?,
            None => call.await,
        }
        .inspect_err(|e| error!(model = self.model.name(), error = %e, "generation failed"))?;

        let answer = response.trim().to_string();
        info!(model = self.model.name(), answer_len = answer.len(), "generated answer");
        Ok(answer)
    }
}
