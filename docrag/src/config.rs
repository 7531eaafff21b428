//! Configuration for chunking, indexing, retrieval and generation.
//!
//! [`RagConfig`] can be built in code through [`RagConfig::builder()`] or
//! loaded from TOML. Missing keys take their defaults:
//!
//! ```toml
//! top_k = 2
//! collection = "document_embeddings"
//! store_path = "./docrag-store"
//!
//! [chunking]
//! strategy = "recursive"
//! chunk_size = 1000
//! chunk_overlap = 200
//! encoding = "cl100k_base"
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::chunking::{
    ChunkStrategy, Chunker, FixedWidthChunker, RecursiveChunker, TokenChunker,
    validate_chunk_params,
};
use crate::error::{RagError, Result};
use crate::ids::IdStrategy;
use crate::tokenizer::{BpeTokenizer, Encoding, Tokenizer};

/// Default number of chunks retrieved per query.
pub const DEFAULT_TOP_K: usize = 2;
/// Default collection name.
pub const DEFAULT_COLLECTION: &str = "document_embeddings";
/// Default Ollama endpoint.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
/// Default embedding model.
pub const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text";
/// Default chat model.
pub const DEFAULT_CHAT_MODEL: &str = "mistral";

/// Chunking parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Which splitter to use.
    pub strategy: ChunkStrategy,
    /// Maximum chunk size, in characters (or tokens for [`ChunkStrategy::Token`]).
    pub chunk_size: usize,
    /// Overlap between consecutive chunks, in the same unit as `chunk_size`.
    pub chunk_overlap: usize,
    /// Separator for [`ChunkStrategy::FixedWidth`]; defaults to `"\n"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub separator: Option<String>,
    /// Byte-pair encoding for [`ChunkStrategy::Token`] when no
    /// `tokenizer_path` is set.
    pub encoding: Encoding,
    /// `tokenizer.json` for [`ChunkStrategy::Token`], overriding `encoding`.
    /// Requires the `hf-tokenizer` feature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokenizer_path: Option<PathBuf>,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            strategy: ChunkStrategy::Recursive,
            chunk_size: 1000,
            chunk_overlap: 200,
            separator: None,
            encoding: Encoding::default(),
            tokenizer_path: None,
        }
    }
}

impl ChunkingConfig {
    /// Validate that the parameters describe a terminating split.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidConfiguration`] if `chunk_overlap >= chunk_size`
    /// or `chunk_size == 0`.
    pub fn validate(&self) -> Result<()> {
        validate_chunk_params(self.chunk_size, self.chunk_overlap)
    }

    /// Construct the configured [`Chunker`].
    pub fn build_chunker(&self) -> Result<Box<dyn Chunker>> {
        Ok(match self.strategy {
            ChunkStrategy::Recursive => {
                Box::new(RecursiveChunker::new(self.chunk_size, self.chunk_overlap)?)
            }
            ChunkStrategy::FixedWidth => {
                let chunker = FixedWidthChunker::new(self.chunk_size, self.chunk_overlap)?;
                match &self.separator {
                    Some(separator) => Box::new(chunker.with_separator(separator.clone())),
                    None => Box::new(chunker),
                }
            }
            ChunkStrategy::Token => {
                Box::new(TokenChunker::new(self.chunk_size, self.chunk_overlap, self.tokenizer()?)?)
            }
        })
    }

    /// The tokenizer used for token-count chunking.
    pub fn tokenizer(&self) -> Result<Arc<dyn Tokenizer>> {
        match &self.tokenizer_path {
            None => Ok(Arc::new(BpeTokenizer::new(self.encoding)?)),
            #[cfg(feature = "hf-tokenizer")]
            Some(path) => Ok(Arc::new(crate::tokenizer::HfTokenizer::from_file(path)?)),
            #[cfg(not(feature = "hf-tokenizer"))]
            Some(path) => Err(RagError::InvalidConfiguration(format!(
                "tokenizer file {} requires the `hf-tokenizer` feature",
                path.display()
            ))),
        }
    }
}

/// Configuration parameters for the whole pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RagConfig {
    /// Chunking parameters.
    pub chunking: ChunkingConfig,
    /// Number of chunks retrieved per query.
    pub top_k: usize,
    /// Collection name in the vector store.
    pub collection: String,
    /// Directory of the local vector store.
    pub store_path: PathBuf,
    /// Record id policy used by the indexer.
    pub id_strategy: IdStrategy,
    /// Ollama endpoint for embeddings and chat.
    pub ollama_url: String,
    /// Embedding model name.
    pub embedding_model: String,
    /// Chat model name.
    pub chat_model: String,
    /// Upper bound on one generation call, in seconds. No bound when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_timeout_secs: Option<u64>,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunking: ChunkingConfig::default(),
            top_k: DEFAULT_TOP_K,
            collection: DEFAULT_COLLECTION.to_string(),
            store_path: PathBuf::from("./docrag-store"),
            id_strategy: IdStrategy::default(),
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            generation_timeout_secs: None,
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)
            .map_err(|e| RagError::InvalidConfiguration(format!("invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| {
            RagError::InvalidConfiguration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&source)
    }

    /// Validate cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidConfiguration`] if:
    /// - `chunk_overlap >= chunk_size`
    /// - `top_k == 0`
    /// - `collection` is empty
    pub fn validate(&self) -> Result<()> {
        self.chunking.validate()?;
        if self.top_k == 0 {
            return Err(RagError::InvalidConfiguration("top_k must be greater than zero".into()));
        }
        if self.collection.is_empty() {
            return Err(RagError::InvalidConfiguration("collection must not be empty".into()));
        }
        Ok(())
    }

    /// The generation timeout as a [`Duration`].
    pub fn generation_timeout(&self) -> Option<Duration> {
        self.generation_timeout_secs.map(Duration::from_secs)
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the chunking strategy.
    pub fn strategy(mut self, strategy: ChunkStrategy) -> Self {
        self.config.chunking.strategy = strategy;
        self
    }

    /// Set the maximum chunk size.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunking.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunking.chunk_overlap = overlap;
        self
    }

    /// Set the number of chunks retrieved per query.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the collection name.
    pub fn collection(mut self, name: impl Into<String>) -> Self {
        self.config.collection = name.into();
        self
    }

    /// Set the local store directory.
    pub fn store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.store_path = path.into();
        self
    }

    /// Set the id strategy.
    pub fn id_strategy(mut self, strategy: IdStrategy) -> Self {
        self.config.id_strategy = strategy;
        self
    }

    /// Set the embedding model.
    pub fn embedding_model(mut self, model: impl Into<String>) -> Self {
        self.config.embedding_model = model.into();
        self
    }

    /// Set the chat model.
    pub fn chat_model(mut self, model: impl Into<String>) -> Self {
        self.config.chat_model = model.into();
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_pipeline() {
        let config = RagConfig::default();
        assert_eq!(config.chunking.chunk_size, 1000);
        assert_eq!(config.chunking.chunk_overlap, 200);
        assert_eq!(config.top_k, 2);
        assert_eq!(config.collection, "document_embeddings");
        assert_eq!(config.embedding_model, "nomic-embed-text");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_rejects_overlap_not_less_than_size() {
        let result = RagConfig::builder().chunk_size(100).chunk_overlap(100).build();
        assert!(matches!(result, Err(RagError::InvalidConfiguration(_))));
    }

    #[test]
    fn builder_rejects_zero_top_k() {
        assert!(RagConfig::builder().top_k(0).build().is_err());
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let config = RagConfig::from_toml_str(
            r#"
            top_k = 4

            [chunking]
            strategy = "character"
            chunk_size = 300
            chunk_overlap = 30
            "#,
        )
        .unwrap();
        assert_eq!(config.top_k, 4);
        assert_eq!(config.chunking.strategy, ChunkStrategy::FixedWidth);
        assert_eq!(config.chunking.chunk_size, 300);
        assert_eq!(config.collection, DEFAULT_COLLECTION);
    }

    #[test]
    fn invalid_toml_chunking_fails_validation() {
        let result = RagConfig::from_toml_str("[chunking]\nchunk_size = 10\nchunk_overlap = 20\n");
        assert!(matches!(result, Err(RagError::InvalidConfiguration(_))));
    }

    #[test]
    fn token_strategy_uses_configured_encoding() {
        assert_eq!(ChunkingConfig::default().tokenizer().unwrap().name(), "cl100k_base");

        let config = RagConfig::from_toml_str(
            r#"
            [chunking]
            strategy = "token"
            chunk_size = 50
            chunk_overlap = 5
            encoding = "p50k_base"
            "#,
        )
        .unwrap();
        assert_eq!(config.chunking.encoding, Encoding::P50kBase);
        assert_eq!(config.chunking.tokenizer().unwrap().name(), "p50k_base");
    }

    #[test]
    fn builds_each_strategy() {
        for strategy in [ChunkStrategy::Recursive, ChunkStrategy::FixedWidth, ChunkStrategy::Token] {
            let config = ChunkingConfig { strategy, chunk_size: 8, chunk_overlap: 2, ..Default::default() };
            let chunker = config.build_chunker().unwrap();
            assert!(!chunker.split_text("some text to split up").unwrap().is_empty());
        }
    }
}
