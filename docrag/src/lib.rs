//! Retrieval-augmented generation over local documents.
//!
//! This crate provides:
//! - Document loading from text (and, with `pdf`, PDF) files
//! - Chunking by recursive separators, a fixed separator, or token count
//! - Indexing of chunk embeddings into an in-memory or local JSON vector store
//! - Cosine-similarity retrieval and grounded answer generation
//! - An interactive question-answering session loop
//!
//! Embeddings and chat go through the [`EmbeddingProvider`] and
//! [`LanguageModel`] traits. The `ollama` feature (default) provides
//! implementations backed by a local Ollama server; `openai` adds an
//! OpenAI-compatible embedding provider.

pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod generator;
pub mod ids;
pub mod indexer;
pub mod inmemory;
pub mod llm;
pub mod loader;
pub mod local;
pub mod retriever;
pub mod session;
pub mod tokenizer;
pub mod vectorstore;

#[cfg(feature = "ollama")]
pub mod ollama;
#[cfg(feature = "openai")]
pub mod openai;

pub use chunking::{ChunkStrategy, Chunker, FixedWidthChunker, RecursiveChunker, TokenChunker};
pub use config::{ChunkingConfig, RagConfig, RagConfigBuilder};
pub use document::{Chunk, Document, EmbeddingRecord, RetrievedChunk};
pub use embedding::EmbeddingProvider;
pub use error::{RagError, Result};
pub use generator::{DEFAULT_INSTRUCTION, GroundedGenerator};
pub use ids::IdStrategy;
pub use indexer::{IndexReport, Indexer, IndexerBuilder};
pub use inmemory::InMemoryVectorStore;
pub use llm::{LanguageModel, Message, Role};
pub use loader::{DocumentLoader, LoaderRegistry, TextLoader, UnknownExtensionPolicy};
pub use local::LocalVectorStore;
pub use retriever::Retriever;
pub use session::{Session, SessionInput};
pub use tokenizer::{BpeTokenizer, Encoding, RegexTokenizer, Token, Tokenizer};
pub use vectorstore::{CollectionInfo, Metric, VectorStore, cosine_similarity};

#[cfg(feature = "pdf")]
pub use loader::PdfLoader;
#[cfg(feature = "ollama")]
pub use ollama::{OllamaChatModel, OllamaEmbeddingProvider};
#[cfg(feature = "openai")]
pub use openai::OpenAIEmbeddingProvider;
#[cfg(feature = "hf-tokenizer")]
pub use tokenizer::HfTokenizer;
