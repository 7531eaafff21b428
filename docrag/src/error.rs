//! Error types for the `docrag` crate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur in chunking, indexing, retrieval and generation.
#[derive(Debug, Error)]
pub enum RagError {
    /// Chunking or pipeline parameters are inconsistent (e.g. overlap >= chunk size).
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Input text or query was empty.
    #[error("Empty input: {0}")]
    EmptyInput(String),

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingProvider {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The collection does not exist or holds no records.
    #[error("Index unavailable ({collection}): {reason}")]
    IndexUnavailable {
        /// The collection that was queried.
        collection: String,
        /// Why the index cannot serve the request.
        reason: String,
    },

    /// An error occurred in the vector store backend.
    #[error("Vector store error ({backend}): {message}")]
    VectorStore {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// The language model call failed or timed out.
    #[error("Generation error ({provider}): {message}")]
    Generation {
        /// The language model provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// No loader is registered for the file's extension.
    #[error("Unsupported format '{extension}' for {}", path.display())]
    UnsupportedFormat {
        /// The file that could not be loaded.
        path: PathBuf,
        /// The lowercase extension, empty when the file has none.
        extension: String,
    },

    /// A loader failed to read or parse a file.
    #[error("Failed to load {}: {message}", path.display())]
    Load {
        /// The file that could not be loaded.
        path: PathBuf,
        /// A description of the failure.
        message: String,
    },

    /// The collection was built with a different embedding model or dimension.
    #[error(
        "Embedding model mismatch in collection '{collection}': index uses {expected}, provider uses {actual}"
    )]
    EmbeddingModelMismatch {
        /// The collection being opened.
        collection: String,
        /// Model and dimensions recorded in the collection.
        expected: String,
        /// Model and dimensions of the configured provider.
        actual: String,
    },

    /// An I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A (de)serialization error in persisted data.
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
