//! Data types for documents, chunks, stored records and retrieval results.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Metadata key holding the source identifier (usually a file path).
pub const SOURCE_KEY: &str = "source";
/// Metadata key holding the lowercase file extension.
pub const FILE_TYPE_KEY: &str = "file_type";
/// Metadata key holding a chunk's ordinal within its document.
pub const CHUNK_INDEX_KEY: &str = "chunk_index";
/// Metadata key holding the page count of a paged source such as a PDF.
pub const PAGES_KEY: &str = "pages";

/// A loaded source document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Source identifier, e.g. the file path.
    pub source: String,
    /// The text content of the document.
    pub text: String,
    /// Key-value metadata. Always contains [`SOURCE_KEY`] when produced by a loader.
    pub metadata: HashMap<String, String>,
}

impl Document {
    /// Create a document whose metadata holds only the `source` key.
    pub fn new(source: impl Into<String>, text: impl Into<String>) -> Self {
        let source = source.into();
        let metadata = HashMap::from([(SOURCE_KEY.to_string(), source.clone())]);
        Self { source, text: text.into(), metadata }
    }

    /// Add a metadata field.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A contiguous segment of a [`Document`]'s text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// The text content of the chunk.
    pub text: String,
    /// The `source` of the parent [`Document`].
    pub source: String,
    /// Ordinal of this chunk within the document.
    pub index: usize,
    /// Byte offset of the chunk's first character in the document text.
    pub offset: usize,
    /// Metadata inherited from the parent document plus `chunk_index`.
    pub metadata: HashMap<String, String>,
}

/// A chunk materialized with its embedding, as written to a vector store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingRecord {
    /// Record identifier, unique within a collection.
    pub id: String,
    /// The embedding vector of `text`.
    pub vector: Vec<f32>,
    /// The chunk text.
    pub text: String,
    /// Metadata, with at least `source`.
    pub metadata: HashMap<String, String>,
}

/// A stored record returned by a similarity query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievedChunk {
    /// Record identifier.
    pub id: String,
    /// The chunk text.
    pub text: String,
    /// Metadata stored with the record.
    pub metadata: HashMap<String, String>,
    /// Cosine similarity to the query (higher is more relevant).
    pub score: f32,
}

impl RetrievedChunk {
    /// The `source` metadata value, if any.
    pub fn source(&self) -> Option<&str> {
        self.metadata.get(SOURCE_KEY).map(String::as_str)
    }
}
