//! Vector store trait for storing and searching vector embeddings.

use std::collections::HashSet;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::document::{EmbeddingRecord, RetrievedChunk};
use crate::error::{RagError, Result};

/// Similarity metric used by a collection. Only cosine is supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// Cosine similarity; higher is more similar.
    #[default]
    Cosine,
}

/// Descriptor persisted with every collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionInfo {
    /// Collection name.
    pub name: String,
    /// Embedding model the collection was built with.
    pub model_id: String,
    /// Vector dimensionality.
    pub dimensions: usize,
    /// Similarity metric.
    #[serde(default)]
    pub metric: Metric,
}

impl CollectionInfo {
    /// Create a cosine collection descriptor.
    pub fn new(name: impl Into<String>, model_id: impl Into<String>, dimensions: usize) -> Self {
        Self { name: name.into(), model_id: model_id.into(), dimensions, metric: Metric::Cosine }
    }

    /// Fail with [`RagError::EmbeddingModelMismatch`] unless `model_id` and
    /// `dimensions` match this collection.
    pub fn ensure_compatible(&self, model_id: &str, dimensions: usize) -> Result<()> {
        if self.model_id != model_id || self.dimensions != dimensions {
            return Err(RagError::EmbeddingModelMismatch {
                collection: self.name.clone(),
                expected: format!("{} ({} dims)", self.model_id, self.dimensions),
                actual: format!("{model_id} ({dimensions} dims)"),
            });
        }
        Ok(())
    }
}

impl fmt::Display for CollectionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}, {} dims, cosine]", self.name, self.model_id, self.dimensions)
    }
}

/// A storage backend for embedding records with cosine similarity search.
///
/// Stores are append-only: [`add`](VectorStore::add) never overwrites a
/// record whose id already exists. Write/read concurrency beyond what the
/// backend offers natively is not provided.
///
/// # Example
///
/// ```rust,ignore
/// use docrag::{CollectionInfo, InMemoryVectorStore, VectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.create_collection(&CollectionInfo::new("docs", "nomic-embed-text", 768)).await?;
/// store.add("docs", &records).await?;
/// let results = store.query("docs", &query_embedding, 5).await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create a collection. No-op if it already exists with a compatible
    /// model; fails with [`RagError::EmbeddingModelMismatch`] otherwise.
    async fn create_collection(&self, info: &CollectionInfo) -> Result<()>;

    /// The descriptor of a collection, or `None` if it does not exist.
    async fn collection_info(&self, name: &str) -> Result<Option<CollectionInfo>>;

    /// Delete a collection and all its records.
    async fn delete_collection(&self, name: &str) -> Result<()>;

    /// Append records in one bulk write. Records whose id already exists are
    /// skipped. Returns the number of records added.
    async fn add(&self, collection: &str, records: &[EmbeddingRecord]) -> Result<usize>;

    /// Return up to `top_k` records most similar to `vector`, ordered by
    /// descending cosine similarity; ties keep insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::IndexUnavailable`] if the collection does not
    /// exist or is empty.
    async fn query(
        &self,
        collection: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>>;

    /// Number of records in a collection.
    async fn count(&self, collection: &str) -> Result<usize>;

    /// All records of a collection in insertion order.
    async fn records(&self, collection: &str) -> Result<Vec<EmbeddingRecord>>;

    /// The next value of the collection's lifetime-spanning sequence. It
    /// equals the number of records ever appended.
    async fn next_sequence(&self, collection: &str) -> Result<u64> {
        Ok(self.count(collection).await? as u64)
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude or a non-finite component.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let similarity = dot / (norm_a * norm_b);
    if similarity.is_finite() { similarity } else { 0.0 }
}

pub(crate) fn unavailable(collection: &str, reason: impl Into<String>) -> RagError {
    RagError::IndexUnavailable { collection: collection.to_string(), reason: reason.into() }
}

/// In-process state of one collection, shared by the in-memory and local
/// stores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct CollectionData {
    pub(crate) info: CollectionInfo,
    pub(crate) records: Vec<EmbeddingRecord>,
    #[serde(skip)]
    ids: HashSet<String>,
}

impl CollectionData {
    pub(crate) fn new(info: CollectionInfo) -> Self {
        Self { info, records: Vec::new(), ids: HashSet::new() }
    }

    /// Rebuild the id index after deserialization.
    pub(crate) fn reindex(&mut self) {
        self.ids = self.records.iter().map(|r| r.id.clone()).collect();
    }

    /// Validate and append records, skipping known ids. Returns the number added.
    pub(crate) fn append(&mut self, backend: &str, records: &[EmbeddingRecord]) -> Result<usize> {
        if let Some(bad) = records.iter().find(|r| r.vector.len() != self.info.dimensions) {
            return Err(RagError::VectorStore {
                backend: backend.to_string(),
                message: format!(
                    "record '{}' has {} dimensions, collection '{}' expects {}",
                    bad.id,
                    bad.vector.len(),
                    self.info.name,
                    self.info.dimensions
                ),
            });
        }

        let mut added = 0;
        for record in records {
            if self.ids.insert(record.id.clone()) {
                self.records.push(record.clone());
                added += 1;
            }
        }
        Ok(added)
    }

    pub(crate) fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<RetrievedChunk>> {
        if self.records.is_empty() {
            return Err(unavailable(&self.info.name, "collection is empty"));
        }

        let mut scored: Vec<RetrievedChunk> = self
            .records
            .iter()
            .map(|record| RetrievedChunk {
                id: record.id.clone(),
                text: record.text.clone(),
                metadata: record.metadata.clone(),
                score: cosine_similarity(&record.vector, vector),
            })
            .collect();

        // Stable sort keeps insertion order among equal scores.
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(top_k);
        Ok(scored)
    }
}
