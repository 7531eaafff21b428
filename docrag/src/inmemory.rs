//! In-memory vector store using cosine similarity.
//!
//! This module provides [`InMemoryVectorStore`], a vector store backed by a
//! `HashMap` protected by a `tokio::sync::RwLock`. It is suitable for tests
//! and short-lived sessions; use [`LocalVectorStore`](crate::LocalVectorStore)
//! when the index must outlive the process.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::document::{EmbeddingRecord, RetrievedChunk};
use crate::error::{RagError, Result};
use crate::vectorstore::{CollectionData, CollectionInfo, VectorStore, unavailable};

const BACKEND: &str = "InMemory";

/// An in-memory vector store using cosine similarity for search.
///
/// Collections are stored as collection name → records in insertion order.
/// All operations are async-safe via `tokio::sync::RwLock`.
///
/// # Example
///
/// ```rust,ignore
/// use docrag::{CollectionInfo, InMemoryVectorStore, VectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.create_collection(&CollectionInfo::new("docs", "test-model", 384)).await?;
/// ```
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, CollectionData>>,
}

impl InMemoryVectorStore {
    /// Create a new empty in-memory vector store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn create_collection(&self, info: &CollectionInfo) -> Result<()> {
        let mut collections = self.collections.write().await;
        if let Some(existing) = collections.get(&info.name) {
            return existing.info.ensure_compatible(&info.model_id, info.dimensions);
        }
        collections.insert(info.name.clone(), CollectionData::new(info.clone()));
        debug!(collection = %info, backend = BACKEND, "created collection");
        Ok(())
    }

    async fn collection_info(&self, name: &str) -> Result<Option<CollectionInfo>> {
        let collections = self.collections.read().await;
        Ok(collections.get(name).map(|c| c.info.clone()))
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        let mut collections = self.collections.write().await;
        collections.remove(name);
        Ok(())
    }

    async fn add(&self, collection: &str, records: &[EmbeddingRecord]) -> Result<usize> {
        let mut collections = self.collections.write().await;
        let data = collections.get_mut(collection).ok_or_else(|| RagError::VectorStore {
            backend: BACKEND.to_string(),
            message: format!("collection '{collection}' does not exist"),
        })?;
        data.append(BACKEND, records)
    }

    async fn query(
        &self,
        collection: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>> {
        let collections = self.collections.read().await;
        let data = collections
            .get(collection)
            .ok_or_else(|| unavailable(collection, "collection does not exist"))?;
        data.query(vector, top_k)
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let collections = self.collections.read().await;
        Ok(collections.get(collection).map_or(0, |c| c.records.len()))
    }

    async fn records(&self, collection: &str) -> Result<Vec<EmbeddingRecord>> {
        let collections = self.collections.read().await;
        collections
            .get(collection)
            .map(|c| c.records.clone())
            .ok_or_else(|| unavailable(collection, "collection does not exist"))
    }
}
