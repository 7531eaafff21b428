//! Query-time retrieval: embed → search.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::config::DEFAULT_TOP_K;
use crate::document::RetrievedChunk;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::vectorstore::VectorStore;

/// Finds the chunks most similar to a query.
///
/// The query must be embedded with the same model used at indexing time.
/// [`Retriever::open`] checks this against the collection's stored
/// descriptor.
///
/// # Example
///
/// ```rust,ignore
/// let retriever = Retriever::open(embedder, store, "document_embeddings").await?;
/// let chunks = retriever.retrieve("What is the notice period?").await?;
/// ```
pub struct Retriever {
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStore>,
    collection: String,
    top_k: usize,
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("model", &self.embedding_provider.model_id())
            .field("collection", &self.collection)
            .field("top_k", &self.top_k)
            .finish_non_exhaustive()
    }
}

impl Retriever {
    /// Create a retriever over `collection` without checking the index.
    pub fn new(
        embedding_provider: Arc<dyn EmbeddingProvider>,
        vector_store: Arc<dyn VectorStore>,
        collection: impl Into<String>,
    ) -> Self {
        Self { embedding_provider, vector_store, collection: collection.into(), top_k: DEFAULT_TOP_K }
    }

    /// Create a retriever and validate that `collection` was built with the
    /// provider's model and dimensionality.
    ///
    /// A missing collection is not an error here; queries against it fail
    /// with [`RagError::IndexUnavailable`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmbeddingModelMismatch`] if the collection was built
    /// with another model or dimension.
    pub async fn open(
        embedding_provider: Arc<dyn EmbeddingProvider>,
        vector_store: Arc<dyn VectorStore>,
        collection: impl Into<String>,
    ) -> Result<Self> {
        let retriever = Self::new(embedding_provider, vector_store, collection);
        match retriever.vector_store.collection_info(&retriever.collection).await? {
            Some(info) => {
                info.ensure_compatible(
                    retriever.embedding_provider.model_id(),
                    retriever.embedding_provider.dimensions(),
                )?;
                info!(collection = %info, "opened index");
            }
            None => warn!(collection = %retriever.collection, "collection does not exist yet"),
        }
        Ok(retriever)
    }

    /// Set the default number of results.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// The default number of results.
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// The collection being searched.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Retrieve the default number of chunks for `query`.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<RetrievedChunk>> {
        self.retrieve_top_k(query, self.top_k).await
    }

    /// Retrieve up to `top_k` chunks for `query`, most similar first.
    ///
    /// # Errors
    ///
    /// - [`RagError::EmptyInput`] if `query` is blank.
    /// - [`RagError::InvalidConfiguration`] if `top_k` is zero.
    /// - [`RagError::EmbeddingProvider`] if the query cannot be embedded.
    /// - [`RagError::IndexUnavailable`] if the collection is missing or empty.
    pub async fn retrieve_top_k(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedChunk>> {
        if query.trim().is_empty() {
            return Err(RagError::EmptyInput("query must not be empty".to_string()));
        }
        if top_k == 0 {
            return Err(RagError::InvalidConfiguration("top_k must be greater than zero".into()));
        }

        let query_embedding = self.embedding_provider.embed(query).await.inspect_err(|e| {
            error!(error = %e, "embedding failed during query");
        })?;

        let results = self
            .vector_store
            .query(&self.collection, &query_embedding, top_k)
            .await
            .inspect_err(|e| {
                error!(collection = %self.collection, error = %e, "vector store search failed");
            })?;

        debug!(scores = ?results.iter().map(|r| r.score).collect::<Vec<_>>(), "ranked results");
        info!(result_count = results.len(), "query completed");
        Ok(results)
    }

    /// Retrieve chunks for `query` and join their texts with newlines.
    pub async fn retrieve_context(&self, query: &str) -> Result<String> {
        let results = self.retrieve(query).await?;
        Ok(results.iter().map(|r| r.text.as_str()).collect::<Vec<_>>().join("\n"))
    }
}
