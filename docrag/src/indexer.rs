//! Document indexing: chunk → embed → store.
//!
//! The [`Indexer`] turns loaded [`Document`]s into [`EmbeddingRecord`]s and
//! appends them to a collection in a single bulk write. It is fail-fast: the
//! first chunking or embedding error aborts the run before anything is
//! written.
//!
//! # Example
//!
//! ```rust,ignore
//! use docrag::{Indexer, LocalVectorStore, RecursiveChunker};
//!
//! let indexer = Indexer::builder()
//!     .embedding_provider(Arc::new(embedder))
//!     .vector_store(Arc::new(LocalVectorStore::open("./docrag-store").await?))
//!     .chunker(Arc::new(RecursiveChunker::new(1000, 200)?))
//!     .collection("document_embeddings")
//!     .build()?;
//!
//! let report = indexer.index_documents(&documents).await?;
//! println!("{report}");
//! ```

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::chunking::Chunker;
use crate::config::DEFAULT_COLLECTION;
use crate::document::{Chunk, Document, EmbeddingRecord, FILE_TYPE_KEY, SOURCE_KEY};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::ids::{IdStrategy, content_hash_id, sequence_id};
use crate::loader::extension_of;
use crate::vectorstore::{CollectionInfo, VectorStore};

/// Counts describing one indexing run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexReport {
    /// Documents passed in.
    pub documents_seen: usize,
    /// Documents skipped because their text was empty or whitespace.
    pub documents_skipped: usize,
    /// Chunks produced by the chunker.
    pub chunks_produced: usize,
    /// Records appended to the collection.
    pub records_written: usize,
    /// Records not written because their id already existed.
    pub records_skipped: usize,
}

impl fmt::Display for IndexReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} documents ({} empty skipped), {} chunks, {} records written, {} already present",
            self.documents_seen,
            self.documents_skipped,
            self.chunks_produced,
            self.records_written,
            self.records_skipped
        )
    }
}

/// Builds and writes embedding records for a collection.
pub struct Indexer {
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStore>,
    chunker: Arc<dyn Chunker>,
    collection: String,
    id_strategy: IdStrategy,
}

impl Indexer {
    /// Create a new [`IndexerBuilder`].
    pub fn builder() -> IndexerBuilder {
        IndexerBuilder::default()
    }

    /// The target collection.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// The id strategy in use.
    pub fn id_strategy(&self) -> IdStrategy {
        self.id_strategy
    }

    fn collection_info(&self) -> CollectionInfo {
        CollectionInfo::new(
            &self.collection,
            self.embedding_provider.model_id(),
            self.embedding_provider.dimensions(),
        )
    }

    /// Chunk, embed and store `documents`.
    ///
    /// # Errors
    ///
    /// - [`RagError::EmbeddingModelMismatch`] if the collection exists with
    ///   another model or dimension.
    /// - [`RagError::EmbeddingProvider`] if an embedding fails or the provider
    ///   returns the wrong number or size of vectors.
    /// - [`RagError::VectorStore`] if the bulk write fails.
    pub async fn index_documents(&self, documents: &[Document]) -> Result<IndexReport> {
        let info = self.collection_info();
        if let Some(existing) = self.vector_store.collection_info(&self.collection).await? {
            existing.ensure_compatible(&info.model_id, info.dimensions).inspect_err(|e| {
                error!(collection = %self.collection, error = %e, "refusing to index into collection");
            })?;
        }

        let mut report = IndexReport { documents_seen: documents.len(), ..Default::default() };
        let mut chunks = Vec::new();
        for document in documents {
            if document.text.trim().is_empty() {
                warn!(source = %document.source, "skipping empty document");
                report.documents_skipped += 1;
                continue;
            }
            let document_chunks = self.chunker.chunk(document)?;
            info!(source = %document.source, chunk_count = document_chunks.len(), "chunked document");
            chunks.extend(document_chunks);
        }
        report.chunks_produced = chunks.len();

        if chunks.is_empty() {
            warn!(collection = %self.collection, "nothing to index");
            return Ok(report);
        }

        let embeddings = self.embed(&chunks).await?;

        self.vector_store.create_collection(&info).await?;
        let records = self.build_records(chunks, embeddings).await?;
        let written = self.vector_store.add(&self.collection, &records).await.inspect_err(|e| {
            error!(collection = %self.collection, error = %e, "bulk write failed");
        })?;
        report.records_written = written;
        report.records_skipped = records.len() - written;

        info!(
            collection = %self.collection,
            documents = report.documents_seen,
            chunk_count = report.chunks_produced,
            written = report.records_written,
            skipped = report.records_skipped,
            "indexing complete"
        );
        Ok(report)
    }

    async fn embed(&self, chunks: &[Chunk]) -> Result<Vec<Vec<f32>>> {
        let provider = self.embedding_provider.model_id().to_string();
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let embeddings = self.embedding_provider.embed_batch(&texts).await.inspect_err(|e| {
            error!(provider = %provider, error = %e, "embedding failed during indexing");
        })?;

        if embeddings.len() != texts.len() {
            return Err(RagError::EmbeddingProvider {
                provider,
                message: format!(
                    "expected {} embeddings, provider returned {}",
                    texts.len(),
                    embeddings.len()
                ),
            });
        }
        let dimensions = self.embedding_provider.dimensions();
        if let Some(bad) = embeddings.iter().find(|v| v.len() != dimensions) {
            return Err(RagError::EmbeddingProvider {
                provider,
                message: format!("expected {dimensions} dimensions, got {}", bad.len()),
            });
        }
        Ok(embeddings)
    }

    async fn build_records(
        &self,
        chunks: Vec<Chunk>,
        embeddings: Vec<Vec<f32>>,
    ) -> Result<Vec<EmbeddingRecord>> {
        let mut next = match self.id_strategy {
            IdStrategy::Sequence => self.vector_store.next_sequence(&self.collection).await?,
            IdStrategy::ContentHash => 0,
        };

        Ok(chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, vector)| {
                let id = match self.id_strategy {
                    IdStrategy::ContentHash => content_hash_id(&chunk),
                    IdStrategy::Sequence => {
                        let id = sequence_id(next);
                        next += 1;
                        id
                    }
                };
                let mut metadata = chunk.metadata;
                metadata.entry(SOURCE_KEY.to_string()).or_insert_with(|| chunk.source.clone());
                metadata
                    .entry(FILE_TYPE_KEY.to_string())
                    .or_insert_with(|| extension_of(Path::new(&chunk.source)));
                EmbeddingRecord { id, vector, text: chunk.text, metadata }
            })
            .collect())
    }
}

/// Builder for constructing an [`Indexer`].
///
/// The embedding provider, vector store and chunker are required. The
/// collection defaults to `document_embeddings` and ids to
/// [`IdStrategy::ContentHash`].
#[derive(Default)]
pub struct IndexerBuilder {
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    chunker: Option<Arc<dyn Chunker>>,
    collection: Option<String>,
    id_strategy: IdStrategy,
}

impl IndexerBuilder {
    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the vector store backend.
    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    /// Set the document chunker.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Set the target collection.
    pub fn collection(mut self, name: impl Into<String>) -> Self {
        self.collection = Some(name.into());
        self
    }

    /// Set the id strategy.
    pub fn id_strategy(mut self, strategy: IdStrategy) -> Self {
        self.id_strategy = strategy;
        self
    }

    /// Build the [`Indexer`], validating that all required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidConfiguration`] if a required field is missing.
    pub fn build(self) -> Result<Indexer> {
        let embedding_provider = self.embedding_provider.ok_or_else(|| {
            RagError::InvalidConfiguration("embedding_provider is required".to_string())
        })?;
        let vector_store = self
            .vector_store
            .ok_or_else(|| RagError::InvalidConfiguration("vector_store is required".to_string()))?;
        let chunker = self
            .chunker
            .ok_or_else(|| RagError::InvalidConfiguration("chunker is required".to_string()))?;

        Ok(Indexer {
            embedding_provider,
            vector_store,
            chunker,
            collection: self.collection.unwrap_or_else(|| DEFAULT_COLLECTION.to_string()),
            id_strategy: self.id_strategy,
        })
    }
}
