//! Local persistent vector store.
//!
//! [`LocalVectorStore`] keeps every collection in memory and mirrors it to
//! `<dir>/<collection>.json`. Each bulk write rewrites the collection file
//! through a temporary file and a rename, so readers never observe a partially
//! written file. Search is brute-force cosine similarity.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::document::{EmbeddingRecord, RetrievedChunk};
use crate::error::{RagError, Result};
use crate::vectorstore::{CollectionData, CollectionInfo, VectorStore, unavailable};

const BACKEND: &str = "Local";
const EXTENSION: &str = "json";

/// A vector store persisted as one JSON file per collection.
///
/// # Example
///
/// ```rust,ignore
/// use docrag::{LocalVectorStore, VectorStore};
///
/// let store = LocalVectorStore::open("./docrag-store").await?;
/// let total = store.count("document_embeddings").await?;
/// ```
#[derive(Debug)]
pub struct LocalVectorStore {
    dir: PathBuf,
    collections: RwLock<HashMap<String, CollectionData>>,
}

impl LocalVectorStore {
    /// Open (or create) a store rooted at `dir`, loading every collection file.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Io`] if the directory cannot be created or read and
    /// [`RagError::VectorStore`] if a collection file is corrupt.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;

        let mut collections = HashMap::new();
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != EXTENSION) {
                continue;
            }
            let bytes = tokio::fs::read(&path).await?;
            let mut data: CollectionData =
                serde_json::from_slice(&bytes).map_err(|e| RagError::VectorStore {
                    backend: BACKEND.to_string(),
                    message: format!("corrupt collection file {}: {e}", path.display()),
                })?;
            data.reindex();
            debug!(collection = %data.info, records = data.records.len(), "loaded collection");
            collections.insert(data.info.name.clone(), data);
        }

        info!(path = %dir.display(), collection_count = collections.len(), "opened local vector store");
        Ok(Self { dir, collections: RwLock::new(collections) })
    }

    /// The directory backing this store.
    pub fn path(&self) -> &Path {
        &self.dir
    }

    fn collection_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.{EXTENSION}"))
    }

    async fn persist(&self, data: &CollectionData) -> Result<()> {
        let path = self.collection_path(&data.info.name);
        let tmp = path.with_extension(format!("{EXTENSION}.tmp"));
        let bytes = serde_json::to_vec(data)?;
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

/// Collection names become file names, so keep them to a safe alphabet.
fn validate_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !valid {
        return Err(RagError::InvalidConfiguration(format!(
            "collection name '{name}' must be non-empty and use only [A-Za-z0-9_-]"
        )));
    }
    Ok(())
}

#[async_trait]
impl VectorStore for LocalVectorStore {
    async fn create_collection(&self, info: &CollectionInfo) -> Result<()> {
        validate_name(&info.name)?;
        let mut collections = self.collections.write().await;
        if let Some(existing) = collections.get(&info.name) {
            return existing.info.ensure_compatible(&info.model_id, info.dimensions);
        }
        let data = CollectionData::new(info.clone());
        self.persist(&data).await?;
        collections.insert(info.name.clone(), data);
        info!(collection = %info, "created collection");
        Ok(())
    }

    async fn collection_info(&self, name: &str) -> Result<Option<CollectionInfo>> {
        let collections = self.collections.read().await;
        Ok(collections.get(name).map(|c| c.info.clone()))
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        let mut collections = self.collections.write().await;
        if collections.remove(name).is_some() {
            match tokio::fs::remove_file(self.collection_path(name)).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    warn!(collection = name, "collection file already removed");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    async fn add(&self, collection: &str, records: &[EmbeddingRecord]) -> Result<usize> {
        let mut collections = self.collections.write().await;
        let data = collections.get_mut(collection).ok_or_else(|| RagError::VectorStore {
            backend: BACKEND.to_string(),
            message: format!("collection '{collection}' does not exist"),
        })?;

        // Append to a copy so a failed write leaves memory and disk in agreement.
        let mut updated = data.clone();
        let added = updated.append(BACKEND, records)?;
        if added > 0 {
            self.persist(&updated).await?;
            *data = updated;
        }
        debug!(collection, added, total = data.records.len(), "appended records");
        Ok(added)
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
