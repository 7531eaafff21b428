//! Text-to-vector embedding backends.

use async_trait::async_trait;

use crate::error::Result;

/// Turns text into fixed-length vectors.
///
/// A collection remembers the [`model_id`](Self::model_id) and
/// [`dimensions`](Self::dimensions) it was built with. Queries must be embedded
/// by the same model, otherwise opening the index fails with
/// [`RagError::EmbeddingModelMismatch`](crate::RagError::EmbeddingModelMismatch).
///
/// ```rust,ignore
/// use docrag::EmbeddingProvider;
///
/// let vectors = provider.embed_batch(&["first chunk", "second chunk"]).await?;
/// assert!(vectors.iter().all(|v| v.len() == provider.dimensions()));
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed one text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed several texts, one vector per input in input order.
    ///
    /// Falls back to one [`embed`](Self::embed) call per text. Backends with a
    /// batch endpoint override this.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }

    /// Length of every vector this provider returns.
    fn dimensions(&self) -> usize;

    /// Model name, e.g. `nomic-embed-text`.
    fn model_id(&self) -> &str;
}
