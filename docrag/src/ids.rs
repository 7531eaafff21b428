//! Record id assignment.
//!
//! Ids are unique within a collection under one of two explicit policies:
//!
//! - [`IdStrategy::ContentHash`]: derived from source, byte offset and chunk
//!   text. Re-indexing unchanged content yields the same ids, which the store
//!   skips instead of duplicating.
//! - [`IdStrategy::Sequence`]: `doc_{n}` where `n` continues the collection's
//!   lifetime sequence. Re-indexing appends the same content again under new
//!   ids, so duplicate retrieval results are expected afterwards.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::document::Chunk;

/// Number of hex characters kept from the content hash.
const HASH_ID_LEN: usize = 32;

/// How the indexer assigns record ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdStrategy {
    /// Hash of source, offset and text.
    #[default]
    ContentHash,
    /// Monotonic sequence spanning the collection's lifetime.
    Sequence,
}

/// Deterministic id for a chunk: hex SHA-256 of source, offset and text.
pub fn content_hash_id(chunk: &Chunk) -> String {
    let mut hasher = Sha256::new();
    hasher.update(chunk.source.as_bytes());
    hasher.update([0]);
    hasher.update(chunk.offset.to_le_bytes());
    hasher.update([0]);
    hasher.update(chunk.text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());
    hash.chars().take(HASH_ID_LEN).collect()
}

/// Id for the `n`th record ever appended to a collection.
pub fn sequence_id(n: u64) -> String {
    format!("doc_{n}")
}
