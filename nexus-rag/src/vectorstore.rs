//! Vector store trait for persisting and searching embedded chunks.

use async_trait::async_trait;

use crate::document::{Chunk, SearchResult};
use crate::error::Result;

/// What a collection was created for: the vector size and the embedding
/// model that produced its vectors.
///
/// Vectors from different models are not comparable even when their sizes
/// match, so a collection stays bound to the model it was created with
/// until it is dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionInfo {
    /// Length of every stored embedding.
    pub dimensions: usize,
    /// Identity of the embedding model, as reported by
    /// [`EmbeddingProvider::model_id`](crate::EmbeddingProvider::model_id).
    pub embedder: String,
}

impl CollectionInfo {
    /// Describe a collection of `dimensions`-sized vectors produced by `embedder`.
    pub fn new(dimensions: usize, embedder: impl Into<String>) -> Self {
        Self { dimensions, embedder: embedder.into() }
    }
}

/// A storage backend for embedded chunks with similarity search.
///
/// Implementations manage named collections. Failures to reach the backing
/// persistence surface as [`RagError::StoreUnavailable`](crate::RagError::StoreUnavailable).
/// A failed [`upsert`](VectorStore::upsert) may have committed a subset of
/// its chunks; callers must not assume atomicity.
///
/// # Example
///
/// ```rust,ignore
/// use nexus_rag::{CollectionInfo, InMemoryVectorStore, VectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.create_collection("darkg_docs", &CollectionInfo::new(384, "hash/384")).await?;
/// store.upsert("darkg_docs", &chunks).await?;
/// let results = store.search("darkg_docs", &query_embedding, 20).await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create a named collection. No-op if it already exists, in which case
    /// the collection keeps the [`CollectionInfo`] it was created with.
    async fn create_collection(&self, name: &str, info: &CollectionInfo) -> Result<()>;

    /// The [`CollectionInfo`] a collection was created with, `None` if it does not exist.
    async fn describe_collection(&self, name: &str) -> Result<Option<CollectionInfo>>;

    /// Irreversibly delete a named collection and all its chunks.
    /// No-op if it does not exist.
    async fn delete_collection(&self, name: &str) -> Result<()>;

    /// Insert or replace chunks by id. Chunks must have embeddings set.
    async fn upsert(&self, collection: &str, chunks: &[Chunk]) -> Result<()>;

    /// Number of chunks in a collection, zero if it does not exist.
    async fn count(&self, collection: &str) -> Result<usize>;

    /// Search for the `top_k` most similar chunks to the given embedding.
    ///
    /// Returns results ordered by descending cosine similarity.
    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>>;

    /// A short name used in logs and error messages.
    fn backend(&self) -> &str;
}

/// Cosine similarity of two vectors.
///
/// Returns 0.0 if either vector has zero magnitude or the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Sort results by descending score and keep the first `top_k`.
pub(crate) fn rank(mut scored: Vec<SearchResult>, top_k: usize) -> Vec<SearchResult> {
    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(top_k);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_of_mismatched_lengths_is_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]), 0.0);
    }

    #[test]
    fn cosine_of_parallel_vectors_is_one() {
        let score = cosine_similarity(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]);
        assert!((score - 1.0).abs() < 1e-6);
    }
}
