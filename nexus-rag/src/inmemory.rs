//! Volatile in-memory vector store.
//!
//! Exact cosine scan over `HashMap`s behind a `tokio::sync::RwLock`. Contents
//! are lost when the process exits.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::document::{Chunk, SearchResult};
use crate::error::{RagError, Result};
use crate::vectorstore::{CollectionInfo, VectorStore, cosine_similarity, rank};

const BACKEND: &str = "in-memory";

/// Chunks of one collection, keyed by id.
#[derive(Debug)]
struct Collection {
    info: CollectionInfo,
    chunks: HashMap<String, Chunk>,
}

/// A vector store that lives only as long as the process.
///
/// Like the persistent backend, each collection remembers the
/// [`CollectionInfo`] it was created with and refuses chunks of any other size.
///
/// # Example
///
/// ```rust,ignore
/// use nexus_rag::{CollectionInfo, InMemoryVectorStore, VectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.create_collection("darkg_docs", &CollectionInfo::new(384, "hash/384")).await?;
/// ```
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryVectorStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn unavailable(message: String) -> RagError {
    RagError::StoreUnavailable { backend: BACKEND.to_string(), message }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn create_collection(&self, name: &str, info: &CollectionInfo) -> Result<()> {
        self.collections
            .write()
            .await
            .entry(name.to_string())
            .or_insert_with(|| Collection { info: info.clone(), chunks: HashMap::new() });
        Ok(())
    }

    async fn describe_collection(&self, name: &str) -> Result<Option<CollectionInfo>> {
        Ok(self.collections.read().await.get(name).map(|c| c.info.clone()))
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        self.collections.write().await.remove(name);
        Ok(())
    }

    async fn upsert(&self, collection: &str, chunks: &[Chunk]) -> Result<()> {
        let mut collections = self.collections.write().await;
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| unavailable(format!("collection '{collection}' does not exist")))?;

        let dimensions = target.info.dimensions;
        if let Some(bad) = chunks.iter().find(|c| c.embedding.len() != dimensions) {
            return Err(unavailable(format!(
                "chunk '{}' has {} dimensions, collection '{collection}' expects {}",
                bad.id,
                bad.embedding.len(),
                dimensions
            )));
        }
        target.chunks.extend(chunks.iter().map(|c| (c.id.clone(), c.clone())));
        Ok(())
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        Ok(self.collections.read().await.get(collection).map_or(0, |c| c.chunks.len()))
    }

    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        let collections = self.collections.read().await;
        let Some(source) = collections.get(collection) else {
            return Err(unavailable(format!("collection '{collection}' does not exist")));
        };

        let scored = source
            .chunks
            .values()
            .map(|chunk| SearchResult {
                score: cosine_similarity(&chunk.embedding, embedding),
                chunk: chunk.clone(),
            })
            .collect();
        Ok(rank(scored, top_k))
    }

    fn backend(&self) -> &str {
        BACKEND
    }
}
