//! Index lifecycle: the owner of the active collection.
//!
//! [`IndexManager`] is a two-state machine over [`IndexState::NoIndex`] and
//! [`IndexState::Loaded`]. The collection may hold persisted chunks while the
//! manager is still in `NoIndex` (a fresh process); the first read rebuilds
//! the [`IndexHandle`] lazily.
//!
//! # Locking
//!
//! A lifecycle gate (`tokio::sync::RwLock<()>`) separates readers and
//! appenders, which share it, from [`reset`](IndexManager::reset), which
//! takes it exclusively. Tokio's lock is fair, so a waiting reset blocks
//! newcomers and is admitted as soon as in-flight work drains.
//!
//! Bulk inserts take the shared gate once per document rather than for the
//! whole batch, and every reset bumps a generation counter. A batch that
//! observes a new generation between documents stops with
//! [`RagError::Interrupted`] instead of writing its remainder into the fresh
//! collection.
//!
//! Every embedder and store call is bounded by the configured operation
//! timeout.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::chunking::{Chunker, RecursiveChunker};
use crate::config::RagConfig;
use crate::document::{Document, SearchResult};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::vectorstore::{CollectionInfo, VectorStore};

/// Whether the manager has a usable [`IndexHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    /// No handle is built. The collection may still hold persisted chunks.
    NoIndex,
    /// A handle is built and consistent with the last operation through this manager.
    Loaded,
}

/// In-memory view of the active collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexHandle {
    /// The collection this handle searches.
    pub collection: String,
    /// Reset generation the handle was built in. Stale handles are never used.
    pub generation: u64,
    /// Number of chunks in the collection as of the last operation.
    pub record_count: usize,
}

/// Owns the lifecycle of the active collection and mediates all access to it.
///
/// Construct one via [`IndexManager::builder()`].
pub struct IndexManager {
    config: RagConfig,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStore>,
    chunker: Arc<dyn Chunker>,
    gate: RwLock<()>,
    handle: Mutex<Option<IndexHandle>>,
    generation: AtomicU64,
}

impl IndexManager {
    /// Create a new [`IndexManagerBuilder`].
    pub fn builder() -> IndexManagerBuilder {
        IndexManagerBuilder::default()
    }

    /// Return a reference to the configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the embedding provider.
    pub fn embedding_provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedding_provider
    }

    /// Return a reference to the vector store.
    pub fn vector_store(&self) -> &Arc<dyn VectorStore> {
        &self.vector_store
    }

    fn collection(&self) -> &str {
        &self.config.collection_name
    }

    fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    async fn bounded<T, F>(&self, operation: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let after = self.config.operation_timeout();
        match tokio::time::timeout(after, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!(operation, ?after, "operation timed out");
                Err(RagError::Timeout { operation: operation.to_string(), after })
            }
        }
    }

    /// The collection description this manager's embedder produces.
    fn expected_collection(&self) -> CollectionInfo {
        CollectionInfo::new(
            self.embedding_provider.dimensions(),
            self.embedding_provider.model_id(),
        )
    }

    /// Refuse to mix vectors from a different embedding model into the collection.
    async fn verify_collection(&self) -> Result<()> {
        let expected = self.expected_collection();
        let describe = self.vector_store.describe_collection(self.collection());
        let stored = self.bounded("describe collection", describe).await?;
        let Some(stored) = stored else {
            return Ok(());
        };
        // An empty embedder comes from stores that predate embedder tracking.
        let compatible = if stored.embedder.is_empty() {
            stored.dimensions == expected.dimensions
        } else {
            stored == expected
        };
        if compatible {
            return Ok(());
        }

        error!(
            collection = self.collection(),
            stored = %stored.embedder,
            current = %expected.embedder,
            "collection was built with a different embedder"
        );
        Err(RagError::ConfigError(format!(
            "collection '{}' was built with embedder '{}' ({} dimensions) but the current \
             embedder is '{}' ({} dimensions); reset the index to switch models",
            self.collection(),
            stored.embedder,
            stored.dimensions,
            expected.embedder,
            expected.dimensions
        )))
    }

    async fn discard_handle(&self) {
        *self.handle.lock().await = None;
    }

    /// Current state of the manager.
    pub async fn state(&self) -> IndexState {
        let generation = self.current_generation();
        match self.handle.lock().await.as_ref() {
            Some(handle) if handle.generation == generation => IndexState::Loaded,
            _ => IndexState::NoIndex,
        }
    }

    /// A snapshot of the current handle, if one is built and fresh.
    pub async fn handle(&self) -> Option<IndexHandle> {
        let generation = self.current_generation();
        self.handle.lock().await.clone().filter(|h| h.generation == generation)
    }

    /// Build the handle from the existing collection if it has content.
    ///
    /// Stays in [`IndexState::NoIndex`] when the collection is empty.
    /// Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::StoreUnavailable`] or [`RagError::Timeout`] if the
    /// store cannot be counted, and [`RagError::ConfigError`] if the persisted
    /// collection was built by a different embedding model.
    pub async fn ensure_loaded(&self) -> Result<IndexState> {
        let _gate = self.gate.read().await;
        self.ensure_loaded_locked().await
    }

    async fn ensure_loaded_locked(&self) -> Result<IndexState> {
        let generation = self.current_generation();
        let mut handle = self.handle.lock().await;
        if handle.as_ref().is_some_and(|h| h.generation == generation) {
            return Ok(IndexState::Loaded);
        }

        let record_count = self.bounded("count", self.vector_store.count(self.collection())).await?;
        if record_count == 0 {
            *handle = None;
            return Ok(IndexState::NoIndex);
        }
        self.verify_collection().await?;

        info!(collection = self.collection(), record_count, "rebuilt index handle from store");
        *handle = Some(IndexHandle {
            collection: self.collection().to_string(),
            generation,
            record_count,
        });
        Ok(IndexState::Loaded)
    }

    /// Chunk, embed and upsert `documents`, returning the number of chunks stored.
    ///
    /// Builds the handle on the first successful insert and keeps it current
    /// afterwards. On failure the handle is discarded, so the next read goes
    /// through [`ensure_loaded`](IndexManager::ensure_loaded) again. Chunks of
    /// documents processed before the failure may remain in the store.
    ///
    /// # Errors
    ///
    /// - [`RagError::EmbeddingError`] if the provider fails or returns
    ///   vectors of the wrong shape
    /// - [`RagError::StoreUnavailable`] if the upsert fails
    /// - [`RagError::ConfigError`] if the collection was built by a different
    ///   embedding model
    /// - [`RagError::Timeout`] if either call exceeds the operation timeout
    /// - [`RagError::Interrupted`] if a reset ran while the batch was in progress
    pub async fn insert_documents(&self, documents: &[Document]) -> Result<usize> {
        let mut expected_generation = None;
        let mut stored = 0;

        for document in documents {
            let _gate = self.gate.read().await;
            let generation = self.current_generation();
            match expected_generation {
                None => expected_generation = Some(generation),
                Some(started) if started != generation => {
                    warn!(
                        document.id = %document.id,
                        stored,
                        "index was reset during bulk insert, stopping"
                    );
                    self.discard_handle().await;
                    return Err(RagError::Interrupted(format!(
                        "index was reset after {stored} chunks were stored"
                    )));
                }
                Some(_) => {}
            }

            match self.insert_one(document, generation).await {
                Ok(count) => stored += count,
                Err(e) => {
                    error!(document.id = %document.id, error = %e, "insert failed");
                    self.discard_handle().await;
                    return Err(e);
                }
            }
        }

        info!(document_count = documents.len(), chunk_count = stored, "inserted documents");
        Ok(stored)
    }

    async fn insert_one(&self, document: &Document, generation: u64) -> Result<usize> {
        let mut chunks = self.chunker.chunk(document);
        if chunks.is_empty() {
            debug!(document.id = %document.id, "document produced no chunks");
            return Ok(0);
        }

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let embeddings =
            self.bounded("embed", self.embedding_provider.embed_batch(&texts)).await?;

        let dimensions = self.embedding_provider.dimensions();
        if embeddings.len() != chunks.len() {
            return Err(RagError::EmbeddingError {
                provider: self.embedding_provider.name().to_string(),
                message: format!(
                    "expected {} embeddings, got {}",
                    chunks.len(),
                    embeddings.len()
                ),
            });
        }
        for (chunk, embedding) in chunks.iter_mut().zip(embeddings) {
            if embedding.len() != dimensions {
                return Err(RagError::EmbeddingError {
                    provider: self.embedding_provider.name().to_string(),
                    message: format!(
                        "embedding has {} dimensions, expected {dimensions}",
                        embedding.len()
                    ),
                });
            }
            chunk.embedding = embedding;
        }

        self.bounded(
            "create collection",
            self.vector_store.create_collection(self.collection(), &self.expected_collection()),
        )
        .await?;
        self.verify_collection().await?;
        self.bounded("upsert", self.vector_store.upsert(self.collection(), &chunks)).await?;

        // Construct the handle on first insert, append to it afterwards. The
        // count is read under the handle lock so concurrent inserts publish
        // counts in the order they were observed.
        let mut handle = self.handle.lock().await;
        let record_count = self.bounded("count", self.vector_store.count(self.collection())).await?;
        match handle.as_mut() {
            Some(h) if h.generation == generation => h.record_count = record_count,
            _ => {
                debug!(collection = self.collection(), record_count, "built handle on insert");
                *handle = Some(IndexHandle {
                    collection: self.collection().to_string(),
                    generation,
                    record_count,
                });
            }
        }

        debug!(document.id = %document.id, chunk_count = chunks.len(), "inserted document");
        Ok(chunks.len())
    }

    /// Drop the collection, recreate it empty and discard the handle.
    ///
    /// Waits for in-flight reads and inserts to finish and blocks new ones
    /// until done. Safe to call on a manager that never ingested anything.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::StoreUnavailable`] or [`RagError::Timeout`] if the
    /// collection could not be dropped or recreated. A failed reset never
    /// reports success.
    pub async fn reset(&self) -> Result<()> {
        let _gate = self.gate.write().await;
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.discard_handle().await;

        let collection = self.collection();
        self.bounded("drop collection", self.vector_store.delete_collection(collection))
            .await
            .inspect_err(|e| error!(collection, error = %e, "failed to drop collection"))?;
        self.bounded(
            "create collection",
            self.vector_store.create_collection(collection, &self.expected_collection()),
        )
        .await
        .inspect_err(|e| error!(collection, error = %e, "failed to recreate collection"))?;

        info!(collection, generation, "index reset");
        Ok(())
    }

    /// Number of chunks in the collection.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::StoreUnavailable`] or [`RagError::Timeout`].
    pub async fn count(&self) -> Result<usize> {
        let _gate = self.gate.read().await;
        self.bounded("count", self.vector_store.count(self.collection())).await
    }

    /// Whether the collection holds any chunk. Does not require a built handle.
    ///
    /// # Errors
    ///
    /// See [`count`](IndexManager::count).
    pub async fn has_content(&self) -> Result<bool> {
        Ok(self.count().await? > 0)
    }

    /// Embed `question` and return the `top_k` most similar chunks.
    ///
    /// Returns `Ok(None)` when there is nothing indexed. The shared gate is
    /// held for the whole lookup, so a reset cannot interleave with it.
    ///
    /// # Errors
    ///
    /// Returns the embedding, store or timeout error that stopped the lookup.
    pub async fn search(&self, question: &str, top_k: usize) -> Result<Option<Vec<SearchResult>>> {
        let _gate = self.gate.read().await;
        if self.ensure_loaded_locked().await? == IndexState::NoIndex {
            return Ok(None);
        }

        let embedding = self.bounded("embed", self.embedding_provider.embed(question)).await?;
        let results = self
            .bounded("search", self.vector_store.search(self.collection(), &embedding, top_k))
            .await
            .inspect_err(|e| error!(collection = self.collection(), error = %e, "search failed"))?;

        debug!(result_count = results.len(), "search completed");
        Ok(Some(results))
    }
}

/// Builder for constructing an [`IndexManager`].
///
/// The embedding provider and vector store are required. Without a chunker,
/// a [`RecursiveChunker`] sized from the config is used.
///
/// # Example
///
/// ```rust,ignore
/// let index = IndexManager::builder()
///     .config(RagConfig::default())
///     .embedding_provider(Arc::new(HashEmbeddingProvider::default()))
///     .vector_store(Arc::new(InMemoryVectorStore::new()))
///     .build()?;
/// ```
#[derive(Default)]
pub struct IndexManagerBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    chunker: Option<Arc<dyn Chunker>>,
}

impl IndexManagerBuilder {
    /// Set the configuration. Defaults to [`RagConfig::default`].
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

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

    /// Build the [`IndexManager`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if a required field is missing or
    /// the config fails validation.
    pub fn build(self) -> Result<IndexManager> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::ConfigError("embedding_provider is required".to_string()))?;
        let vector_store = self
            .vector_store
            .ok_or_else(|| RagError::ConfigError("vector_store is required".to_string()))?;
        let chunker = self.chunker.unwrap_or_else(|| {
            Arc::new(RecursiveChunker::new(config.chunk_size, config.chunk_overlap))
        });

        Ok(IndexManager {
            config,
            embedding_provider,
            vector_store,
            chunker,
            gate: RwLock::new(()),
            handle: Mutex::new(None),
            generation: AtomicU64::new(0),
        })
    }
}
