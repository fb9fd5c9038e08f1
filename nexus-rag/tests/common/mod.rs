//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use nexus_rag::{
    ChatMessage, Chunk, CollectionInfo, EmbeddingProvider, HashEmbeddingProvider, IndexManager,
    InMemoryVectorStore, RagConfig, RagError, Result, SearchResult, TextCompletion, VectorStore,
};
use tokio::sync::Semaphore;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

pub const DIM: usize = 256;

pub fn embedder() -> Arc<dyn EmbeddingProvider> {
    Arc::new(HashEmbeddingProvider::new(DIM))
}

pub fn index_with(
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    config: RagConfig,
) -> Arc<IndexManager> {
    Arc::new(
        IndexManager::builder()
            .config(config)
            .embedding_provider(embedder)
            .vector_store(store)
            .build()
            .unwrap(),
    )
}

pub fn memory_index() -> Arc<IndexManager> {
    index_with(Arc::new(InMemoryVectorStore::new()), embedder(), RagConfig::default())
}

/// An embedder that is always down.
pub struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(RagError::EmbeddingError {
            provider: "failing".into(),
            message: "connection refused".into(),
        })
    }

    fn dimensions(&self) -> usize {
        DIM
    }

    // Stands in for the hash embedder whose daemon went away.
    fn model_id(&self) -> String {
        HashEmbeddingProvider::new(DIM).model_id()
    }
}

/// An embedder that never answers within any reasonable timeout.
pub struct StalledEmbedder;

#[async_trait]
impl EmbeddingProvider for StalledEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(vec![0.0; DIM])
    }

    fn dimensions(&self) -> usize {
        DIM
    }
}

/// An embedder that announces each batch and then waits for a permit.
pub struct GatedEmbedder {
    inner: HashEmbeddingProvider,
    entered: UnboundedSender<usize>,
    permits: Arc<Semaphore>,
}

impl GatedEmbedder {
    pub fn new() -> (Self, UnboundedReceiver<usize>, Arc<Semaphore>) {
        let (entered, rx) = tokio::sync::mpsc::unbounded_channel();
        let permits = Arc::new(Semaphore::new(0));
        let embedder =
            Self { inner: HashEmbeddingProvider::new(DIM), entered, permits: permits.clone() };
        (embedder, rx, permits)
    }
}

#[async_trait]
impl EmbeddingProvider for GatedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.inner.embed(text).await
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let _ = self.entered.send(texts.len());
        let permit = self.permits.acquire().await.map_err(|e| RagError::EmbeddingError {
            provider: "gated".into(),
            message: e.to_string(),
        })?;
        permit.forget();
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.inner.embed(text).await?);
        }
        Ok(out)
    }

    fn dimensions(&self) -> usize {
        DIM
    }

    fn model_id(&self) -> String {
        self.inner.model_id()
    }
}

/// A store wrapper whose drop can be made to fail.
pub struct FlakyStore {
    inner: InMemoryVectorStore,
    pub fail_drop: AtomicBool,
    pub fail_search: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self {
            inner: InMemoryVectorStore::new(),
            fail_drop: AtomicBool::new(false),
            fail_search: AtomicBool::new(false),
        }
    }

    fn down() -> RagError {
        RagError::StoreUnavailable { backend: "flaky".into(), message: "disk gone".into() }
    }
}

#[async_trait]
impl VectorStore for FlakyStore {
    async fn create_collection(&self, name: &str, info: &CollectionInfo) -> Result<()> {
        self.inner.create_collection(name, info).await
    }

    async fn describe_collection(&self, name: &str) -> Result<Option<CollectionInfo>> {
        self.inner.describe_collection(name).await
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        if self.fail_drop.load(Ordering::SeqCst) {
            return Err(Self::down());
        }
        self.inner.delete_collection(name).await
    }

    async fn upsert(&self, collection: &str, chunks: &[Chunk]) -> Result<()> {
        self.inner.upsert(collection, chunks).await
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        self.inner.count(collection).await
    }

    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        if self.fail_search.load(Ordering::SeqCst) {
            return Err(Self::down());
        }
        self.inner.search(collection, embedding, top_k).await
    }

    fn backend(&self) -> &str {
        "flaky"
    }
}

/// A store whose first count stalls after reading, as a busy backend would.
pub struct SlowFirstCount {
    inner: InMemoryVectorStore,
    stalled: AtomicBool,
    pub delay: Duration,
}

impl SlowFirstCount {
    pub fn new(delay: Duration) -> Self {
        Self { inner: InMemoryVectorStore::new(), stalled: AtomicBool::new(false), delay }
    }
}

#[async_trait]
impl VectorStore for SlowFirstCount {
    async fn create_collection(&self, name: &str, info: &CollectionInfo) -> Result<()> {
        self.inner.create_collection(name, info).await
    }

    async fn describe_collection(&self, name: &str) -> Result<Option<CollectionInfo>> {
        self.inner.describe_collection(name).await
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        self.inner.delete_collection(name).await
    }

    async fn upsert(&self, collection: &str, chunks: &[Chunk]) -> Result<()> {
        self.inner.upsert(collection, chunks).await
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let count = self.inner.count(collection).await?;
        if !self.stalled.swap(true, Ordering::SeqCst) {
            tokio::time::sleep(self.delay).await;
        }
        Ok(count)
    }

    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        self.inner.search(collection, embedding, top_k).await
    }

    fn backend(&self) -> &str {
        "slow-first-count"
    }
}

/// A completion service that replays a fixed reply and records every request.
pub struct ScriptedCompletion {
    reply: std::result::Result<String, String>,
    pub requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedCompletion {
    pub fn replying(reply: &str) -> Self {
        Self { reply: Ok(reply.to_string()), requests: Mutex::new(Vec::new()) }
    }

    pub fn failing(message: &str) -> Self {
        Self { reply: Err(message.to_string()), requests: Mutex::new(Vec::new()) }
    }

    pub fn last_request(&self) -> Vec<ChatMessage> {
        self.requests.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl TextCompletion for ScriptedCompletion {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        self.requests.lock().unwrap().push(messages.to_vec());
        self.reply.clone().map_err(|message| RagError::CompletionError {
            provider: "scripted".into(),
            message,
        })
    }
}
