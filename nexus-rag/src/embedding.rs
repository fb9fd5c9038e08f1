//! Embedding provider trait for turning text into vectors.

use async_trait::async_trait;

use crate::error::Result;

/// A provider that maps text to fixed-dimension vectors.
///
/// A provider is bound to one model for the lifetime of the process:
/// [`dimensions`](EmbeddingProvider::dimensions) must never change, since
/// similarity search is meaningless across vector sizes.
///
/// # Example
///
/// ```rust,ignore
/// use nexus_rag::{EmbeddingProvider, HashEmbeddingProvider};
///
/// let provider = HashEmbeddingProvider::new(384);
/// let embedding = provider.embed("The sky is blue.").await?;
/// assert_eq!(embedding.len(), provider.dimensions());
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs.
    ///
    /// The default implementation calls [`embed`](EmbeddingProvider::embed)
    /// once per input. Backends with a native batch endpoint should override it.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;

    /// A short name used in logs and error messages.
    fn name(&self) -> &str {
        "embedder"
    }

    /// Identity of the vector space this provider embeds into.
    ///
    /// Two providers may share a collection only if their ids are equal. The
    /// default combines [`name`](EmbeddingProvider::name) and
    /// [`dimensions`](EmbeddingProvider::dimensions); providers that can load
    /// different models of the same size must override it.
    fn model_id(&self) -> String {
        format!("{}/{}", self.name(), self.dimensions())
    }
}
