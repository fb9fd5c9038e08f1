//! Deterministic offline embedding provider.
//!
//! [`HashEmbeddingProvider`] projects lowercase word tokens into a fixed
//! number of buckets with XxHash64 (signed feature hashing) and L2-normalizes
//! the result. It needs no model files or network, so it backs tests and
//! air-gapped runs. Texts sharing vocabulary land close together; identical
//! texts always produce identical vectors.

use std::hash::Hasher;

use async_trait::async_trait;
use twox_hash::XxHash64;

use crate::embedding::EmbeddingProvider;
use crate::error::Result;

/// Dimensionality used by [`HashEmbeddingProvider::default`].
pub const DEFAULT_HASH_DIMENSIONS: usize = 384;

/// An [`EmbeddingProvider`] based on hashed bag-of-words features.
#[derive(Debug, Clone)]
pub struct HashEmbeddingProvider {
    dimensions: usize,
    seed: u64,
}

impl HashEmbeddingProvider {
    /// Create a provider producing vectors of `dimensions` floats (at least one).
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions: dimensions.max(1), seed: 0 }
    }

    /// Use a different hash seed. Vectors from different seeds are not comparable.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions];
        for token in tokens(text) {
            let mut hasher = XxHash64::with_seed(self.seed);
            hasher.write(token.as_bytes());
            let h = hasher.finish();
            let idx = (h % self.dimensions as u64) as usize;
            let sign = if h >> 63 == 0 { 1.0 } else { -1.0 };
            vector[idx] += sign;
        }
        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
        vector
    }
}

impl Default for HashEmbeddingProvider {
    fn default() -> Self {
        Self::new(DEFAULT_HASH_DIMENSIONS)
    }
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()).map(str::to_lowercase)
}

#[async_trait]
impl EmbeddingProvider for HashEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.vectorize(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "hash"
    }

    fn model_id(&self) -> String {
        format!("hash-xxh64/{}/seed-{}", self.dimensions, self.seed)
    }
}
