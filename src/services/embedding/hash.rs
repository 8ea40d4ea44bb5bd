//! Hash Embedding Provider
//!
//! Deterministic, fully local embedding backend based on feature hashing.
//! Each token is hashed with SHA-256 into one of `dimension` buckets and
//! the resulting count vector is L2-normalised.
//!
//! ## Design Decisions
//!
//! * **Deterministic**: the same input text always produces byte-identical
//!   vectors, across processes and platforms. This makes retrieval tests
//!   reproducible without network access.
//! * **Token overlap drives similarity**: two texts that share tokens land
//!   weight in the same buckets, so their cosine similarity rises with
//!   overlap. That is enough signal for nearest-neighbour retrieval in
//!   tests and offline setups.
//! * **No vocabulary**: unlike TF-IDF style embedders there is no fitting
//!   step and no shared state, so the provider is trivially `Send + Sync`.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::provider::{
    EmbeddingError, EmbeddingProvider, EmbeddingProviderConfig, EmbeddingProviderType,
    EmbeddingResult,
};

/// Default dimension for hash embeddings.
const DEFAULT_DIMENSION: usize = 256;

/// Maximum batch size accepted per call.
const MAX_BATCH_SIZE: usize = 1000;

/// Local embedding provider that maps tokens into hash buckets.
///
/// # Thread Safety
///
/// Stateless apart from the configured dimension, so `Send + Sync`
/// without any synchronisation.
pub struct HashEmbeddingProvider {
    dimension: usize,
}

impl HashEmbeddingProvider {
    /// Create a provider from an `EmbeddingProviderConfig`.
    ///
    /// Uses the configured dimension when present, otherwise the
    /// 256-bucket default.
    pub fn new(config: &EmbeddingProviderConfig) -> Self {
        Self {
            dimension: config.dimension.unwrap_or(DEFAULT_DIMENSION),
        }
    }

    /// Create a provider with an explicit dimension.
    pub fn with_dimension(dimension: usize) -> Self {
        Self { dimension }
    }

    /// Split text into lowercase alphanumeric tokens.
    fn tokenize(text: &str) -> Vec<String> {
        text.to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(|t| t.to_string())
            .collect()
    }

    /// Map a token to a bucket index via the first 4 bytes of its SHA-256.
    fn bucket(&self, token: &str) -> usize {
        let digest = Sha256::digest(token.as_bytes());
        let raw = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
        (raw as usize) % self.dimension
    }

    /// Embed a single text into a normalised bucket-count vector.
    ///
    /// Texts with no tokens produce the zero vector.
    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dimension];

        for token in Self::tokenize(text) {
            vector[self.bucket(&token)] += 1.0;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in vector.iter_mut() {
                *v /= norm;
            }
        }

        vector
    }
}

// -------------------------------------------------------------------------
// EmbeddingProvider trait implementation
// -------------------------------------------------------------------------

#[async_trait]
impl EmbeddingProvider for HashEmbeddingProvider {
    async fn embed_documents(&self, documents: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>> {
        if documents.len() > MAX_BATCH_SIZE {
            return Err(EmbeddingError::BatchSizeLimitExceeded {
                requested: documents.len(),
                max_allowed: MAX_BATCH_SIZE,
            });
        }

        Ok(documents.iter().map(|d| self.embed_one(d)).collect())
    }

    async fn embed_query(&self, query: &str) -> EmbeddingResult<Vec<f32>> {
        Ok(self.embed_one(query))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn health_check(&self) -> EmbeddingResult<()> {
        Ok(())
    }

    fn is_local(&self) -> bool {
        true
    }

    fn max_batch_size(&self) -> usize {
        MAX_BATCH_SIZE
    }

    fn provider_type(&self) -> EmbeddingProviderType {
        EmbeddingProviderType::Hash
    }

    fn display_name(&self) -> &str {
        "Hash (Local)"
    }
}

// -------------------------------------------------------------------------
// Tests
// -------------------------------------------------------------------------
