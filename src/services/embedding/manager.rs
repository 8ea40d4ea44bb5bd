//! Embedding Manager Dispatch Layer
//!
//! Central orchestration layer for embedding operations. Routes requests to
//! a primary provider with automatic fallback, handles batch chunking by
//! provider limits, and maintains a content-level embedding cache keyed by
//! provider/model/text hash.
//!
//! `EmbeddingManager` is the single dispatch point that consumers receive via
//! `Arc<EmbeddingManager>`. It centralises provider selection, fallback logic,
//! and caching policies so individual consumers never manage providers directly.
//!
//! ## Thread Safety
//!
//! The manager is `Send + Sync`. The internal cache uses `mini_moka::sync::Cache`
//! which is thread-safe with no external locking needed.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing;

/// Maximum number of retry attempts for transient embedding errors.
const EMBED_MAX_RETRY_ATTEMPTS: usize = 3;

/// Base delay between retries (in milliseconds).  Actual delays follow
/// exponential backoff: 500ms, 1000ms, 2000ms, …
const EMBED_RETRY_BASE_DELAY_MS: u64 = 500;

/// Maximum delay cap to prevent excessively long waits.
const EMBED_RETRY_MAX_DELAY_MS: u64 = 10_000;

use mini_moka::sync::{Cache, ConcurrentCacheExt};

use super::hash::HashEmbeddingProvider;
use super::openai::OpenAIEmbeddingProvider;
use super::provider::{
    EmbeddingError, EmbeddingProvider, EmbeddingProviderConfig, EmbeddingProviderType,
    EmbeddingResult,
};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for the `EmbeddingManager` dispatch layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingManagerConfig {
    /// Primary embedding provider configuration.
    pub primary: EmbeddingProviderConfig,

    /// Optional fallback provider configuration.
    /// Used when the primary provider returns a retryable error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<EmbeddingProviderConfig>,

    /// Whether to enable the content-level embedding cache.
    #[serde(default = "default_cache_enabled")]
    pub cache_enabled: bool,

    /// Maximum number of entries in the embedding cache.
    #[serde(default = "default_cache_max_entries")]
    pub cache_max_entries: usize,
}

fn default_cache_enabled() -> bool {
    true
}

fn default_cache_max_entries() -> usize {
    10_000
}

impl Default for EmbeddingManagerConfig {
    fn default() -> Self {
        Self {
            primary: EmbeddingProviderConfig::default(),
            fallback: None,
            cache_enabled: default_cache_enabled(),
            cache_max_entries: default_cache_max_entries(),
        }
    }
}

impl EmbeddingManagerConfig {
    /// Validate the manager configuration.
    ///
    /// Beyond per-provider validation, a configured fallback must match the
    /// primary's effective dimension: fallback vectors are written to the
    /// same index as primary vectors.
    pub fn validate(&self) -> EmbeddingResult<()> {
        self.primary.validate()?;

        if let Some(ref fallback) = self.fallback {
            fallback.validate()?;

            let primary_dim = self.primary.effective_dimension();
            let fallback_dim = fallback.effective_dimension();
            if fallback_dim != primary_dim {
                return Err(EmbeddingError::InvalidConfig {
                    message: format!(
                        "fallback dimension {} does not match primary dimension {}",
                        fallback_dim, primary_dim
                    ),
                });
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Cache key
// ---------------------------------------------------------------------------

/// Cache key combining provider type, model name, dimension, and a SHA-256
/// text hash.
///
/// Two embedding requests with identical (provider, model, dimension, text)
/// produce the same cache key, avoiding redundant provider calls.
/// Including `dimension` ensures that switching embedding dimensions (e.g.
/// after a provider config change) does not serve stale cached vectors.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    provider: EmbeddingProviderType,
    model: String,
    dimension: usize,
    text_hash: [u8; 32],
}

impl CacheKey {
    fn new(provider: EmbeddingProviderType, model: &str, text: &str, dimension: usize) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        let hash: [u8; 32] = hasher.finalize().into();

        Self {
            provider,
            model: model.to_string(),
            dimension,
            text_hash: hash,
        }
    }
}

// ---------------------------------------------------------------------------
// EmbeddingManager
// ---------------------------------------------------------------------------

/// Central dispatch layer for embedding operations.
///
/// Manages a primary provider and optional fallback, with batch chunking and
/// content-level caching. Designed to be shared via `Arc<EmbeddingManager>`
/// across Tokio tasks.
///
/// # Fallback Behaviour
///
/// When the primary provider returns a *retryable* error (network, rate limit,
/// server error, provider unavailable), the manager automatically retries the
/// request against the fallback provider (if configured). Non-retryable errors
/// (authentication, invalid config, etc.) are returned immediately. The
/// fallback must share the primary's embedding dimension; [`Self::from_config`]
/// rejects mismatched pairs.
///
/// # Batch Chunking
///
/// If the caller passes N documents but the provider's `max_batch_size` is M < N,
/// the manager chunks the input into ceil(N/M) batches, embeds each, and
/// reassembles the results in order.
pub struct EmbeddingManager {
    /// Primary embedding provider.
    primary: Box<dyn EmbeddingProvider>,

    /// Optional fallback provider for retryable errors.
    fallback: Option<Box<dyn EmbeddingProvider>>,

    /// Content-level embedding cache.
    /// Key: (provider_type, model, dimension, sha256(text)) -> embedding vector.
    cache: Option<Cache<CacheKey, Vec<f32>>>,

    /// The configuration used to construct this manager.
    config: EmbeddingManagerConfig,
}

impl std::fmt::Debug for EmbeddingManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingManager")
            .field("primary", &self.primary.display_name())
            .field("fallback", &self.fallback.as_ref().map(|p| p.display_name()))
            .field("cache_enabled", &self.cache.is_some())
            .field("config", &self.config)
            .finish()
    }
}

impl EmbeddingManager {
    /// Construct a new `EmbeddingManager` with pre-built providers.
    ///
    /// # Arguments
    ///
    /// * `primary` - The primary embedding provider.
    /// * `fallback` - Optional fallback provider.
    /// * `config` - The manager configuration.
    pub fn new(
        primary: Box<dyn EmbeddingProvider>,
        fallback: Option<Box<dyn EmbeddingProvider>>,
        config: EmbeddingManagerConfig,
    ) -> Self {
        let cache = if config.cache_enabled {
            Some(
                Cache::builder()
                    .max_capacity(config.cache_max_entries as u64)
                    .time_to_live(Duration::from_secs(30 * 60)) // 30 min TTL
                    .build(),
            )
        } else {
            None
        };

        Self {
            primary,
            fallback,
            cache,
            config,
        }
    }

    /// Factory method: construct an `EmbeddingManager` from configuration.
    ///
    /// Creates the appropriate provider instances based on the config.
    ///
    /// # Errors
    ///
    /// Returns `EmbeddingError::InvalidConfig` if config validation fails,
    /// including a fallback provider whose dimension differs from the
    /// primary's.
    pub fn from_config(config: EmbeddingManagerConfig) -> EmbeddingResult<Self> {
        config.validate()?;

        let primary = Self::build_provider(&config.primary);
        let fallback = config.fallback.as_ref().map(Self::build_provider);

        Ok(Self::new(primary, fallback, config))
    }

    /// Build a single provider from its configuration.
    fn build_provider(config: &EmbeddingProviderConfig) -> Box<dyn EmbeddingProvider> {
        match config.provider {
            EmbeddingProviderType::Hash => Box::new(HashEmbeddingProvider::new(config)),
            EmbeddingProviderType::OpenAI => Box::new(OpenAIEmbeddingProvider::new(config)),
        }
    }

    // -----------------------------------------------------------------------
    // Public API
    // -----------------------------------------------------------------------

    /// Embed a batch of document texts with batching, caching, and fallback.
    ///
    /// - Checks the cache for each document, only embedding cache misses.
    /// - Chunks the uncached documents by provider `max_batch_size`.
    /// - Falls back to the fallback provider on retryable errors.
    /// - Returns vectors in the same order as the input documents.
    pub async fn embed_documents(&self, documents: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        // Try primary first, fallback on retryable errors.
        match self
            .embed_documents_with_provider(&*self.primary, documents)
            .await
        {
            Ok(results) => Ok(results),
            Err(err) if err.is_retryable() && self.fallback.is_some() => {
                tracing::warn!(
                    "primary provider {} failed with retryable error: {}; trying fallback",
                    self.primary.display_name(),
                    err
                );
                let fallback = self.fallback.as_ref().unwrap();
                self.embed_documents_with_provider(&**fallback, documents)
                    .await
            }
            Err(err) => Err(err),
        }
    }

    /// Embed a single query text with caching and fallback.
    ///
    /// Checks the cache first. On cache miss, delegates to the primary
    /// provider (with fallback on retryable errors).
    pub async fn embed_query(&self, query: &str) -> EmbeddingResult<Vec<f32>> {
        match self.embed_query_with_provider(&*self.primary, query).await {
            Ok(result) => Ok(result),
            Err(err) if err.is_retryable() && self.fallback.is_some() => {
                tracing::warn!(
                    "primary provider {} failed with retryable error: {}; trying fallback",
                    self.primary.display_name(),
                    err
                );
                let fallback = self.fallback.as_ref().unwrap();
                self.embed_query_with_provider(&**fallback, query).await
            }
            Err(err) => Err(err),
        }
    }

    /// Check if the primary (and optionally fallback) providers are healthy.
    pub async fn health_check(&self) -> EmbeddingResult<()> {
        self.primary.health_check().await?;
        if let Some(ref fallback) = self.fallback {
            fallback.health_check().await?;
        }
        Ok(())
    }

    /// Returns the dimensionality of the primary provider's embeddings.
    pub fn dimension(&self) -> usize {
        self.primary.dimension()
    }

    /// Returns the primary provider's type identifier.
    pub fn provider_type(&self) -> EmbeddingProviderType {
        self.primary.provider_type()
    }

    /// Returns the primary provider's human-readable display name.
    /// Examples: "OpenAI (text-embedding-ada-002)", "Hash (Local)"
    pub fn display_name(&self) -> &str {
        self.primary.display_name()
    }

    /// Returns a reference to the primary provider for direct access.
    pub fn primary_provider(&self) -> &dyn EmbeddingProvider {
        &*self.primary
    }

    /// Returns a reference to the fallback provider, if configured.
    pub fn fallback_provider(&self) -> Option<&dyn EmbeddingProvider> {
        self.fallback.as_deref()
    }

    /// Returns a reference to the manager configuration.
    pub fn config(&self) -> &EmbeddingManagerConfig {
        &self.config
    }

    /// Returns the number of entries currently in the cache.
    ///
    /// Runs pending internal tasks first to ensure the count is accurate.
    /// Returns 0 if the cache is disabled.
    pub fn cache_entry_count(&self) -> u64 {
        self.cache.as_ref().map_or(0, |c| {
            c.sync();
            c.entry_count()
        })
    }

    /// Invalidate all entries in the cache.
    pub fn cache_invalidate_all(&self) {
        if let Some(ref cache) = self.cache {
            cache.invalidate_all();
            cache.sync();
        }
    }

    // -----------------------------------------------------------------------
    // Internal helpers
    // -----------------------------------------------------------------------

    /// Delay in milliseconds before the next retry attempt.
    ///
    /// A rate-limit retry-after hint takes precedence over the exponential
    /// backoff schedule; either way the wait is capped at
    /// `EMBED_RETRY_MAX_DELAY_MS`.
    fn retry_delay_ms(attempt: usize, retry_after_secs: Option<u64>) -> u64 {
        let wait_ms = match retry_after_secs {
            Some(secs) => secs.saturating_mul(1000),
            None => EMBED_RETRY_BASE_DELAY_MS * (1u64 << attempt),
        };
        wait_ms.min(EMBED_RETRY_MAX_DELAY_MS)
    }

    /// Embed a batch of texts with retry + exponential backoff for transient errors.
    ///
    /// Retries up to `EMBED_MAX_RETRY_ATTEMPTS` times on retryable errors,
    /// waiting [`Self::retry_delay_ms`] between attempts. The final failure
    /// returns immediately, with no trailing sleep.
    async fn embed_batch_with_retry(
        provider: &dyn EmbeddingProvider,
        batch: &[&str],
    ) -> EmbeddingResult<Vec<Vec<f32>>> {
        for attempt in 0..EMBED_MAX_RETRY_ATTEMPTS {
            match provider.embed_documents(batch).await {
                Ok(result) => return Ok(result),
                Err(err) => {
                    if !err.is_retryable() || attempt + 1 == EMBED_MAX_RETRY_ATTEMPTS {
                        return Err(err);
                    }

                    let wait_ms = Self::retry_delay_ms(attempt, err.retry_after_secs());
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_attempts = EMBED_MAX_RETRY_ATTEMPTS,
                        wait_ms,
                        error = %err,
                        "embed_batch_with_retry: retryable error, backing off"
                    );
                    tokio::time::sleep(Duration::from_millis(wait_ms)).await;
                }
            }
        }

        Err(EmbeddingError::Other {
            message: "retry attempts exhausted".to_string(),
        })
    }

    /// Embed a single query with retry + exponential backoff for transient errors.
    async fn embed_query_with_retry(
        provider: &dyn EmbeddingProvider,
        query: &str,
    ) -> EmbeddingResult<Vec<f32>> {
        for attempt in 0..EMBED_MAX_RETRY_ATTEMPTS {
            match provider.embed_query(query).await {
                Ok(result) => return Ok(result),
                Err(err) => {
                    if !err.is_retryable() || attempt + 1 == EMBED_MAX_RETRY_ATTEMPTS {
                        return Err(err);
                    }

                    let wait_ms = Self::retry_delay_ms(attempt, err.retry_after_secs());
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_attempts = EMBED_MAX_RETRY_ATTEMPTS,
                        wait_ms,
                        error = %err,
                        "embed_query_with_retry: retryable error, backing off"
                    );
                    tokio::time::sleep(Duration::from_millis(wait_ms)).await;
                }
            }
        }

        Err(EmbeddingError::Other {
            message: "retry attempts exhausted".to_string(),
        })
    }

    /// Embed documents via a specific provider, with cache lookup and batch chunking.
    async fn embed_documents_with_provider(
        &self,
        provider: &dyn EmbeddingProvider,
        documents: &[&str],
    ) -> EmbeddingResult<Vec<Vec<f32>>> {
        let provider_type = provider.provider_type();
        let model = provider.display_name().to_string();
        let expected_dim = provider.dimension();

        // Phase 1: Check cache for each document
        let mut results: Vec<Option<Vec<f32>>> = Vec::with_capacity(documents.len());
        let mut uncached_indices: Vec<usize> = Vec::new();
        let mut uncached_texts: Vec<&str> = Vec::new();

        for (i, &doc) in documents.iter().enumerate() {
            if let Some(cached) = self.cache_get(provider_type, &model, doc, expected_dim) {
                results.push(Some(cached));
            } else {
                results.push(None);
                uncached_indices.push(i);
                uncached_texts.push(doc);
            }
        }

        // Phase 2: Embed uncached texts in batches (with retry)
        if !uncached_texts.is_empty() {
            let max_batch = provider.max_batch_size();
            let mut all_embeddings: Vec<Vec<f32>> = Vec::with_capacity(uncached_texts.len());

            for chunk in uncached_texts.chunks(max_batch) {
                let batch_result = Self::embed_batch_with_retry(provider, chunk).await?;
                all_embeddings.extend(batch_result);
            }

            // Phase 3: Insert into cache and fill in results
            for (batch_idx, &original_idx) in uncached_indices.iter().enumerate() {
                let embedding = all_embeddings[batch_idx].clone();
                self.cache_put(
                    provider_type,
                    &model,
                    documents[original_idx],
                    embedding.clone(),
                );
                results[original_idx] = Some(embedding);
            }
        }

        Ok(results.into_iter().map(|opt| opt.unwrap()).collect())
    }

    /// Embed a single query via a specific provider, with cache lookup.
    async fn embed_query_with_provider(
        &self,
        provider: &dyn EmbeddingProvider,
        query: &str,
    ) -> EmbeddingResult<Vec<f32>> {
        let provider_type = provider.provider_type();
        let model = provider.display_name().to_string();
        let expected_dim = provider.dimension();

        if let Some(cached) = self.cache_get(provider_type, &model, query, expected_dim) {
            return Ok(cached);
        }

        let embedding = Self::embed_query_with_retry(provider, query).await?;

        self.cache_put(provider_type, &model, query, embedding.clone());

        Ok(embedding)
    }

    /// Look up a cached embedding for the given (provider, model, text).
    ///
    /// Includes the expected dimension in the cache key to avoid serving
    /// stale vectors after a provider dimension change. On cache hit,
    /// verifies the cached vector length matches `expected_dimension`.
    fn cache_get(
        &self,
        provider: EmbeddingProviderType,
        model: &str,
        text: &str,
        expected_dimension: usize,
    ) -> Option<Vec<f32>> {
        self.cache.as_ref().and_then(|c| {
            let key = CacheKey::new(provider, model, text, expected_dimension);
            let cached = c.get(&key)?;
            if expected_dimension > 0 && cached.len() != expected_dimension {
                tracing::warn!(
                    cached_dim = cached.len(),
                    expected_dim = expected_dimension,
                    "Embedding cache hit rejected: dimension mismatch"
                );
                return None;
            }
            Some(cached)
        })
    }

    /// Store an embedding in the cache.
    fn cache_put(
        &self,
        provider: EmbeddingProviderType,
        model: &str,
        text: &str,
        embedding: Vec<f32>,
    ) {
        if let Some(ref cache) = self.cache {
            let dimension = embedding.len();
            let key = CacheKey::new(provider, model, text, dimension);
            cache.insert(key, embedding);
        }
    }
}

// ---------------------------------------------------------------------------
// Thread safety assertions
// ---------------------------------------------------------------------------

// Compile-time assertion that EmbeddingManager is Send + Sync.
const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn assert_embedding_manager() {
        assert_send_sync::<EmbeddingManager>();
    }
};

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
