//! Embedding System
//!
//! Turns text into fixed-dimension vectors for similarity retrieval:
//! - `provider`: The `EmbeddingProvider` trait, provider configs, and errors
//! - `openai`: Remote provider backed by the OpenAI embeddings API
//! - `hash`: Deterministic local provider based on SHA-256 feature hashing
//! - `manager`: Dispatch layer with caching, retry, batching, and fallback

pub mod hash;
pub mod manager;
pub mod openai;
pub mod provider;

pub use hash::HashEmbeddingProvider;
pub use manager::{EmbeddingManager, EmbeddingManagerConfig};
pub use openai::OpenAIEmbeddingProvider;
pub use provider::{
    EmbeddingError, EmbeddingProvider, EmbeddingProviderConfig, EmbeddingProviderType,
    EmbeddingResult,
};
