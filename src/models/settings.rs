//! Engine Configuration Model
//!
//! The aggregate configuration for the question answering engine, stored
//! in config.json. Collects the chunker, embedding, chat model, and
//! retrieval settings into one struct that engine constructors take
//! explicitly.

use serde::{Deserialize, Serialize};

use crate::services::chunker::ChunkerConfig;
use crate::services::embedding::{
    EmbeddingManagerConfig, EmbeddingProviderConfig, EmbeddingProviderType,
};
use crate::services::llm::{ChatModelConfig, ChatProviderType};
use crate::services::retrieval::RetrievalConfig;

/// Aggregate engine configuration stored in config.json.
///
/// The default configuration runs entirely locally (hashing embedder and
/// stub chat model), so a fresh install works without credentials. Remote
/// providers are opt-in via [`EngineConfig::openai`] or explicit fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Embedding provider, cache, and fallback settings
    pub embedding: EmbeddingManagerConfig,
    /// Chat model settings for answer synthesis
    pub chat: ChatModelConfig,
    /// Document chunking settings
    pub chunker: ChunkerConfig,
    /// Retrieval and vector index settings
    pub retrieval: RetrievalConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            embedding: EmbeddingManagerConfig {
                primary: EmbeddingProviderConfig::new(EmbeddingProviderType::Hash),
                ..EmbeddingManagerConfig::default()
            },
            chat: ChatModelConfig::stub(),
            chunker: ChunkerConfig::default(),
            retrieval: RetrievalConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Configuration backed by OpenAI for both embeddings and chat, sharing
    /// one API key.
    pub fn openai(api_key: impl Into<String>) -> Self {
        let api_key = api_key.into();

        let mut primary = EmbeddingProviderConfig::new(EmbeddingProviderType::OpenAI);
        primary.api_key = Some(api_key.clone());

        let chat = ChatModelConfig {
            api_key: Some(api_key),
            ..ChatModelConfig::default()
        };

        Self {
            embedding: EmbeddingManagerConfig {
                primary,
                ..EmbeddingManagerConfig::default()
            },
            chat,
            chunker: ChunkerConfig::default(),
            retrieval: RetrievalConfig::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        self.embedding.validate().map_err(|e| e.to_string())?;
        self.chat.validate().map_err(|e| e.to_string())?;
        self.chunker.validate()?;
        self.retrieval.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_local_and_valid() {
        let config = EngineConfig::default();
        assert_eq!(
            config.embedding.primary.provider,
            EmbeddingProviderType::Hash
        );
        assert_eq!(config.chat.provider, ChatProviderType::Stub);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_carries_documented_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.chunker.chunk_size, 1000);
        assert_eq!(config.chunker.chunk_overlap, 200);
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.retrieval.index.m, 16);
        assert_eq!(config.retrieval.index.ef_construction, 64);
    }

    #[test]
    fn test_openai_config() {
        let config = EngineConfig::openai("sk-test");
        assert_eq!(
            config.embedding.primary.provider,
            EmbeddingProviderType::OpenAI
        );
        assert_eq!(config.embedding.primary.model, "text-embedding-ada-002");
        assert_eq!(config.chat.provider, ChatProviderType::OpenAI);
        assert_eq!(config.chat.model, "gpt-3.5-turbo");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_missing_api_key() {
        let mut config = EngineConfig::openai("sk-test");
        config.chat.api_key = None;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_chunk_size() {
        let mut config = EngineConfig::default();
        config.chunker.chunk_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_fallback_dimension_mismatch() {
        // A fallback that embeds at a different dimension than the primary
        // writes unusable vectors into the shared index.
        let mut config = EngineConfig::openai("sk-test");
        config.embedding.fallback = Some(EmbeddingProviderConfig::new(
            EmbeddingProviderType::Hash,
        ));

        let err = config.validate().unwrap_err();
        assert!(err.contains("fallback dimension 256"));
        assert!(err.contains("primary dimension 1536"));
    }

    #[test]
    fn test_validate_accepts_dimension_matched_fallback() {
        let mut config = EngineConfig::openai("sk-test");
        let mut fallback = EmbeddingProviderConfig::new(EmbeddingProviderType::Hash);
        fallback.dimension = Some(1536);
        config.embedding.fallback = Some(fallback);

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_json_deserializes_to_default() {
        let config: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(
            config.embedding.primary.provider,
            EmbeddingProviderType::Hash
        );
        assert_eq!(config.chat.provider, ChatProviderType::Stub);
    }

    #[test]
    fn test_partial_json_overrides_one_section() {
        let config: EngineConfig =
            serde_json::from_str("{\"retrieval\": {\"top_k\": 3}}").unwrap();
        assert_eq!(config.retrieval.top_k, 3);
        // Untouched sections keep their defaults.
        assert_eq!(config.chunker.chunk_size, 1000);
    }

    #[test]
    fn test_serialization_round_trip() {
        let config = EngineConfig::openai("sk-test");
        let json = serde_json::to_string_pretty(&config).unwrap();
        let parsed: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.chat.model, config.chat.model);
        assert_eq!(parsed.retrieval.top_k, config.retrieval.top_k);
        assert_eq!(
            parsed.embedding.primary.provider,
            config.embedding.primary.provider
        );
    }
}
