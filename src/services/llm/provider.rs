//! Chat Model Trait
//!
//! Defines the common interface for chat completion providers on the
//! synthesis path.

use std::sync::Arc;

use async_trait::async_trait;

use super::types::{ChatError, ChatModelConfig, ChatProviderType, ChatResponse, ChatResult};

/// Trait that all chat model providers implement.
///
/// Completions are single-prompt and non-streaming: the synthesizer fills
/// a template and wants the model's full text back.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Returns the provider name for identification.
    fn name(&self) -> &'static str;

    /// Returns the current model being used.
    fn model(&self) -> &str;

    /// Complete a single prompt and return the full response.
    async fn complete(&self, prompt: &str) -> ChatResult<ChatResponse>;

    /// Check if the provider is healthy and reachable.
    ///
    /// For API providers this validates the API key.
    async fn health_check(&self) -> ChatResult<()>;
}

/// Helper to create an error for a missing API key.
pub fn missing_api_key_error(provider: &str) -> ChatError {
    ChatError::AuthenticationFailed {
        message: format!("API key not configured for {}", provider),
    }
}

/// Map an HTTP error status to the chat error taxonomy.
pub fn parse_http_error(status: u16, body: &str, provider: &str) -> ChatError {
    match status {
        401 => ChatError::AuthenticationFailed {
            message: format!("{}: Invalid API key", provider),
        },
        403 => ChatError::AuthenticationFailed {
            message: format!("{}: Access denied", provider),
        },
        404 => ChatError::ModelNotFound {
            model: body.to_string(),
        },
        429 => ChatError::RateLimited {
            message: body.to_string(),
            retry_after: None,
        },
        400 => {
            let lower = body.to_lowercase();
            if lower.contains("context_length") || lower.contains("maximum context") {
                ChatError::ContextLengthExceeded {
                    message: body.to_string(),
                    max_tokens: None,
                }
            } else {
                ChatError::InvalidRequest {
                    message: body.to_string(),
                }
            }
        }
        500..=599 => ChatError::ServerError {
            message: body.to_string(),
            status: Some(status),
        },
        _ => ChatError::Other {
            message: format!("HTTP {}: {}", status, body),
        },
    }
}

/// Factory function that maps the configured provider type to the concrete
/// chat model implementation.
pub fn create_chat_model(config: ChatModelConfig) -> Arc<dyn ChatModel> {
    match config.provider {
        ChatProviderType::OpenAI => Arc::new(super::openai::OpenAIChatModel::new(config)),
        ChatProviderType::Stub => Arc::new(super::stub::StubChatModel::new()),
    }
}
