//! Chat Model Types
//!
//! Core types for language model interactions on the synthesis path.

use serde::{Deserialize, Serialize};

/// Default chat completion model.
pub const DEFAULT_CHAT_MODEL: &str = "gpt-3.5-turbo";

/// Supported chat model providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatProviderType {
    /// OpenAI-compatible chat completions API.
    OpenAI,
    /// Deterministic offline stub for tests and air-gapped use.
    Stub,
}

impl std::fmt::Display for ChatProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChatProviderType::OpenAI => write!(f, "openai"),
            ChatProviderType::Stub => write!(f, "stub"),
        }
    }
}

/// Configuration for a chat model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatModelConfig {
    /// The provider type.
    #[serde(default = "default_provider")]
    pub provider: ChatProviderType,
    /// Model name to use.
    #[serde(default = "default_model")]
    pub model: String,
    /// API key (not needed for the stub).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Base URL override for OpenAI-compatible gateways.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Maximum tokens to generate.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Sampling temperature (0.0 - 1.0).
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_provider() -> ChatProviderType {
    ChatProviderType::OpenAI
}

fn default_model() -> String {
    DEFAULT_CHAT_MODEL.to_string()
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_temperature() -> f32 {
    0.7
}

impl Default for ChatModelConfig {
    fn default() -> Self {
        Self {
            provider: ChatProviderType::OpenAI,
            model: default_model(),
            api_key: None,
            base_url: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

impl ChatModelConfig {
    /// Configuration for the offline stub model.
    pub fn stub() -> Self {
        Self {
            provider: ChatProviderType::Stub,
            model: "stub-v1".to_string(),
            api_key: None,
            base_url: None,
            max_tokens: default_max_tokens(),
            temperature: 0.0,
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> ChatResult<()> {
        if self.model.trim().is_empty() {
            return Err(ChatError::InvalidRequest {
                message: "chat model name must not be empty".to_string(),
            });
        }
        if self.provider == ChatProviderType::OpenAI && self.api_key.is_none() {
            return Err(ChatError::AuthenticationFailed {
                message: "OpenAI chat provider requires an API key but none was provided"
                    .to_string(),
            });
        }
        Ok(())
    }
}

/// Token usage reported by a chat completion.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ChatUsage {
    /// Tokens in the prompt.
    pub prompt_tokens: u32,
    /// Tokens in the generated completion.
    pub completion_tokens: u32,
}

impl ChatUsage {
    /// Total tokens used.
    pub fn total_tokens(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// Response from a chat model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Text content of the response, verbatim.
    pub text: String,
    /// The model that generated the response.
    pub model: String,
    /// Token usage, when the provider reports it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<ChatUsage>,
}

/// Error types for chat model operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatError {
    /// Authentication failed (invalid or missing API key).
    AuthenticationFailed { message: String },
    /// Rate limit exceeded.
    RateLimited {
        message: String,
        retry_after: Option<u32>,
    },
    /// Model not found or not available.
    ModelNotFound { model: String },
    /// Invalid request (bad parameters).
    InvalidRequest { message: String },
    /// Server error from the provider.
    ServerError {
        message: String,
        status: Option<u16>,
    },
    /// Network/connection error.
    NetworkError { message: String },
    /// Response parsing error.
    ParseError { message: String },
    /// Provider not reachable.
    ProviderUnavailable { message: String },
    /// Prompt exceeded the model's context window.
    ContextLengthExceeded {
        message: String,
        max_tokens: Option<u32>,
    },
    /// Other error.
    Other { message: String },
}

impl ChatError {
    /// Whether retrying the call (with backoff) can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ChatError::NetworkError { .. }
                | ChatError::RateLimited { .. }
                | ChatError::ServerError { .. }
                | ChatError::ProviderUnavailable { .. }
        )
    }
}

impl std::fmt::Display for ChatError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChatError::AuthenticationFailed { message } => {
                write!(f, "Authentication failed: {}", message)
            }
            ChatError::RateLimited { message, .. } => {
                write!(f, "Rate limited: {}", message)
            }
            ChatError::ModelNotFound { model } => {
                write!(f, "Model not found: {}", model)
            }
            ChatError::InvalidRequest { message } => {
                write!(f, "Invalid request: {}", message)
            }
            ChatError::ServerError { message, status } => {
                if let Some(s) = status {
                    write!(f, "Server error ({}): {}", s, message)
                } else {
                    write!(f, "Server error: {}", message)
                }
            }
            ChatError::NetworkError { message } => {
                write!(f, "Network error: {}", message)
            }
            ChatError::ParseError { message } => {
                write!(f, "Parse error: {}", message)
            }
            ChatError::ProviderUnavailable { message } => {
                write!(f, "Provider unavailable: {}", message)
            }
            ChatError::ContextLengthExceeded { message, .. } => {
                write!(f, "Context length exceeded: {}", message)
            }
            ChatError::Other { message } => {
                write!(f, "Error: {}", message)
            }
        }
    }
}

impl std::error::Error for ChatError {}

/// Result type for chat model operations.
pub type ChatResult<T> = Result<T, ChatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = ChatModelConfig::default();
        assert_eq!(config.provider, ChatProviderType::OpenAI);
        assert_eq!(config.model, "gpt-3.5-turbo");
        assert_eq!(config.max_tokens, 1024);
        assert!((config.temperature - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn test_stub_config_validates_without_api_key() {
        let config = ChatModelConfig::stub();
        assert_eq!(config.provider, ChatProviderType::Stub);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_openai_config_requires_api_key() {
        let config = ChatModelConfig::default();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ChatError::AuthenticationFailed { .. }));

        let config = ChatModelConfig {
            api_key: Some("sk-test".to_string()),
            ..ChatModelConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_model_rejected() {
        let config = ChatModelConfig {
            model: "  ".to_string(),
            ..ChatModelConfig::stub()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = ChatModelConfig {
            provider: ChatProviderType::OpenAI,
            model: "gpt-4o-mini".to_string(),
            api_key: Some("sk-test".to_string()),
            base_url: Some("https://gateway.example.com/v1".to_string()),
            max_tokens: 2048,
            temperature: 0.2,
        };
        let json = serde_json::to_string(&config).unwrap();
        let parsed: ChatModelConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.model, "gpt-4o-mini");
        assert_eq!(parsed.max_tokens, 2048);
    }

    #[test]
    fn test_config_missing_fields_use_defaults() {
        let parsed: ChatModelConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed.provider, ChatProviderType::OpenAI);
        assert_eq!(parsed.model, DEFAULT_CHAT_MODEL);
    }

    #[test]
    fn test_error_retryability() {
        assert!(ChatError::NetworkError {
            message: "timeout".into()
        }
        .is_retryable());
        assert!(ChatError::RateLimited {
            message: "slow down".into(),
            retry_after: Some(5),
        }
        .is_retryable());
        assert!(ChatError::ServerError {
            message: "oops".into(),
            status: Some(503),
        }
        .is_retryable());

        assert!(!ChatError::AuthenticationFailed {
            message: "bad key".into()
        }
        .is_retryable());
        assert!(!ChatError::ParseError {
            message: "bad json".into()
        }
        .is_retryable());
        assert!(!ChatError::ContextLengthExceeded {
            message: "too long".into(),
            max_tokens: Some(4096),
        }
        .is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = ChatError::ServerError {
            message: "unavailable".to_string(),
            status: Some(503),
        };
        assert_eq!(err.to_string(), "Server error (503): unavailable");

        let err = ChatError::ModelNotFound {
            model: "gpt-99".to_string(),
        };
        assert_eq!(err.to_string(), "Model not found: gpt-99");
    }

    #[test]
    fn test_error_serialization_tagged() {
        let err = ChatError::RateLimited {
            message: "slow down".to_string(),
            retry_after: Some(30),
        };
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("\"type\":\"rate_limited\""));
        let parsed: ChatError = serde_json::from_str(&json).unwrap();
        assert!(matches!(
            parsed,
            ChatError::RateLimited {
                retry_after: Some(30),
                ..
            }
        ));
    }

    #[test]
    fn test_usage_total() {
        let usage = ChatUsage {
            prompt_tokens: 100,
            completion_tokens: 25,
        };
        assert_eq!(usage.total_tokens(), 125);
    }
}
