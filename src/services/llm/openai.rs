//! OpenAI Chat Provider
//!
//! Implementation of the `ChatModel` trait against OpenAI's chat
//! completions API. Non-streaming: the synthesizer needs the full answer
//! text, nothing incremental.
//!
//! The base URL is overridable so OpenAI-compatible gateways work with the
//! same code path.

use async_trait::async_trait;
use serde::Deserialize;

use super::provider::{missing_api_key_error, parse_http_error, ChatModel};
use super::types::{ChatError, ChatModelConfig, ChatResponse, ChatResult, ChatUsage};

/// Default OpenAI chat completions endpoint.
const OPENAI_CHAT_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// OpenAI chat model.
pub struct OpenAIChatModel {
    config: ChatModelConfig,
    client: reqwest::Client,
}

impl OpenAIChatModel {
    /// Create a new OpenAI chat model with the given configuration.
    pub fn new(config: ChatModelConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// The chat completions endpoint.
    fn completions_url(&self) -> &str {
        self.config.base_url.as_deref().unwrap_or(OPENAI_CHAT_API_URL)
    }

    /// Derive the models listing endpoint from the completions endpoint,
    /// so gateway overrides keep health checks on the same host.
    fn models_url(&self) -> String {
        match self.completions_url().strip_suffix("/chat/completions") {
            Some(base) => format!("{}/models", base),
            None => "https://api.openai.com/v1/models".to_string(),
        }
    }

    /// Build the chat completions request body.
    fn build_request_body(&self, prompt: &str) -> serde_json::Value {
        serde_json::json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "stream": false,
            "messages": [
                {
                    "role": "user",
                    "content": prompt,
                }
            ],
        })
    }

    /// Extract the response text and usage from a parsed API response.
    fn parse_response(&self, response: OpenAIChatResponse) -> ChatResult<ChatResponse> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ChatError::ParseError {
                message: "response contained no choices".to_string(),
            })?;

        let text = choice
            .message
            .and_then(|m| m.content)
            .ok_or_else(|| ChatError::ParseError {
                message: "response contained no message content".to_string(),
            })?;

        let usage = response.usage.map(|u| ChatUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
        });

        Ok(ChatResponse {
            text,
            model: response.model,
            usage,
        })
    }
}

#[async_trait]
impl ChatModel for OpenAIChatModel {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, prompt: &str) -> ChatResult<ChatResponse> {
        let api_key = self
            .config
            .api_key
            .as_ref()
            .ok_or_else(|| missing_api_key_error("openai"))?;

        let body = self.build_request_body(prompt);

        let response = self
            .client
            .post(self.completions_url())
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ChatError::NetworkError {
                message: e.to_string(),
            })?;

        let status = response.status().as_u16();
        let body_text = response.text().await.map_err(|e| ChatError::NetworkError {
            message: e.to_string(),
        })?;

        if status != 200 {
            return Err(parse_http_error(status, &body_text, "openai"));
        }

        let parsed: OpenAIChatResponse =
            serde_json::from_str(&body_text).map_err(|e| ChatError::ParseError {
                message: format!("Failed to parse response: {}", e),
            })?;

        self.parse_response(parsed)
    }

    async fn health_check(&self) -> ChatResult<()> {
        let api_key = self
            .config
            .api_key
            .as_ref()
            .ok_or_else(|| missing_api_key_error("openai"))?;

        // List models to verify the API key.
        let response = self
            .client
            .get(self.models_url())
            .header("Authorization", format!("Bearer {}", api_key))
            .send()
            .await
            .map_err(|e| ChatError::NetworkError {
                message: e.to_string(),
            })?;

        let status = response.status().as_u16();
        if status == 200 {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(parse_http_error(status, &body, "openai"))
        }
    }
}

/// OpenAI chat completions response format.
#[derive(Debug, Deserialize)]
struct OpenAIChatResponse {
    model: String,
    choices: Vec<Choice>,
    usage: Option<ResponseUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> ChatModelConfig {
        ChatModelConfig {
            api_key: Some("sk-test".to_string()),
            ..ChatModelConfig::default()
        }
    }

    #[test]
    fn model_creation() {
        let model = OpenAIChatModel::new(test_config());
        assert_eq!(model.name(), "openai");
        assert_eq!(model.model(), "gpt-3.5-turbo");
    }

    #[test]
    fn request_body_shape() {
        let model = OpenAIChatModel::new(test_config());
        let body = model.build_request_body("What color is the sky?");

        assert_eq!(body["model"], "gpt-3.5-turbo");
        assert_eq!(body["stream"], false);
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "What color is the sky?");
    }

    #[test]
    fn default_urls() {
        let model = OpenAIChatModel::new(test_config());
        assert_eq!(model.completions_url(), OPENAI_CHAT_API_URL);
        assert_eq!(model.models_url(), "https://api.openai.com/v1/models");
    }

    #[test]
    fn base_url_override_derives_models_url() {
        let config = ChatModelConfig {
            base_url: Some("https://gw.example.com/v1/chat/completions".to_string()),
            ..test_config()
        };
        let model = OpenAIChatModel::new(config);
        assert_eq!(
            model.completions_url(),
            "https://gw.example.com/v1/chat/completions"
        );
        assert_eq!(model.models_url(), "https://gw.example.com/v1/models");
    }

    #[test]
    fn parse_response_extracts_text_and_usage() {
        let model = OpenAIChatModel::new(test_config());
        let raw = r#"{
            "model": "gpt-3.5-turbo-0125",
            "choices": [
                {"message": {"role": "assistant", "content": "The sky is blue."}}
            ],
            "usage": {"prompt_tokens": 42, "completion_tokens": 6, "total_tokens": 48}
        }"#;
        let parsed: OpenAIChatResponse = serde_json::from_str(raw).unwrap();
        let response = model.parse_response(parsed).unwrap();

        assert_eq!(response.text, "The sky is blue.");
        assert_eq!(response.model, "gpt-3.5-turbo-0125");
        let usage = response.usage.unwrap();
        assert_eq!(usage.prompt_tokens, 42);
        assert_eq!(usage.completion_tokens, 6);
    }

    #[test]
    fn parse_response_without_choices_fails() {
        let model = OpenAIChatModel::new(test_config());
        let raw = r#"{"model": "gpt-3.5-turbo", "choices": []}"#;
        let parsed: OpenAIChatResponse = serde_json::from_str(raw).unwrap();
        let err = model.parse_response(parsed).unwrap_err();
        assert!(matches!(err, ChatError::ParseError { .. }));
    }

    #[test]
    fn parse_response_without_content_fails() {
        let model = OpenAIChatModel::new(test_config());
        let raw = r#"{
            "model": "gpt-3.5-turbo",
            "choices": [{"message": {"role": "assistant", "content": null}}]
        }"#;
        let parsed: OpenAIChatResponse = serde_json::from_str(raw).unwrap();
        let err = model.parse_response(parsed).unwrap_err();
        assert!(matches!(err, ChatError::ParseError { .. }));
    }

    #[tokio::test]
    async fn complete_without_api_key_fails() {
        let config = ChatModelConfig {
            api_key: None,
            ..ChatModelConfig::default()
        };
        let model = OpenAIChatModel::new(config);
        let err = model.complete("hello").await.unwrap_err();
        assert!(matches!(err, ChatError::AuthenticationFailed { .. }));
    }

    #[tokio::test]
    async fn health_check_without_api_key_fails() {
        let config = ChatModelConfig {
            api_key: None,
            ..ChatModelConfig::default()
        };
        let model = OpenAIChatModel::new(config);
        let err = model.health_check().await.unwrap_err();
        assert!(matches!(err, ChatError::AuthenticationFailed { .. }));
    }
}
