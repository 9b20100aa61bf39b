//! `AnthropicGenerator` - Claude API Backend
//!
//! Production backend, feature-gated:
//! ```toml
//! niwa = { version = "0.1", features = ["anthropic"] }
//! ```
//!
//! Reads nothing from the environment itself — the API key and model come
//! in through the constructor so misconfiguration surfaces at startup.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{GenerationError, GenerationRequest, Generator};
use crate::constants::{GENERATION_RESPONSE_BYTES_MAX, GENERATION_TOKENS_COUNT_DEFAULT};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MODEL_DEFAULT: &str = "claude-sonnet-4-20250514";

// =============================================================================
// API Types
// =============================================================================

#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    max_tokens: usize,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(rename = "type")]
    error_type: String,
    message: String,
}

// =============================================================================
// AnthropicGenerator
// =============================================================================

/// Anthropic Claude generation backend.
#[derive(Debug, Clone)]
pub struct AnthropicGenerator {
    client: reqwest::Client,
    api_key: String,
    model: String,
    api_url: String,
}

impl AnthropicGenerator {
    /// Create a backend with the given API key and the default model.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: MODEL_DEFAULT.to_string(),
            api_url: ANTHROPIC_API_URL.to_string(),
        }
    }

    /// Set the model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set a custom API URL (testing/proxies).
    #[must_use]
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    /// The model in use.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_body(&self, request: &GenerationRequest) -> ApiRequest {
        ApiRequest {
            model: self.model.clone(),
            max_tokens: request.max_tokens.unwrap_or(GENERATION_TOKENS_COUNT_DEFAULT),
            messages: vec![ApiMessage {
                role: "user".to_string(),
                content: request.prompt.clone(),
            }],
            system: request.system.clone(),
            temperature: request.temperature,
        }
    }

    fn parse_error(status: reqwest::StatusCode, body: &str) -> GenerationError {
        if let Ok(err) = serde_json::from_str::<ApiError>(body) {
            return match err.error.error_type.as_str() {
                "authentication_error" => GenerationError::AuthenticationFailed,
                "rate_limit_error" => GenerationError::RateLimit {
                    retry_after_secs: None,
                },
                "overloaded_error" => GenerationError::service_unavailable("API overloaded"),
                "invalid_request_error" => GenerationError::invalid_request(err.error.message),
                _ => GenerationError::invalid_response(err.error.message),
            };
        }

        match status {
            reqwest::StatusCode::UNAUTHORIZED => GenerationError::AuthenticationFailed,
            reqwest::StatusCode::TOO_MANY_REQUESTS => GenerationError::RateLimit {
                retry_after_secs: None,
            },
            reqwest::StatusCode::SERVICE_UNAVAILABLE | reqwest::StatusCode::BAD_GATEWAY => {
                GenerationError::service_unavailable("API unavailable")
            }
            reqwest::StatusCode::REQUEST_TIMEOUT | reqwest::StatusCode::GATEWAY_TIMEOUT => {
                GenerationError::Timeout
            }
            _ => GenerationError::invalid_response(format!("HTTP {status}: {body}")),
        }
    }
}

#[async_trait]
impl Generator for AnthropicGenerator {
    #[tracing::instrument(skip(self, request), fields(model = %self.model))]
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let body = self.build_body(request);

        let response = self
            .client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenerationError::Timeout
                } else {
                    GenerationError::network(e.to_string())
                }
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| GenerationError::network(e.to_string()))?;

        if !status.is_success() {
            return Err(Self::parse_error(status, &text));
        }

        let parsed: ApiResponse = serde_json::from_str(&text)
            .map_err(|e| GenerationError::invalid_response(e.to_string()))?;

        let completion = parsed
            .content
            .iter()
            .filter(|block| block.content_type == "text")
            .filter_map(|block| block.text.as_deref())
            .collect::<Vec<_>>()
            .join("");

        if completion.is_empty() {
            return Err(GenerationError::invalid_response("no text blocks in response"));
        }
        if completion.len() > GENERATION_RESPONSE_BYTES_MAX {
            return Err(GenerationError::invalid_response(format!(
                "response too large: {} bytes",
                completion.len()
            )));
        }

        Ok(completion)
    }

    fn name(&self) -> &'static str {
        "anthropic"
    }

    fn is_simulation(&self) -> bool {
        false
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_model() {
        let backend = AnthropicGenerator::new("key");
        assert_eq!(backend.model(), MODEL_DEFAULT);
    }

    #[test]
    fn test_with_model_overrides() {
        let backend = AnthropicGenerator::new("key").with_model("claude-opus-4-20250514");
        assert_eq!(backend.model(), "claude-opus-4-20250514");
    }

    #[test]
    fn test_build_body_carries_request_fields() {
        let backend = AnthropicGenerator::new("key");
        let request = GenerationRequest::new("rewrite the hero")
            .with_system("persona")
            .with_max_tokens(1234)
            .with_temperature(0.5);
        let body = backend.build_body(&request);

        assert_eq!(body.max_tokens, 1234);
        assert_eq!(body.system.as_deref(), Some("persona"));
        assert_eq!(body.messages.len(), 1);
        assert_eq!(body.messages[0].role, "user");
    }

    #[test]
    fn test_parse_error_maps_api_error_types() {
        let body = r#"{"error":{"type":"rate_limit_error","message":"slow down"}}"#;
        let err = AnthropicGenerator::parse_error(reqwest::StatusCode::TOO_MANY_REQUESTS, body);
        assert!(matches!(err, GenerationError::RateLimit { .. }));

        let body = r#"{"error":{"type":"authentication_error","message":"bad key"}}"#;
        let err = AnthropicGenerator::parse_error(reqwest::StatusCode::UNAUTHORIZED, body);
        assert!(matches!(err, GenerationError::AuthenticationFailed));
    }

    #[test]
    fn test_parse_error_falls_back_to_status() {
        let err = AnthropicGenerator::parse_error(
            reqwest::StatusCode::SERVICE_UNAVAILABLE,
            "not json",
        );
        assert!(matches!(err, GenerationError::ServiceUnavailable { .. }));
    }

    #[test]
    fn test_name_and_simulation_flag() {
        let backend = AnthropicGenerator::new("key");
        assert_eq!(backend.name(), "anthropic");
        assert!(!backend.is_simulation());
    }
}
