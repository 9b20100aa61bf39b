//! Generation Capability - Injected Text Backend
//!
//! `TigerStyle`: Simulation-first. The pipeline only ever sees the
//! [`Generator`] trait; whether one call or many, sim or production, is a
//! configuration choice, never a structural one.
//!
//! ```text
//! Generator (trait)
//! ├── SimGenerator        (always available, deterministic, fault-injectable)
//! └── AnthropicGenerator  (feature: anthropic)
//! ```
//!
//! Every generation failure is recoverable at the cycle level: the
//! orchestrator skips the affected section and continues.

mod prompts;
mod sim;

#[cfg(feature = "anthropic")]
mod anthropic;

pub use prompts::{build_request, PromptContext};
pub use sim::SimGenerator;

#[cfg(feature = "anthropic")]
pub use anthropic::AnthropicGenerator;

use async_trait::async_trait;

use crate::constants::GENERATION_PROMPT_BYTES_MAX;

// =============================================================================
// Error Types
// =============================================================================

/// Unified error type for generation backends.
///
/// Always per-section-recoverable: the orchestrator logs, skips the
/// section, and carries on.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GenerationError {
    /// Request timed out.
    #[error("generation timed out")]
    Timeout,

    /// Rate limit exceeded.
    #[error("rate limit exceeded, retry after {retry_after_secs:?}s")]
    RateLimit {
        /// Seconds until the limit resets, if known.
        retry_after_secs: Option<u64>,
    },

    /// Authentication failed.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// Network error.
    #[error("network error: {message}")]
    Network {
        /// Description of the failure.
        message: String,
    },

    /// Backend returned something unusable.
    #[error("invalid response: {message}")]
    InvalidResponse {
        /// What was wrong with it.
        message: String,
    },

    /// Backend temporarily unavailable.
    #[error("service unavailable: {message}")]
    ServiceUnavailable {
        /// Reason for unavailability.
        message: String,
    },

    /// The request itself was malformed.
    #[error("invalid request: {message}")]
    InvalidRequest {
        /// What was wrong with it.
        message: String,
    },
}

impl GenerationError {
    /// Create a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create an invalid-response error.
    #[must_use]
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }

    /// Create a service-unavailable error.
    #[must_use]
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable {
            message: message.into(),
        }
    }

    /// Create an invalid-request error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Whether retrying the same request could succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::RateLimit { .. } | Self::ServiceUnavailable { .. }
        )
    }
}

// =============================================================================
// Request Types
// =============================================================================

/// A prompt for the generation backend.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// The user-turn prompt text.
    pub prompt: String,
    /// Optional system message (persona and ground rules).
    pub system: Option<String>,
    /// Maximum tokens to generate (backend default if `None`).
    pub max_tokens: Option<usize>,
    /// Sampling temperature (backend default if `None`).
    pub temperature: Option<f32>,
}

impl GenerationRequest {
    /// Create a request with just a prompt.
    ///
    /// # Panics
    /// Panics if the prompt is empty or exceeds
    /// `GENERATION_PROMPT_BYTES_MAX`.
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        let prompt = prompt.into();

        // Preconditions
        assert!(!prompt.is_empty(), "prompt must not be empty");
        assert!(
            prompt.len() <= GENERATION_PROMPT_BYTES_MAX,
            "prompt exceeds {GENERATION_PROMPT_BYTES_MAX} bytes"
        );

        Self {
            prompt,
            system: None,
            max_tokens: None,
            temperature: None,
        }
    }

    /// Set the system message.
    #[must_use]
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Set the token ceiling.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the sampling temperature.
    ///
    /// # Panics
    /// Panics if temperature is not in `[0.0, 1.0]`.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        assert!(
            (0.0..=1.0).contains(&temperature),
            "temperature must be in [0.0, 1.0]"
        );
        self.temperature = Some(temperature);
        self
    }
}

// =============================================================================
// Generator Trait
// =============================================================================

/// A prompt-in/text-out generation capability.
///
/// Object-safe so the pipeline can hold `Arc<dyn Generator>` when needed;
/// implementations must be thread-safe.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generate replacement text for a prompt.
    ///
    /// # Errors
    /// [`GenerationError`] on failure; the caller treats every failure as
    /// a per-section skip.
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError>;

    /// Backend name for logging.
    fn name(&self) -> &'static str;

    /// Whether this is a simulation backend.
    fn is_simulation(&self) -> bool;
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let request = GenerationRequest::new("Refresh the hero section.");
        assert_eq!(request.prompt, "Refresh the hero section.");
        assert!(request.system.is_none());
        assert!(request.max_tokens.is_none());
        assert!(request.temperature.is_none());
    }

    #[test]
    fn test_request_builder() {
        let request = GenerationRequest::new("p")
            .with_system("persona")
            .with_max_tokens(4000)
            .with_temperature(0.7);
        assert_eq!(request.system.as_deref(), Some("persona"));
        assert_eq!(request.max_tokens, Some(4000));
        assert_eq!(request.temperature, Some(0.7));
    }

    #[test]
    #[should_panic(expected = "prompt must not be empty")]
    fn test_empty_prompt_panics() {
        let _ = GenerationRequest::new("");
    }

    #[test]
    #[should_panic(expected = "temperature must be in")]
    fn test_invalid_temperature_panics() {
        let _ = GenerationRequest::new("p").with_temperature(1.5);
    }

    #[test]
    fn test_error_retryability() {
        assert!(GenerationError::Timeout.is_retryable());
        assert!(GenerationError::RateLimit {
            retry_after_secs: Some(60)
        }
        .is_retryable());
        assert!(GenerationError::service_unavailable("down").is_retryable());
        assert!(!GenerationError::AuthenticationFailed.is_retryable());
        assert!(!GenerationError::invalid_response("garbled").is_retryable());
    }
}
