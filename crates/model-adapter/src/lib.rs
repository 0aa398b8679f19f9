//! Remote Model Adapters
//!
//! A `ModelAdapter` hides one reasoning provider behind a uniform contract:
//! a clinical query goes in, an immutable `TierResult` comes out. Provider
//! failures never cross the boundary as errors; they are folded into the
//! result with a categorized `FailureReason`.

mod adapter;
mod gemini;
mod huggingface;
mod prompt;

pub use adapter::{ModelAdapter, ProviderReply};
pub use gemini::PrimaryModelAdapter;
pub use huggingface::SecondaryModelAdapter;
pub use prompt::Prompt;

use clinical_protocol::FailureReason;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from a provider call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdapterError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Authentication failed: {0}")]
    Auth(String),
    #[error("Provider call timed out after {0}ms")]
    Timeout(u64),
    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),
}

impl AdapterError {
    /// Map an HTTP error status to an adapter error
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let detail = format!("HTTP {}: {}", status.as_u16(), truncate(body, 200));
        match status.as_u16() {
            401 | 403 => AdapterError::Auth(detail),
            408 => AdapterError::Timeout(0),
            _ => AdapterError::Network(detail),
        }
    }

    /// Map a transport error
    pub fn from_transport(err: &reqwest::Error, budget_ms: u64) -> Self {
        if err.is_timeout() {
            AdapterError::Timeout(budget_ms)
        } else if err.is_decode() {
            AdapterError::MalformedResponse(err.to_string())
        } else {
            AdapterError::Network(err.to_string())
        }
    }

    /// Failure category recorded in the tier result
    pub fn into_reason(self) -> FailureReason {
        match self {
            AdapterError::Network(detail) => FailureReason::Network(detail),
            AdapterError::Auth(detail) => FailureReason::Auth(detail),
            AdapterError::Timeout(after_ms) => FailureReason::Timeout { after_ms },
            AdapterError::MalformedResponse(detail) => FailureReason::MalformedResponse(detail),
        }
    }
}

/// Connection settings for one provider
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Build this tier at all
    pub enabled: bool,
    /// Provider model id
    pub model: String,
    /// API base URL
    pub base_url: String,
    /// Environment variable holding the credential
    pub api_key_env: String,
    /// Completion token cap
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
    /// Client-side request timeout (ms), a backstop behind the orchestrator's
    pub request_timeout_ms: u64,
}

impl ProviderConfig {
    /// Defaults for the Gemini primary tier
    pub fn gemini() -> Self {
        Self {
            enabled: true,
            model: gemini::DEFAULT_MODEL.to_string(),
            base_url: gemini::DEFAULT_BASE_URL.to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            max_tokens: 512,
            temperature: 0.2,
            request_timeout_ms: 10_000,
        }
    }

    /// Defaults for the Hugging Face secondary tier
    pub fn huggingface() -> Self {
        Self {
            enabled: true,
            model: huggingface::DEFAULT_MODEL.to_string(),
            base_url: huggingface::DEFAULT_BASE_URL.to_string(),
            api_key_env: "HF_TOKEN".to_string(),
            max_tokens: 300,
            temperature: 0.2,
            request_timeout_ms: 10_000,
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self::gemini()
    }
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => &text[..cut],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            AdapterError::from_status(StatusCode::UNAUTHORIZED, ""),
            AdapterError::Auth(_)
        ));
        assert!(matches!(
            AdapterError::from_status(StatusCode::FORBIDDEN, ""),
            AdapterError::Auth(_)
        ));
        assert!(matches!(
            AdapterError::from_status(StatusCode::REQUEST_TIMEOUT, ""),
            AdapterError::Timeout(_)
        ));
        assert!(matches!(
            AdapterError::from_status(StatusCode::TOO_MANY_REQUESTS, "quota"),
            AdapterError::Network(_)
        ));
        assert!(matches!(
            AdapterError::from_status(StatusCode::BAD_GATEWAY, ""),
            AdapterError::Network(_)
        ));
        assert!(matches!(
            AdapterError::from_status(StatusCode::BAD_REQUEST, ""),
            AdapterError::Network(_)
        ));
    }

    #[test]
    fn test_reason_mapping() {
        assert_eq!(
            AdapterError::Timeout(8000).into_reason(),
            FailureReason::Timeout { after_ms: 8000 }
        );
        assert_eq!(
            AdapterError::Auth("bad key".into()).into_reason().category(),
            "auth"
        );
    }

    #[test]
    fn test_error_body_truncated() {
        let body = "x".repeat(1000);
        let err = AdapterError::from_status(StatusCode::INTERNAL_SERVER_ERROR, &body);
        assert!(err.to_string().len() < 300);
    }
}
