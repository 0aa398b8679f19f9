//! Google Gemini primary adapter

use async_trait::async_trait;
use clinical_protocol::Tier;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::adapter::{ModelAdapter, ProviderReply};
use crate::prompt::Prompt;
use crate::{AdapterError, ProviderConfig};

pub(crate) const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub(crate) const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Primary tier backed by the Gemini `generateContent` API
#[derive(Debug, Clone)]
pub struct PrimaryModelAdapter {
    config: ProviderConfig,
    api_key: String,
    source: String,
    client: Client,
}

impl PrimaryModelAdapter {
    /// Create an adapter with the given credential
    pub fn new(config: ProviderConfig, api_key: impl Into<String>) -> Self {
        info!("Creating primary adapter: gemini/{}", config.model);
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .unwrap_or_default();
        Self {
            source: format!("gemini/{}", config.model),
            api_key: api_key.into(),
            config,
            client,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    system_instruction: Content<'a>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    response_mime_type: &'static str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

#[async_trait]
impl ModelAdapter for PrimaryModelAdapter {
    fn tier(&self) -> Tier {
        Tier::Primary
    }

    fn source(&self) -> &str {
        &self.source
    }

    async fn complete(&self, prompt: &Prompt) -> Result<ProviderReply, AdapterError> {
        if self.api_key.trim().is_empty() {
            return Err(AdapterError::Auth("Gemini API key is empty".to_string()));
        }

        let url = format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        );
        let body = GenerateRequest {
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part { text: &prompt.user }],
            }],
            system_instruction: Content {
                role: None,
                parts: vec![Part {
                    text: &prompt.system,
                }],
            },
            generation_config: GenerationConfig {
                temperature: self.config.temperature,
                max_output_tokens: self.config.max_tokens,
                response_mime_type: "application/json",
            },
        };

        debug!(model = %self.config.model, prompt_len = prompt.user.len(), "Calling Gemini");
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AdapterError::from_transport(&e, self.config.request_timeout_ms))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AdapterError::from_status(status, &text));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| AdapterError::MalformedResponse(e.to_string()))?;
        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(AdapterError::MalformedResponse(
                "no candidate text in Gemini response".to_string(),
            ));
        }
        Ok(ProviderReply { text })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clinical_protocol::ClinicalQuery;
    use mockito::Matcher;
    use response_validator::ResponseNormalizer;

    const PATH: &str = "/models/gemini-2.0-flash:generateContent";

    fn adapter(base_url: String, key: &str) -> PrimaryModelAdapter {
        PrimaryModelAdapter::new(
            ProviderConfig {
                base_url,
                ..ProviderConfig::gemini()
            },
            key,
        )
    }

    fn prompt() -> Prompt {
        Prompt::for_query(&ClinicalQuery::risk_check("p", "warfarin + aspirin").unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_complete_joins_parts() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", PATH)
            .match_header("x-goog-api-key", "test-key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"candidates":[{"content":{"parts":[{"text":"{\"level\":"},{"text":"\"high\"}"}]}}]}"#,
            )
            .create_async()
            .await;

        let reply = adapter(server.url(), "test-key").complete(&prompt()).await.unwrap();
        assert_eq!(reply.text, r#"{"level":"high"}"#);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_rejected_key_is_auth() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", PATH)
            .with_status(403)
            .with_body(r#"{"error":{"status":"PERMISSION_DENIED"}}"#)
            .create_async()
            .await;

        let err = adapter(server.url(), "bad").complete(&prompt()).await.unwrap_err();
        assert!(matches!(err, AdapterError::Auth(_)));
    }

    #[tokio::test]
    async fn test_server_error_is_network() {
        let mut server = mockito::Server::new_async().await;
        server.mock("POST", PATH).with_status(503).create_async().await;

        let err = adapter(server.url(), "k").complete(&prompt()).await.unwrap_err();
        assert!(matches!(err, AdapterError::Network(_)));
    }

    #[tokio::test]
    async fn test_empty_candidates_is_malformed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", PATH)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"candidates":[]}"#)
            .create_async()
            .await;

        let err = adapter(server.url(), "k").complete(&prompt()).await.unwrap_err();
        assert!(matches!(err, AdapterError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_empty_key_makes_no_call() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let query = ClinicalQuery::triage("p", "headache").unwrap();
        let result = adapter(server.url(), "  ")
            .invoke(&query, &ResponseNormalizer::default())
            .await;
        assert_eq!(result.failure_reason().unwrap().category(), "auth");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_invoke_end_to_end() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", PATH)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"candidates":[{"content":{"parts":[{"text":"{\"level\":\"high\",\"rationale\":\"Warfarin with aspirin raises bleeding risk.\",\"flags\":[\"contraindication\"],\"confidence\":0.85}"}]}}]}"#,
            )
            .create_async()
            .await;

        let query = ClinicalQuery::risk_check("p", "warfarin + aspirin").unwrap();
        let result = adapter(server.url(), "k")
            .invoke(&query, &ResponseNormalizer::default())
            .await;
        assert!(result.succeeded());
        assert_eq!(result.source(), "gemini/gemini-2.0-flash");
        let assessment = result.parsed_output().unwrap();
        assert_eq!(assessment.answering_tier, Tier::Primary);
        assert!(assessment.has_flag(clinical_protocol::Flag::Contraindication));
    }
}
