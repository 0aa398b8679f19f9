//! Hugging Face chat completion secondary adapter

use async_trait::async_trait;
use clinical_protocol::Tier;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::adapter::{ModelAdapter, ProviderReply};
use crate::prompt::Prompt;
use crate::{AdapterError, ProviderConfig};

pub(crate) const DEFAULT_MODEL: &str = "meta-llama/Llama-3.1-8B-Instruct";
pub(crate) const DEFAULT_BASE_URL: &str = "https://router.huggingface.co/v1";

/// Secondary tier backed by an OpenAI-compatible chat completion endpoint
#[derive(Debug, Clone)]
pub struct SecondaryModelAdapter {
    config: ProviderConfig,
    token: String,
    source: String,
    client: Client,
}

impl SecondaryModelAdapter {
    /// Create an adapter with the given access token
    pub fn new(config: ProviderConfig, token: impl Into<String>) -> Self {
        info!("Creating secondary adapter: huggingface/{}", config.model);
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .unwrap_or_default();
        Self {
            source: format!("huggingface/{}", config.model),
            token: token.into(),
            config,
            client,
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [Message<'a>; 2],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl ModelAdapter for SecondaryModelAdapter {
    fn tier(&self) -> Tier {
        Tier::Secondary
    }

    fn source(&self) -> &str {
        &self.source
    }

    async fn complete(&self, prompt: &Prompt) -> Result<ProviderReply, AdapterError> {
        if self.token.trim().is_empty() {
            return Err(AdapterError::Auth("Hugging Face token is empty".to_string()));
        }

        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let body = ChatRequest {
            model: &self.config.model,
            messages: [
                Message {
                    role: "system",
                    content: &prompt.system,
                },
                Message {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        debug!(model = %self.config.model, prompt_len = prompt.user.len(), "Calling Hugging Face");
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| AdapterError::from_transport(&e, self.config.request_timeout_ms))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AdapterError::from_status(status, &text));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| AdapterError::MalformedResponse(e.to_string()))?;
        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(AdapterError::MalformedResponse(
                "no message content in chat completion".to_string(),
            ));
        }
        Ok(ProviderReply { text })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clinical_protocol::{ClinicalQuery, Level};
    use mockito::Matcher;
    use response_validator::ResponseNormalizer;

    fn adapter(base_url: String, token: &str) -> SecondaryModelAdapter {
        SecondaryModelAdapter::new(
            ProviderConfig {
                base_url,
                ..ProviderConfig::huggingface()
            },
            token,
        )
    }

    fn prompt() -> Prompt {
        Prompt::for_query(&ClinicalQuery::triage("p", "twisted ankle").unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_complete_sends_bounded_request() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer hf-token")
            .match_body(Matcher::PartialJsonString(
                r#"{"model":"meta-llama/Llama-3.1-8B-Instruct","max_tokens":300}"#.to_string(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[{"message":{"role":"assistant","content":"{\"level\":\"low\"}"}}]}"#)
            .create_async()
            .await;

        let reply = adapter(server.url(), "hf-token").complete(&prompt()).await.unwrap();
        assert_eq!(reply.text, r#"{"level":"low"}"#);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_unauthorized_is_auth() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(401)
            .with_body(r#"{"error":"Invalid credentials"}"#)
            .create_async()
            .await;

        let err = adapter(server.url(), "bad").complete(&prompt()).await.unwrap_err();
        assert!(matches!(err, AdapterError::Auth(_)));
    }

    #[tokio::test]
    async fn test_rate_limited_is_network() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(429)
            .create_async()
            .await;

        let err = adapter(server.url(), "t").complete(&prompt()).await.unwrap_err();
        assert!(matches!(err, AdapterError::Network(_)));
    }

    #[tokio::test]
    async fn test_garbage_envelope_is_malformed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("<html>gateway</html>")
            .create_async()
            .await;

        let err = adapter(server.url(), "t").complete(&prompt()).await.unwrap_err();
        assert!(matches!(err, AdapterError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network() {
        let err = adapter("http://127.0.0.1:9".to_string(), "t")
            .complete(&prompt())
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::Network(_)));
    }

    #[tokio::test]
    async fn test_invoke_end_to_end() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"choices":[{"message":{"content":"```json\n{\"level\":\"moderate\",\"rationale\":\"Possible sprain; check for fracture because of swelling.\",\"department\":\"Orthopedic\"}\n```"}}]}"#,
            )
            .create_async()
            .await;

        let query = ClinicalQuery::triage("p", "twisted ankle").unwrap();
        let result = adapter(server.url(), "t")
            .invoke(&query, &ResponseNormalizer::default())
            .await;
        assert!(result.succeeded());
        let assessment = result.parsed_output().unwrap();
        assert_eq!(assessment.level, Level::Moderate);
        assert_eq!(assessment.answering_tier, Tier::Secondary);
        assert_eq!(
            assessment.department,
            Some(clinical_protocol::Department::Orthopedic)
        );
    }
}
