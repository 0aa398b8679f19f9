//! Adapter trait

use async_trait::async_trait;
use chrono::Utc;
use clinical_protocol::{ClinicalQuery, FailureReason, Tier, TierResult};
use response_validator::ResponseNormalizer;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::prompt::Prompt;
use crate::AdapterError;

/// Text returned by a provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderReply {
    pub text: String,
}

/// One remote reasoning backend
#[async_trait]
pub trait ModelAdapter: Send + Sync {
    /// Tier this adapter serves
    fn tier(&self) -> Tier;

    /// Provider and model label recorded as the attempt source
    fn source(&self) -> &str;

    /// Whether a prompt can be built for `query`
    fn accepts(&self, query: &ClinicalQuery) -> bool {
        Prompt::for_query(query).is_some()
    }

    /// Send a prompt and return the raw model text
    async fn complete(&self, prompt: &Prompt) -> Result<ProviderReply, AdapterError>;

    /// Run one attempt for `query`. Never fails: every problem is folded into
    /// an unsuccessful `TierResult`.
    async fn invoke(&self, query: &ClinicalQuery, normalizer: &ResponseNormalizer) -> TierResult {
        let tier = self.tier();
        let started_at = Utc::now();
        let start = Instant::now();

        let Some(prompt) = Prompt::for_query(query) else {
            return TierResult::failure(
                tier,
                self.source(),
                None,
                FailureReason::InvalidQuery("no recognizable content for a model prompt".to_string()),
                start.elapsed(),
                started_at,
            );
        };

        let reply = match self.complete(&prompt).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(tier = %tier, source = self.source(), error = %e, "Provider call failed");
                return TierResult::failure(
                    tier,
                    self.source(),
                    None,
                    e.into_reason(),
                    start.elapsed(),
                    started_at,
                );
            }
        };

        match normalizer.normalize(query, tier, &reply.text) {
            Ok(assessment) => {
                debug!(
                    tier = %tier,
                    source = self.source(),
                    latency_ms = start.elapsed().as_millis() as u64,
                    "Provider answered"
                );
                TierResult::success(
                    tier,
                    self.source(),
                    Some(reply.text),
                    assessment,
                    start.elapsed(),
                    started_at,
                )
            }
            Err(e) => {
                warn!(tier = %tier, source = self.source(), error = %e, "Provider answer rejected");
                TierResult::failure(
                    tier,
                    self.source(),
                    Some(reply.text),
                    FailureReason::MalformedResponse(e.to_string()),
                    start.elapsed(),
                    started_at,
                )
            }
        }
    }
}
