//! Failover Orchestrator Implementation

use chrono::Utc;
use clinical_protocol::{
    AssessmentResult, ClinicalQuery, FailureReason, QueryPayload, Tier, TierResult,
};
use health_probe::HealthProbe;
use model_adapter::ModelAdapter;
use response_validator::ResponseNormalizer;
use rule_engine::RuleEngine;
use serde::Serialize;
use std::sync::Arc;
use tokio::time::{timeout, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::{ConfigError, FailoverConfig};
use crate::EvaluationError;

/// Source label for rule engine attempts
pub const RULE_ENGINE_SOURCE: &str = "rule-engine";

/// Source label for a tier with no adapter
const UNCONFIGURED_SOURCE: &str = "unconfigured";

const NO_PROMPT: &str = "no recognizable content for a model prompt";

/// Answer plus the full attempt trail
#[derive(Debug, Clone, Serialize)]
pub struct Evaluation {
    pub query_id: Uuid,
    pub assessment: AssessmentResult,
    /// Every tier attempt in escalation order, the answering one last
    pub attempts: Vec<TierResult>,
}

impl Evaluation {
    /// Tier that produced the assessment
    pub fn answered_by(&self) -> Tier {
        self.assessment.answering_tier
    }
}

/// Escalation step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Try(Tier),
    Done,
}

/// Sequential primary, secondary, tertiary escalation.
///
/// Cloning is cheap; clones share the same health probe.
#[derive(Clone)]
pub struct FailoverOrchestrator {
    config: FailoverConfig,
    primary: Option<Arc<dyn ModelAdapter>>,
    secondary: Option<Arc<dyn ModelAdapter>>,
    rules: Arc<RuleEngine>,
    normalizer: Arc<ResponseNormalizer>,
    health: Arc<HealthProbe>,
}

impl FailoverOrchestrator {
    /// Create an orchestrator with only the rule engine configured
    pub fn new(config: FailoverConfig, rules: RuleEngine) -> Self {
        info!("Creating failover orchestrator with config: {:?}", config);
        let health = Arc::new(HealthProbe::new(config.breaker()));
        Self {
            config,
            primary: None,
            secondary: None,
            rules: Arc::new(rules),
            normalizer: Arc::new(ResponseNormalizer::default()),
            health,
        }
    }

    /// Install the primary adapter; it must report `Tier::Primary`
    pub fn with_primary(mut self, adapter: Arc<dyn ModelAdapter>) -> Result<Self, ConfigError> {
        check_slot(Tier::Primary, adapter.as_ref())?;
        info!(source = adapter.source(), "Primary tier configured");
        self.primary = Some(adapter);
        Ok(self)
    }

    /// Install the secondary adapter; it must report `Tier::Secondary`
    pub fn with_secondary(mut self, adapter: Arc<dyn ModelAdapter>) -> Result<Self, ConfigError> {
        check_slot(Tier::Secondary, adapter.as_ref())?;
        info!(source = adapter.source(), "Secondary tier configured");
        self.secondary = Some(adapter);
        Ok(self)
    }

    pub fn with_normalizer(mut self, normalizer: ResponseNormalizer) -> Self {
        self.normalizer = Arc::new(normalizer);
        self
    }

    /// Share an existing health probe
    pub fn with_health_probe(mut self, health: Arc<HealthProbe>) -> Self {
        self.health = health;
        self
    }

    pub fn config(&self) -> &FailoverConfig {
        &self.config
    }

    pub fn health_probe(&self) -> &Arc<HealthProbe> {
        &self.health
    }

    /// Whether a remote adapter is configured for `tier`
    pub fn is_configured(&self, tier: Tier) -> bool {
        match tier {
            Tier::Tertiary => true,
            _ => self.adapter(tier).is_some(),
        }
    }

    /// Validate a payload, then run the full escalation
    pub async fn evaluate_payload(
        &self,
        subject_id: &str,
        payload: QueryPayload,
        entry: Tier,
    ) -> Result<Evaluation, EvaluationError> {
        let query = ClinicalQuery::new(subject_id, payload)?;
        self.evaluate_from(&query, entry).await
    }

    /// Full escalation starting at the primary tier
    pub async fn evaluate(&self, query: &ClinicalQuery) -> Result<Evaluation, EvaluationError> {
        self.evaluate_from(query, Tier::Primary).await
    }

    /// Escalation starting at `entry`; tiers above it are not consulted
    pub async fn evaluate_from(
        &self,
        query: &ClinicalQuery,
        entry: Tier,
    ) -> Result<Evaluation, EvaluationError> {
        let mut attempts = Vec::with_capacity(3);
        let mut step = Step::Try(entry);

        while let Step::Try(tier) = step {
            let result = match tier {
                Tier::Tertiary => self.try_tertiary(query),
                _ => self.try_remote(tier, query).await,
            };
            record_attempt_metrics(&result);

            step = if result.succeeded() {
                Step::Done
            } else {
                match tier.next() {
                    Some(next) => {
                        warn!(
                            query_id = %query.id(),
                            from = %tier,
                            to = %next,
                            reason = %result.failure_reason().map_or_else(String::new, |r| r.to_string()),
                            "Escalating"
                        );
                        Step::Try(next)
                    }
                    None => Step::Done,
                }
            };
            attempts.push(result);
        }

        let assessment = attempts
            .last()
            .filter(|r| r.succeeded())
            .and_then(|r| r.parsed_output())
            .cloned();

        match assessment {
            Some(assessment) => {
                let tier = assessment.answering_tier;
                metrics::counter!("failover_answers_total", "tier" => tier.as_str()).increment(1);
                info!(
                    query_id = %query.id(),
                    kind = query.kind().as_str(),
                    tier = %tier,
                    attempts = attempts.len(),
                    level = %assessment.level,
                    "Evaluation complete"
                );
                Ok(Evaluation {
                    query_id: query.id(),
                    assessment,
                    attempts,
                })
            }
            None => {
                error!(
                    query_id = %query.id(),
                    attempts = attempts.len(),
                    "All tiers exhausted"
                );
                Err(EvaluationError::AllTiersExhausted { attempts })
            }
        }
    }

    fn adapter(&self, tier: Tier) -> Option<&Arc<dyn ModelAdapter>> {
        match tier {
            Tier::Primary => self.primary.as_ref(),
            Tier::Secondary => self.secondary.as_ref(),
            Tier::Tertiary => None,
        }
    }

    async fn try_remote(&self, tier: Tier, query: &ClinicalQuery) -> TierResult {
        let Some(adapter) = self.adapter(tier) else {
            debug!(tier = %tier, "Tier not configured, skipping");
            return TierResult::skipped(tier, UNCONFIGURED_SOURCE, FailureReason::NotConfigured, Utc::now());
        };

        // Must precede the eligibility check, which may claim the half-open probe
        if !adapter.accepts(query) {
            debug!(tier = %tier, "No prompt for query, skipping");
            return TierResult::skipped(
                tier,
                adapter.source(),
                FailureReason::InvalidQuery(NO_PROMPT.to_string()),
                Utc::now(),
            );
        }

        if !self.health.is_eligible(tier) {
            debug!(tier = %tier, "Breaker open, skipping");
            return TierResult::skipped(tier, adapter.source(), FailureReason::CircuitOpen, Utc::now());
        }

        let started_at = Utc::now();
        let start = Instant::now();
        let budget = self.config.call_timeout();
        let result = match timeout(budget, adapter.invoke(query, &self.normalizer)).await {
            Ok(result) => result,
            Err(_) => TierResult::failure(
                tier,
                adapter.source(),
                None,
                FailureReason::Timeout {
                    after_ms: budget.as_millis() as u64,
                },
                start.elapsed(),
                started_at,
            ),
        };

        // A query the model could not be asked about says nothing of provider health
        if !matches!(result.failure_reason(), Some(FailureReason::InvalidQuery(_))) {
            self.health.record(tier, result.succeeded(), Utc::now());
        }
        result
    }

    fn try_tertiary(&self, query: &ClinicalQuery) -> TierResult {
        let started_at = Utc::now();
        let start = Instant::now();
        let rule = self.rules.evaluate(query);

        match self.normalizer.from_rule(&rule) {
            Ok(assessment) => TierResult::success(
                Tier::Tertiary,
                RULE_ENGINE_SOURCE,
                Some(rule.rule_id),
                assessment,
                start.elapsed(),
                started_at,
            ),
            Err(e) => {
                error!(rule_id = %rule.rule_id, error = %e, "Rule engine produced an invalid answer");
                TierResult::failure(
                    Tier::Tertiary,
                    RULE_ENGINE_SOURCE,
                    Some(rule.rule_id),
                    FailureReason::MalformedResponse(e.to_string()),
                    start.elapsed(),
                    started_at,
                )
            }
        }
    }
}

fn check_slot(slot: Tier, adapter: &dyn ModelAdapter) -> Result<(), ConfigError> {
    match adapter.tier() {
        tier if tier == slot => Ok(()),
        tier => Err(ConfigError::TierMismatch { slot, adapter: tier }),
    }
}

fn record_attempt_metrics(result: &TierResult) {
    let tier = result.tier().as_str();
    let outcome = match result.failure_reason() {
        None => "success",
        Some(reason) => reason.category(),
    };
    metrics::counter!("failover_attempts_total", "tier" => tier, "outcome" => outcome).increment(1);
    if result.was_attempted() {
        metrics::histogram!("failover_tier_latency_seconds", "tier" => tier)
            .record(result.latency().as_secs_f64());
    }
}
