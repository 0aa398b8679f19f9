//! Escalation tiers and per-attempt audit records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::assessment::AssessmentResult;

/// Escalation level able to answer a clinical query
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Preferred remote reasoning backend
    Primary,
    /// Backup remote reasoning backend
    Secondary,
    /// Local rule engine, the availability floor
    Tertiary,
}

impl Tier {
    /// All tiers in escalation order
    pub const ALL: [Tier; 3] = [Tier::Primary, Tier::Secondary, Tier::Tertiary];

    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Primary => "primary",
            Tier::Secondary => "secondary",
            Tier::Tertiary => "tertiary",
        }
    }

    /// Next tier to escalate to
    pub fn next(&self) -> Option<Tier> {
        match self {
            Tier::Primary => Some(Tier::Secondary),
            Tier::Secondary => Some(Tier::Tertiary),
            Tier::Tertiary => None,
        }
    }

    /// Whether answering requires a remote call
    pub fn is_remote(&self) -> bool {
        !matches!(self, Tier::Tertiary)
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Categorized reason a tier did not answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "category", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    /// Connection, transport, or upstream service failure
    Network(String),
    /// Credential missing or rejected
    Auth(String),
    /// Call exceeded its time budget and was cancelled
    Timeout { after_ms: u64 },
    /// Provider answered but the answer could not be used
    MalformedResponse(String),
    /// Query was rejected before dispatch
    InvalidQuery(String),
    /// Tier skipped because its circuit breaker is open
    CircuitOpen,
    /// Tier skipped because no backend is configured for it
    NotConfigured,
}

impl FailureReason {
    /// Stable category name for logs and metrics
    pub fn category(&self) -> &'static str {
        match self {
            FailureReason::Network(_) => "network",
            FailureReason::Auth(_) => "auth",
            FailureReason::Timeout { .. } => "timeout",
            FailureReason::MalformedResponse(_) => "malformed_response",
            FailureReason::InvalidQuery(_) => "invalid_query",
            FailureReason::CircuitOpen => "circuit_open",
            FailureReason::NotConfigured => "not_configured",
        }
    }

    /// Whether the tier was actually called (as opposed to skipped)
    pub fn was_attempted(&self) -> bool {
        !matches!(self, FailureReason::CircuitOpen | FailureReason::NotConfigured)
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Network(detail)
            | FailureReason::Auth(detail)
            | FailureReason::MalformedResponse(detail)
            | FailureReason::InvalidQuery(detail) => write!(f, "{}: {}", self.category(), detail),
            FailureReason::Timeout { after_ms } => write!(f, "timeout after {}ms", after_ms),
            _ => f.write_str(self.category()),
        }
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

/// Outcome of one tier attempt. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierResult {
    tier: Tier,
    source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    raw_output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parsed_output: Option<AssessmentResult>,
    #[serde(rename = "latency_ms", with = "duration_ms")]
    latency: Duration,
    succeeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure_reason: Option<FailureReason>,
    started_at: DateTime<Utc>,
}

impl TierResult {
    /// Attempt that produced a valid assessment
    pub fn success(
        tier: Tier,
        source: impl Into<String>,
        raw_output: Option<String>,
        parsed: AssessmentResult,
        latency: Duration,
        started_at: DateTime<Utc>,
    ) -> Self {
        debug_assert_eq!(parsed.answering_tier, tier);
        Self {
            tier,
            source: source.into(),
            raw_output,
            parsed_output: Some(parsed),
            latency,
            succeeded: true,
            failure_reason: None,
            started_at,
        }
    }

    /// Attempt that ran and failed
    pub fn failure(
        tier: Tier,
        source: impl Into<String>,
        raw_output: Option<String>,
        reason: FailureReason,
        latency: Duration,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            tier,
            source: source.into(),
            raw_output,
            parsed_output: None,
            latency,
            succeeded: false,
            failure_reason: Some(reason),
            started_at,
        }
    }

    /// Tier passed over without a call
    pub fn skipped(tier: Tier, source: impl Into<String>, reason: FailureReason, at: DateTime<Utc>) -> Self {
        Self::failure(tier, source, None, reason, Duration::ZERO, at)
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    /// Backend that handled the attempt (provider/model or rule engine)
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn raw_output(&self) -> Option<&str> {
        self.raw_output.as_deref()
    }

    pub fn parsed_output(&self) -> Option<&AssessmentResult> {
        self.parsed_output.as_ref()
    }

    pub fn latency(&self) -> Duration {
        self.latency
    }

    pub fn succeeded(&self) -> bool {
        self.succeeded
    }

    pub fn failure_reason(&self) -> Option<&FailureReason> {
        self.failure_reason.as_ref()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Whether the tier was actually called
    pub fn was_attempted(&self) -> bool {
        self.failure_reason
            .as_ref()
            .map_or(true, FailureReason::was_attempted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escalation_order() {
        assert_eq!(Tier::Primary.next(), Some(Tier::Secondary));
        assert_eq!(Tier::Secondary.next(), Some(Tier::Tertiary));
        assert_eq!(Tier::Tertiary.next(), None);
        assert!(!Tier::Tertiary.is_remote());
    }

    #[test]
    fn test_skipped_result() {
        let result = TierResult::skipped(Tier::Primary, "gemini", FailureReason::CircuitOpen, Utc::now());
        assert!(!result.succeeded());
        assert!(!result.was_attempted());
        assert_eq!(result.latency(), Duration::ZERO);
        assert!(result.parsed_output().is_none());
    }

    #[test]
    fn test_failure_wire_format() {
        let result = TierResult::failure(
            Tier::Secondary,
            "huggingface",
            Some("{}".to_string()),
            FailureReason::Timeout { after_ms: 8000 },
            Duration::from_millis(8001),
            Utc::now(),
        );
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["tier"], "secondary");
        assert_eq!(json["latency_ms"], 8001);
        assert_eq!(json["failure_reason"]["category"], "timeout");
        assert_eq!(json["failure_reason"]["detail"]["after_ms"], 8000);
        assert!(json.get("parsed_output").is_none());
    }

    #[test]
    fn test_reason_display() {
        assert_eq!(
            FailureReason::Network("connection refused".into()).to_string(),
            "network: connection refused"
        );
        assert_eq!(FailureReason::CircuitOpen.to_string(), "circuit_open");
    }
}
