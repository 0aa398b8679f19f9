//! Tier output normalization

use chrono::Utc;
use clinical_protocol::{
    AssessmentResult, ClinicalQuery, Confidence, Department, Flag, Level, QueryPayload, Tier,
};
use rule_engine::{route_department, RuleMatch};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use tracing::debug;

use crate::confidence::{confidence_from_reported, heuristic_confidence};
use crate::error::ValidationError;
use crate::extract::extract_json_object;

/// Normalizer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Rationales longer than this are truncated
    pub max_rationale_chars: usize,
    /// Raise `ClinicianReview` on Low-confidence answers
    pub review_low_confidence: bool,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            max_rationale_chars: 2000,
            review_low_confidence: true,
        }
    }
}

/// Coerces tier output into `AssessmentResult`
#[derive(Debug, Clone, Default)]
pub struct ResponseNormalizer {
    config: NormalizerConfig,
}

impl ResponseNormalizer {
    /// Create a new normalizer with given config
    pub fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    /// Normalize model text produced by `tier` for `query`.
    ///
    /// Medicine explanations may come back as plain prose; any other kind must
    /// carry a JSON object with `level` and `rationale`.
    pub fn normalize(
        &self,
        query: &ClinicalQuery,
        tier: Tier,
        raw: &str,
    ) -> Result<AssessmentResult, ValidationError> {
        let object = match extract_json_object(raw) {
            Ok(object) => object,
            Err(ValidationError::NoJsonObject)
                if matches!(query.payload(), QueryPayload::MedicineInfo { .. }) =>
            {
                return self.plain_explanation(tier, raw);
            }
            Err(e) => return Err(e),
        };

        let level = match object.get("level") {
            None | Some(Value::Null) => return Err(ValidationError::MissingField("level")),
            Some(Value::String(s)) if s.trim().is_empty() => {
                return Err(ValidationError::EmptyField("level"))
            }
            Some(Value::String(s)) => {
                parse_level(s).ok_or_else(|| ValidationError::UnknownLevel(s.clone()))?
            }
            Some(other) => return Err(ValidationError::UnknownLevel(other.to_string())),
        };

        let rationale = match object.get("rationale") {
            None | Some(Value::Null) => return Err(ValidationError::MissingField("rationale")),
            Some(Value::String(s)) => s.trim(),
            Some(_) => return Err(ValidationError::EmptyField("rationale")),
        };
        if rationale.is_empty() {
            return Err(ValidationError::EmptyField("rationale"));
        }
        let rationale = self.bounded(rationale);

        let confidence = object
            .get("confidence")
            .and_then(confidence_from_reported)
            .unwrap_or_else(|| heuristic_confidence(&rationale));

        let department = match query.payload() {
            QueryPayload::Triage { symptoms, .. } => Some(
                object
                    .get("department")
                    .and_then(Value::as_str)
                    .and_then(parse_department)
                    .unwrap_or_else(|| route_department(symptoms)),
            ),
            _ => None,
        };

        let flags = parse_flags(&object);
        debug!(
            tier = %tier,
            level = %level,
            confidence = confidence.as_str(),
            flags = flags.len(),
            "Normalized model response"
        );
        Ok(self.finish(level, rationale, flags, tier, confidence, department))
    }

    /// Convert a rule-engine match into the shared schema
    pub fn from_rule(&self, rule: &RuleMatch) -> Result<AssessmentResult, ValidationError> {
        let rationale = rule.rationale.trim();
        if rationale.is_empty() {
            return Err(ValidationError::EmptyField("rationale"));
        }
        let confidence = if rule.high_confidence {
            Confidence::High
        } else {
            Confidence::Low
        };
        Ok(self.finish(
            rule.level,
            self.bounded(rationale),
            rule.flags.clone(),
            Tier::Tertiary,
            confidence,
            rule.department,
        ))
    }

    fn plain_explanation(&self, tier: Tier, raw: &str) -> Result<AssessmentResult, ValidationError> {
        let text = raw.trim().trim_matches('`').trim();
        if text.is_empty() {
            return Err(ValidationError::EmptyField("rationale"));
        }
        let rationale = self.bounded(text);
        let confidence = heuristic_confidence(&rationale);
        Ok(self.finish(Level::Minimal, rationale, BTreeSet::new(), tier, confidence, None))
    }

    fn finish(
        &self,
        level: Level,
        rationale: String,
        mut flags: BTreeSet<Flag>,
        tier: Tier,
        confidence: Confidence,
        department: Option<Department>,
    ) -> AssessmentResult {
        if self.config.review_low_confidence && confidence == Confidence::Low {
            flags.insert(Flag::ClinicianReview);
        }
        AssessmentResult {
            level,
            rationale,
            flags,
            answering_tier: tier,
            confidence,
            department,
            generated_at: Utc::now(),
        }
    }

    fn bounded(&self, text: &str) -> String {
        let max = self.config.max_rationale_chars;
        match text.char_indices().nth(max) {
            Some((cut, _)) => text[..cut].to_string(),
            None => text.to_string(),
        }
    }
}

fn parse_level(label: &str) -> Option<Level> {
    match label.trim().to_lowercase().as_str() {
        "critical" | "emergency" | "immediate" => Some(Level::Critical),
        "high" | "urgent" | "severe" => Some(Level::High),
        "moderate" | "medium" => Some(Level::Moderate),
        "low" | "mild" => Some(Level::Low),
        "minimal" | "none" | "info" => Some(Level::Minimal),
        _ => None,
    }
}

fn parse_department(label: &str) -> Option<Department> {
    match label.trim().to_lowercase().replace(['_', '-'], " ").as_str() {
        "cardiology" => Some(Department::Cardiology),
        "neurology" => Some(Department::Neurology),
        "orthopedic" | "orthopedics" | "orthopaedics" => Some(Department::Orthopedic),
        "oral health" | "dental" => Some(Department::OralHealth),
        "general" | "general medicine" => Some(Department::General),
        _ => None,
    }
}

fn parse_flag(label: &str) -> Option<Flag> {
    match label.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
        "contraindication" | "contraindicated" => Some(Flag::Contraindication),
        "side_effect" | "side_effects" | "sideeffect" => Some(Flag::SideEffect),
        "dose_check" | "dose" | "dosage" => Some(Flag::DoseCheck),
        "allergy_risk" | "allergy" => Some(Flag::AllergyRisk),
        "emergency_referral" | "emergency" => Some(Flag::EmergencyReferral),
        "clinician_review" | "review" => Some(Flag::ClinicianReview),
        _ => None,
    }
}

/// Unknown flag strings are dropped
fn parse_flags(object: &Map<String, Value>) -> BTreeSet<Flag> {
    match object.get("flags") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .filter_map(parse_flag)
            .collect(),
        Some(Value::String(s)) => s.split(',').filter_map(parse_flag).collect(),
        _ => BTreeSet::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rule_engine::RuleEngine;

    fn triage() -> ClinicalQuery {
        ClinicalQuery::triage("p-1", "chest pain and sweating").unwrap()
    }

    #[test]
    fn test_valid_response() {
        let normalizer = ResponseNormalizer::default();
        let raw = r#"```json
{"level": "Emergency", "rationale": "Possible acute coronary syndrome.", "flags": ["emergency_referral", "telepathy"], "confidence": 0.9}
```"#;
        let result = normalizer.normalize(&triage(), Tier::Primary, raw).unwrap();
        assert_eq!(result.level, Level::Critical);
        assert_eq!(result.answering_tier, Tier::Primary);
        assert_eq!(result.confidence, Confidence::High);
        assert_eq!(result.flags, [Flag::EmergencyReferral].into_iter().collect());
        assert_eq!(result.department, Some(Department::Cardiology));
    }

    #[test]
    fn test_missing_level_rejected() {
        let normalizer = ResponseNormalizer::default();
        let err = normalizer
            .normalize(&triage(), Tier::Primary, r#"{"rationale": "See a doctor"}"#)
            .unwrap_err();
        assert_eq!(err, ValidationError::MissingField("level"));
    }

    #[test]
    fn test_empty_rationale_rejected() {
        let normalizer = ResponseNormalizer::default();
        let err = normalizer
            .normalize(&triage(), Tier::Secondary, r#"{"level": "high", "rationale": "   "}"#)
            .unwrap_err();
        assert_eq!(err, ValidationError::EmptyField("rationale"));
    }

    #[test]
    fn test_unknown_level_rejected() {
        let normalizer = ResponseNormalizer::default();
        let err = normalizer
            .normalize(&triage(), Tier::Secondary, r#"{"level": "purple", "rationale": "x"}"#)
            .unwrap_err();
        assert_eq!(err, ValidationError::UnknownLevel("purple".to_string()));
    }

    #[test]
    fn test_prose_rejected_for_triage() {
        let normalizer = ResponseNormalizer::default();
        let err = normalizer
            .normalize(&triage(), Tier::Primary, "I think this is serious.")
            .unwrap_err();
        assert_eq!(err, ValidationError::NoJsonObject);
    }

    #[test]
    fn test_prose_accepted_for_medicine_info() {
        let normalizer = ResponseNormalizer::default();
        let query = ClinicalQuery::medicine_info("p-1", "Ibuprofen").unwrap();
        let result = normalizer
            .normalize(
                &query,
                Tier::Secondary,
                "Ibuprofen is an anti-inflammatory painkiller. Take it with food.",
            )
            .unwrap();
        assert_eq!(result.level, Level::Minimal);
        assert!(result.rationale.starts_with("Ibuprofen"));
        assert_eq!(result.department, None);
    }

    #[test]
    fn test_low_confidence_gets_review_flag() {
        let normalizer = ResponseNormalizer::default();
        let result = normalizer
            .normalize(&triage(), Tier::Primary, r#"{"level": "high", "rationale": "Unclear."}"#)
            .unwrap();
        assert_eq!(result.confidence, Confidence::Low);
        assert!(result.has_flag(Flag::ClinicianReview));
    }

    #[test]
    fn test_rationale_truncated() {
        let normalizer = ResponseNormalizer::new(NormalizerConfig {
            max_rationale_chars: 10,
            ..Default::default()
        });
        let result = normalizer
            .normalize(
                &triage(),
                Tier::Primary,
                r#"{"level": "low", "rationale": "ééééééééééééééé", "confidence": "high"}"#,
            )
            .unwrap();
        assert_eq!(result.rationale.chars().count(), 10);
    }

    #[test]
    fn test_rule_confidence() {
        let normalizer = ResponseNormalizer::default();
        let engine = RuleEngine::new();

        let interaction = engine.evaluate(&ClinicalQuery::risk_check("p", "warfarin + aspirin").unwrap());
        let result = normalizer.from_rule(&interaction).unwrap();
        assert_eq!(result.answering_tier, Tier::Tertiary);
        assert_eq!(result.confidence, Confidence::High);
        assert!(!result.has_flag(Flag::ClinicianReview));

        let fallback = engine.evaluate(&ClinicalQuery::triage("p", "feeling off").unwrap());
        let result = normalizer.from_rule(&fallback).unwrap();
        assert_eq!(result.confidence, Confidence::Low);
        assert!(result.has_flag(Flag::ClinicianReview));
    }

    #[test]
    fn test_rule_with_blank_rationale_rejected() {
        let normalizer = ResponseNormalizer::default();
        let mut rule = RuleEngine::new().evaluate(&triage());
        rule.rationale = String::new();
        assert_eq!(
            normalizer.from_rule(&rule),
            Err(ValidationError::EmptyField("rationale"))
        );
    }
}
