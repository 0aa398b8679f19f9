//! Rule evaluation

use clinical_protocol::{ClinicalQuery, Department, Flag, Level, QueryPayload, Vitals};
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, info};

use crate::drugs::canonical_drugs;
use crate::rules::RuleSet;
use crate::RuleSetError;

/// Drugs to avoid when the patient context mentions pregnancy
const PREGNANCY_AVOID: &[&str] = &["warfarin", "methotrexate", "lisinopril", "ibuprofen"];

/// Extra rationales appended after the leading finding
const MAX_SECONDARY_FINDINGS: usize = 2;

/// Canned answer selected by the rule tables
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleMatch {
    /// Id of the deciding rule (`default.*` when nothing matched)
    pub rule_id: String,
    pub level: Level,
    pub rationale: String,
    pub flags: BTreeSet<Flag>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<Department>,
    /// Rule is trusted enough to report above Low confidence
    pub high_confidence: bool,
    /// No rule matched; this is the generic refer-to-clinician answer
    pub fallback: bool,
}

struct Candidate {
    id: String,
    level: Level,
    rationale: String,
    flags: &'static [Flag],
    department: Option<Department>,
    high_confidence: bool,
}

/// Route a symptom description to a department by keyword
pub fn route_department(symptoms: &str) -> Department {
    let text = symptoms.to_lowercase();
    let has = |words: &[&str]| words.iter().any(|w| text.contains(w));
    if has(&["heart", "chest", "pulse"]) {
        Department::Cardiology
    } else if has(&["brain", "head", "dizzy"]) {
        Department::Neurology
    } else if has(&["bone", "joint", "fracture"]) {
        Department::Orthopedic
    } else if has(&["tooth", "gum", "mouth"]) {
        Department::OralHealth
    } else {
        Department::General
    }
}

/// Deterministic tertiary-tier evaluator
#[derive(Debug, Clone)]
pub struct RuleEngine {
    rules: RuleSet,
}

impl RuleEngine {
    /// Engine over the built-in tables
    pub fn new() -> Self {
        Self::with_rules(RuleSet::standard())
    }

    /// Engine over custom tables
    pub fn with_rules(rules: RuleSet) -> Self {
        info!("Creating rule engine with {} rules", rules.len());
        Self { rules }
    }

    /// Engine over custom tables that must pass `RuleSet::validate`
    pub fn try_with_rules(rules: RuleSet) -> Result<Self, RuleSetError> {
        rules.validate()?;
        Ok(Self::with_rules(rules))
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Evaluate a query. Always returns a match; unmatched input gets the
    /// default template for its kind.
    pub fn evaluate(&self, query: &ClinicalQuery) -> RuleMatch {
        let result = self.evaluate_payload(query.payload());
        debug!(
            query_id = %query.id(),
            rule_id = %result.rule_id,
            level = %result.level,
            "Rule engine answered"
        );
        result
    }

    /// Evaluate a bare payload
    pub fn evaluate_payload(&self, payload: &QueryPayload) -> RuleMatch {
        match payload {
            QueryPayload::Triage { symptoms, vitals } => self.triage(symptoms, vitals.as_ref()),
            QueryPayload::RiskCheck {
                drugs,
                patient_context,
            } => self.risk_check(drugs, patient_context.as_deref()),
            QueryPayload::MedicineInfo { medicine } => self.medicine_info(medicine),
        }
    }

    fn triage(&self, symptoms: &str, vitals: Option<&Vitals>) -> RuleMatch {
        let text = symptoms.to_lowercase();
        let mut candidates: Vec<Candidate> = self
            .rules
            .symptoms
            .iter()
            .filter(|rule| rule.matches(&text))
            .map(|rule| Candidate {
                id: rule.id.to_string(),
                level: rule.level,
                rationale: rule.rationale.to_string(),
                flags: rule.flags,
                department: rule.department,
                high_confidence: rule.high_confidence,
            })
            .collect();

        if let Some(vitals) = vitals {
            for rule in self.rules.vitals {
                let Some(value) = rule.sign.read(vitals) else { continue };
                if rule.comparison.holds(value) {
                    candidates.push(Candidate {
                        id: rule.id.to_string(),
                        level: rule.level,
                        rationale: format!("{} Measured {}: {}.", rule.rationale, rule.sign.label(), value),
                        flags: rule.flags,
                        department: None,
                        high_confidence: rule.high_confidence,
                    });
                }
            }
        }

        if candidates.is_empty() {
            return RuleMatch {
                rule_id: "default.triage".to_string(),
                level: Level::Moderate,
                rationale: "Insufficient data to assign a priority; refer to a clinician for assessment."
                    .to_string(),
                flags: [Flag::ClinicianReview].into_iter().collect(),
                department: Some(route_department(symptoms)),
                high_confidence: false,
                fallback: false,
            }
            .into_fallback();
        }

        // Stable sort keeps table order among equal levels
        candidates.sort_by(|a, b| b.level.cmp(&a.level));
        let department = candidates
            .iter()
            .find_map(|c| c.department)
            .unwrap_or_else(|| route_department(symptoms));
        let rationale = candidates
            .iter()
            .take(1 + MAX_SECONDARY_FINDINGS)
            .map(|c| c.rationale.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        let top = &candidates[0];
        RuleMatch {
            rule_id: top.id.clone(),
            level: top.level,
            rationale,
            flags: union_flags(&candidates),
            department: Some(department),
            high_confidence: top.high_confidence,
            fallback: false,
        }
    }

    fn risk_check(&self, drugs: &[String], patient_context: Option<&str>) -> RuleMatch {
        let canonical = canonical_drugs(drugs);
        let mut unique: Vec<&str> = Vec::new();
        let mut candidates = Vec::new();

        for drug in &canonical {
            if unique.contains(&drug.as_str()) {
                candidates.push(Candidate {
                    id: "duplicate.therapy".to_string(),
                    level: Level::Moderate,
                    rationale: format!(
                        "{} is listed more than once; duplicate products risk exceeding the maximum daily dose.",
                        drug
                    ),
                    flags: &[Flag::DoseCheck],
                    department: None,
                    high_confidence: true,
                });
            } else {
                unique.push(drug);
            }
        }

        for (i, a) in unique.iter().enumerate() {
            for b in &unique[i + 1..] {
                for rule in self.rules.interactions.iter().filter(|r| r.covers(a, b)) {
                    candidates.push(Candidate {
                        id: rule.id.to_string(),
                        level: rule.level,
                        rationale: rule.rationale.to_string(),
                        flags: rule.flags,
                        department: None,
                        high_confidence: rule.high_confidence,
                    });
                }
            }
        }

        let pregnant = patient_context.is_some_and(|c| c.to_lowercase().contains("pregnan"));
        for drug in &unique {
            if pregnant && PREGNANCY_AVOID.contains(drug) {
                candidates.push(Candidate {
                    id: "context.pregnancy".to_string(),
                    level: Level::High,
                    rationale: format!("{} should be avoided in pregnancy; choose an alternative.", drug),
                    flags: &[Flag::Contraindication],
                    department: None,
                    high_confidence: true,
                });
            }
            if let Some(note) = self.rules.drug_notes.iter().find(|n| n.drug == *drug) {
                candidates.push(Candidate {
                    id: note.id.to_string(),
                    level: Level::Low,
                    rationale: note.risk_note.to_string(),
                    flags: note.flags,
                    department: None,
                    high_confidence: false,
                });
            }
        }

        let unknown: Vec<&str> = unique
            .iter()
            .copied()
            .filter(|drug| !self.knows_drug(drug))
            .collect();

        if candidates.is_empty() {
            let listed = if unique.is_empty() {
                "the listed drugs".to_string()
            } else {
                unique.join(", ")
            };
            return RuleMatch {
                rule_id: "default.risk_check".to_string(),
                level: Level::Moderate,
                rationale: format!(
                    "No offline rule covers {}; insufficient data, refer to a clinician or pharmacist before prescribing.",
                    listed
                ),
                flags: [Flag::ClinicianReview].into_iter().collect(),
                department: None,
                high_confidence: false,
                fallback: false,
            }
            .into_fallback();
        }

        candidates.sort_by(|a, b| b.level.cmp(&a.level));
        let mut rationale = candidates
            .iter()
            .map(|c| c.rationale.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let mut flags = union_flags(&candidates);
        if !unknown.is_empty() {
            rationale.push_str(&format!(
                " Not covered by offline rules: {}; confirm with a pharmacist.",
                unknown.join(", ")
            ));
            flags.insert(Flag::ClinicianReview);
        }

        let top = &candidates[0];
        RuleMatch {
            rule_id: top.id.clone(),
            level: top.level,
            rationale,
            flags,
            department: None,
            high_confidence: top.high_confidence && unknown.is_empty(),
            fallback: false,
        }
    }

    fn medicine_info(&self, medicine: &str) -> RuleMatch {
        let canonical = canonical_drugs(&[medicine.to_string()]);
        let note = canonical
            .first()
            .and_then(|drug| self.rules.drug_notes.iter().find(|n| n.drug == drug.as_str()))
            .or_else(|| {
                // Free text such as "explain aspirin please"
                let text = medicine.to_lowercase();
                self.rules.drug_notes.iter().find(|n| text.contains(n.drug))
            });

        match note {
            Some(note) => RuleMatch {
                rule_id: note.id.to_string(),
                level: Level::Minimal,
                rationale: note.explanation.to_string(),
                flags: BTreeSet::new(),
                department: None,
                high_confidence: false,
                fallback: false,
            },
            None => RuleMatch {
                rule_id: "default.medicine_info".to_string(),
                level: Level::Minimal,
                rationale: format!(
                    "Prescription for {} generated. Please consult the doctor for details.",
                    medicine
                ),
                flags: [Flag::ClinicianReview].into_iter().collect(),
                department: None,
                high_confidence: false,
                fallback: false,
            }
            .into_fallback(),
        }
    }

    fn knows_drug(&self, drug: &str) -> bool {
        self.rules
            .interactions
            .iter()
            .any(|r| r.drugs.0 == drug || r.drugs.1 == drug)
            || self.rules.drug_notes.iter().any(|n| n.drug == drug)
    }
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleMatch {
    fn into_fallback(mut self) -> Self {
        self.fallback = true;
        self
    }
}

fn union_flags(candidates: &[Candidate]) -> BTreeSet<Flag> {
    candidates.iter().flat_map(|c| c.flags.iter().copied()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn engine() -> RuleEngine {
        RuleEngine::new()
    }

    #[test]
    fn test_checked_construction() {
        static SILENT: &[crate::SymptomRule] = &[crate::SymptomRule {
            id: "triage.silent",
            all_of: &[&["cough"]],
            level: Level::Low,
            rationale: " ",
            flags: &[],
            department: None,
            high_confidence: false,
        }];
        assert!(RuleEngine::try_with_rules(RuleSet::standard()).is_ok());

        let broken = RuleSet {
            symptoms: SILENT,
            ..RuleSet::standard()
        };
        assert_eq!(
            RuleEngine::try_with_rules(broken).err(),
            Some(RuleSetError::EmptyRationale("triage.silent"))
        );
    }

    #[test]
    fn test_warfarin_aspirin_contraindicated() {
        let query = ClinicalQuery::risk_check("p-1", "Warfarin+Aspirin").unwrap();
        let result = engine().evaluate(&query);
        assert_eq!(result.rule_id, "interaction.warfarin_aspirin");
        assert_eq!(result.level, Level::High);
        assert!(result.flags.contains(&Flag::Contraindication));
        assert!(result.high_confidence);
        assert!(!result.fallback);
    }

    #[test]
    fn test_interaction_is_order_independent() {
        let a = engine().evaluate(&ClinicalQuery::risk_check("p", "aspirin, coumadin 5mg").unwrap());
        let b = engine().evaluate(&ClinicalQuery::risk_check("p", "Warfarin + ASA").unwrap());
        assert_eq!(a.rule_id, b.rule_id);
        assert_eq!(a.level, b.level);
    }

    #[test]
    fn test_highest_interaction_leads() {
        let query = ClinicalQuery::risk_check("p", "aspirin + ibuprofen + warfarin").unwrap();
        let result = engine().evaluate(&query);
        assert_eq!(result.level, Level::High);
        assert!(result.rationale.contains("Warfarin with aspirin"));
        assert!(result.rationale.contains("cardioprotection"));
    }

    #[test]
    fn test_duplicate_therapy() {
        let query = ClinicalQuery::risk_check("p", "Tylenol + Paracetamol 500mg").unwrap();
        let result = engine().evaluate(&query);
        assert_eq!(result.rule_id, "duplicate.therapy");
        assert!(result.flags.contains(&Flag::DoseCheck));
    }

    #[test]
    fn test_pregnancy_context() {
        let payload = QueryPayload::RiskCheck {
            drugs: vec!["ibuprofen".to_string()],
            patient_context: Some("28 weeks pregnant".to_string()),
        };
        let result = engine().evaluate(&ClinicalQuery::new("p", payload).unwrap());
        assert_eq!(result.rule_id, "context.pregnancy");
        assert!(result.flags.contains(&Flag::Contraindication));
    }

    #[test]
    fn test_unknown_drugs_fall_back() {
        let query = ClinicalQuery::risk_check("p", "Zylotrex + Quembrin").unwrap();
        let result = engine().evaluate(&query);
        assert!(result.fallback);
        assert_eq!(result.rule_id, "default.risk_check");
        assert!(result.flags.contains(&Flag::ClinicianReview));
        assert!(result.rationale.contains("zylotrex, quembrin"));
    }

    #[test]
    fn test_partially_known_drugs_need_review() {
        let query = ClinicalQuery::risk_check("p", "amoxicillin + zylotrex").unwrap();
        let result = engine().evaluate(&query);
        assert!(!result.fallback);
        assert!(result.flags.contains(&Flag::AllergyRisk));
        assert!(result.flags.contains(&Flag::ClinicianReview));
        assert!(!result.high_confidence);
    }

    #[test]
    fn test_cardiac_emergency() {
        let query = ClinicalQuery::triage("p", "Crushing chest pain and shortness of breath").unwrap();
        let result = engine().evaluate(&query);
        assert_eq!(result.rule_id, "triage.cardiac_emergency");
        assert_eq!(result.level, Level::Critical);
        assert_eq!(result.department, Some(Department::Cardiology));
        assert!(result.flags.contains(&Flag::EmergencyReferral));
    }

    #[test]
    fn test_vitals_escalate_mild_symptoms() {
        let payload = QueryPayload::Triage {
            symptoms: "mild cough".to_string(),
            vitals: Some(Vitals {
                spo2_percent: Some(86.0),
                ..Default::default()
            }),
        };
        let result = engine().evaluate(&ClinicalQuery::new("p", payload).unwrap());
        assert_eq!(result.rule_id, "vitals.hypoxia");
        assert_eq!(result.level, Level::Critical);
        assert!(result.rationale.contains("SpO2"));
    }

    #[test]
    fn test_triage_default_routes_department() {
        let query = ClinicalQuery::triage("p", "my mouth feels strange").unwrap();
        let result = engine().evaluate(&query);
        assert!(result.fallback);
        assert_eq!(result.level, Level::Moderate);
        assert_eq!(result.department, Some(Department::OralHealth));
    }

    #[test]
    fn test_route_department_keywords() {
        assert_eq!(route_department("racing pulse"), Department::Cardiology);
        assert_eq!(route_department("feeling dizzy"), Department::Neurology);
        assert_eq!(route_department("swollen joint"), Department::Orthopedic);
        assert_eq!(route_department("bleeding gum"), Department::OralHealth);
        assert_eq!(route_department("rash"), Department::General);
    }

    #[test]
    fn test_medicine_info() {
        let known = engine().evaluate(&ClinicalQuery::medicine_info("p", "Paracetamol 500mg").unwrap());
        assert_eq!(known.rule_id, "drug.paracetamol");
        assert!(known.rationale.contains("painkiller"));

        let unknown = engine().evaluate(&ClinicalQuery::medicine_info("p", "Zylotrex").unwrap());
        assert!(unknown.fallback);
        assert_eq!(
            unknown.rationale,
            "Prescription for Zylotrex generated. Please consult the doctor for details."
        );
    }

    proptest! {
        #[test]
        fn prop_evaluation_is_deterministic(symptoms in "[a-z ]{1,60}", drugs in "[a-z+ ]{1,40}") {
            let engine = engine();
            if let Ok(query) = ClinicalQuery::triage("p", &symptoms) {
                prop_assert_eq!(engine.evaluate(&query), engine.evaluate(&query));
            }
            if let Ok(query) = ClinicalQuery::risk_check("p", &drugs) {
                let first = engine.evaluate(&query);
                prop_assert_eq!(&first, &engine.evaluate(&query));
                prop_assert!(!first.rationale.is_empty());
            }
        }
    }
}
