//! Rule-Based Tertiary Tier
//!
//! Answers clinical queries from static keyword, vital-sign, and drug
//! interaction tables. No network, no clock, no hidden state: the same query
//! payload always yields the same match.

mod drugs;
mod engine;
mod rules;

pub use drugs::{canonical_drug, canonical_drugs};
pub use engine::{route_department, RuleEngine, RuleMatch};
pub use rules::{
    Comparison, DrugNote, InteractionRule, RuleSet, SymptomRule, VitalRule, VitalSign,
};

use thiserror::Error;

/// Problems found when checking a rule set before deployment
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleSetError {
    #[error("Duplicate rule id: {0}")]
    DuplicateId(&'static str),
    #[error("Rule {0} has an empty rationale")]
    EmptyRationale(&'static str),
    #[error("Rule {0} has no keywords")]
    NoKeywords(&'static str),
    #[error("Rule {rule} names non-canonical drug {drug}")]
    NonCanonicalDrug { rule: &'static str, drug: &'static str },
}
