//! Tier-independent assessment schema

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::tier::Tier;

/// Triage priority or medication risk, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Minimal,
    Low,
    Moderate,
    High,
    Critical,
}

impl Level {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Minimal => "minimal",
            Level::Low => "low",
            Level::Moderate => "moderate",
            Level::High => "high",
            Level::Critical => "critical",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Confidence label attached to every assessment
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::Low => "low",
            Confidence::Medium => "medium",
            Confidence::High => "high",
        }
    }
}

/// Safety flags raised by an assessment
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Flag {
    /// Drug combination should not be co-prescribed
    Contraindication,
    /// Known side effect worth monitoring
    SideEffect,
    /// Dose or cumulative dose needs checking
    DoseCheck,
    /// Allergy or hypersensitivity risk
    AllergyRisk,
    /// Patient needs emergency care now
    EmergencyReferral,
    /// Answer is weak and must be reviewed by a clinician
    ClinicianReview,
}

impl Flag {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Flag::Contraindication => "contraindication",
            Flag::SideEffect => "side_effect",
            Flag::DoseCheck => "dose_check",
            Flag::AllergyRisk => "allergy_risk",
            Flag::EmergencyReferral => "emergency_referral",
            Flag::ClinicianReview => "clinician_review",
        }
    }
}

/// Hospital department a triaged patient is routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Department {
    Cardiology,
    Neurology,
    Orthopedic,
    OralHealth,
    General,
}

impl Department {
    /// Get display name
    pub fn as_str(&self) -> &'static str {
        match self {
            Department::Cardiology => "Cardiology",
            Department::Neurology => "Neurology",
            Department::Orthopedic => "Orthopedic",
            Department::OralHealth => "Oral Health",
            Department::General => "General",
        }
    }
}

/// Final structured answer, identical in shape whichever tier produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentResult {
    /// Triage priority or risk level
    pub level: Level,
    /// Human-readable explanation
    pub rationale: String,
    /// Raised safety flags
    pub flags: BTreeSet<Flag>,
    /// Tier that actually produced this answer
    pub answering_tier: Tier,
    /// Confidence label
    pub confidence: Confidence,
    /// Department routing for triage answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<Department>,
    /// Generation time
    pub generated_at: DateTime<Utc>,
}

impl AssessmentResult {
    /// Check whether a flag is raised
    pub fn has_flag(&self, flag: Flag) -> bool {
        self.flags.contains(&flag)
    }

    /// Content equality ignoring the generation timestamp
    pub fn same_answer(&self, other: &AssessmentResult) -> bool {
        self.level == other.level
            && self.rationale == other.rationale
            && self.flags == other.flags
            && self.answering_tier == other.answering_tier
            && self.confidence == other.confidence
            && self.department == other.department
    }
}
