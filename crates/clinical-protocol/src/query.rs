//! Clinical query submitted by the caller

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::QueryError;
use crate::limits::{MAX_DRUGS, MAX_TEXT_CHARS};

/// Kind of question asked of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    /// Symptom and vitals based priority
    Triage,
    /// Drug combination risk flags
    RiskCheck,
    /// Short patient-facing medicine explanation
    MedicineInfo,
}

impl QueryKind {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryKind::Triage => "triage",
            QueryKind::RiskCheck => "risk_check",
            QueryKind::MedicineInfo => "medicine_info",
        }
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional vital sign readings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Vitals {
    /// Heart rate (beats/min)
    pub heart_rate_bpm: Option<f64>,
    /// Systolic blood pressure (mmHg)
    pub systolic_bp_mmhg: Option<f64>,
    /// Peripheral oxygen saturation (%)
    pub spo2_percent: Option<f64>,
    /// Body temperature (°C)
    pub temperature_c: Option<f64>,
    /// Respiratory rate (breaths/min)
    pub respiratory_rate: Option<f64>,
}

impl Vitals {
    /// Whether any reading is present
    pub fn is_empty(&self) -> bool {
        self.readings().all(|(_, value)| value.is_none())
    }

    fn readings(&self) -> impl Iterator<Item = (&'static str, Option<f64>)> {
        [
            ("heart_rate_bpm", self.heart_rate_bpm),
            ("systolic_bp_mmhg", self.systolic_bp_mmhg),
            ("spo2_percent", self.spo2_percent),
            ("temperature_c", self.temperature_c),
            ("respiratory_rate", self.respiratory_rate),
        ]
        .into_iter()
    }

    fn validate(&self) -> Result<(), QueryError> {
        for (field, value) in self.readings() {
            let Some(value) = value else { continue };
            let (min, max) = match field {
                "heart_rate_bpm" => (0.0, 300.0),
                "systolic_bp_mmhg" => (0.0, 300.0),
                "spo2_percent" => (0.0, 100.0),
                "temperature_c" => (25.0, 45.0),
                _ => (0.0, 80.0),
            };
            if !value.is_finite() || value < min || value > max {
                return Err(QueryError::VitalOutOfRange {
                    field,
                    value,
                    min,
                    max,
                });
            }
        }
        Ok(())
    }
}

/// Structured payload; the variant determines the query kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum QueryPayload {
    Triage {
        symptoms: String,
        #[serde(default)]
        vitals: Option<Vitals>,
    },
    RiskCheck {
        drugs: Vec<String>,
        #[serde(default)]
        patient_context: Option<String>,
    },
    MedicineInfo {
        medicine: String,
    },
}

impl QueryPayload {
    /// Kind of this payload
    pub fn kind(&self) -> QueryKind {
        match self {
            QueryPayload::Triage { .. } => QueryKind::Triage,
            QueryPayload::RiskCheck { .. } => QueryKind::RiskCheck,
            QueryPayload::MedicineInfo { .. } => QueryKind::MedicineInfo,
        }
    }

    /// Build a risk-check payload from free prescription text ("Warfarin+Aspirin")
    pub fn risk_check_from_prescription(text: &str) -> Self {
        QueryPayload::RiskCheck {
            drugs: split_prescription(text),
            patient_context: None,
        }
    }

    /// Trim fields and reject empty or oversized content
    fn sanitized(self) -> Result<Self, QueryError> {
        match self {
            QueryPayload::Triage { symptoms, vitals } => {
                let symptoms = bounded("symptoms", symptoms)?;
                let vitals = vitals.filter(|v| !v.is_empty());
                if let Some(vitals) = &vitals {
                    vitals.validate()?;
                }
                if symptoms.is_empty() && vitals.is_none() {
                    return Err(QueryError::EmptyPayload("triage"));
                }
                Ok(QueryPayload::Triage { symptoms, vitals })
            }
            QueryPayload::RiskCheck {
                drugs,
                patient_context,
            } => {
                let drugs = drugs
                    .into_iter()
                    .map(|d| bounded("drugs", d))
                    .filter(|d| !matches!(d, Ok(d) if d.is_empty()))
                    .collect::<Result<Vec<_>, _>>()?;
                if drugs.is_empty() {
                    return Err(QueryError::EmptyPayload("risk_check"));
                }
                if drugs.len() > MAX_DRUGS {
                    return Err(QueryError::TooManyDrugs {
                        count: drugs.len(),
                        max: MAX_DRUGS,
                    });
                }
                let patient_context = patient_context
                    .map(|c| bounded("patient_context", c))
                    .transpose()?
                    .filter(|c| !c.is_empty());
                Ok(QueryPayload::RiskCheck {
                    drugs,
                    patient_context,
                })
            }
            QueryPayload::MedicineInfo { medicine } => {
                let medicine = bounded("medicine", medicine)?;
                if medicine.is_empty() {
                    return Err(QueryError::EmptyPayload("medicine_info"));
                }
                Ok(QueryPayload::MedicineInfo { medicine })
            }
        }
    }
}

fn bounded(field: &'static str, value: String) -> Result<String, QueryError> {
    let trimmed = value.trim();
    if trimmed.chars().count() > MAX_TEXT_CHARS {
        return Err(QueryError::PayloadTooLarge {
            field,
            max: MAX_TEXT_CHARS,
        });
    }
    Ok(trimmed.to_string())
}

/// Split free prescription text into drug entries.
///
/// Separators are `+ , ; /`, newlines and the words `and` / `&`.
pub fn split_prescription(text: &str) -> Vec<String> {
    text.split(|c: char| matches!(c, '+' | ',' | ';' | '/' | '\n'))
        .flat_map(|part| {
            let mut pieces = Vec::new();
            let mut current: Vec<&str> = Vec::new();
            for word in part.split_whitespace() {
                if word.eq_ignore_ascii_case("and") || word == "&" {
                    if !current.is_empty() {
                        pieces.push(current.join(" "));
                        current.clear();
                    }
                } else {
                    current.push(word);
                }
            }
            if !current.is_empty() {
                pieces.push(current.join(" "));
            }
            pieces
        })
        .collect()
}

/// Immutable clinical query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClinicalQuery {
    id: Uuid,
    subject_id: String,
    payload: QueryPayload,
    submitted_at: DateTime<Utc>,
}

impl ClinicalQuery {
    /// Validate the payload and stamp a new query
    pub fn new(subject_id: impl Into<String>, payload: QueryPayload) -> Result<Self, QueryError> {
        let subject_id = subject_id.into().trim().to_string();
        if subject_id.is_empty() {
            return Err(QueryError::MissingSubject);
        }
        Ok(Self {
            id: Uuid::new_v4(),
            subject_id,
            payload: payload.sanitized()?,
            submitted_at: Utc::now(),
        })
    }

    /// Triage query from a symptom description
    pub fn triage(subject_id: impl Into<String>, symptoms: &str) -> Result<Self, QueryError> {
        Self::new(
            subject_id,
            QueryPayload::Triage {
                symptoms: symptoms.to_string(),
                vitals: None,
            },
        )
    }

    /// Risk check from free prescription text
    pub fn risk_check(subject_id: impl Into<String>, prescription: &str) -> Result<Self, QueryError> {
        Self::new(
            subject_id,
            QueryPayload::risk_check_from_prescription(prescription),
        )
    }

    /// Medicine explanation request
    pub fn medicine_info(subject_id: impl Into<String>, medicine: &str) -> Result<Self, QueryError> {
        Self::new(
            subject_id,
            QueryPayload::MedicineInfo {
                medicine: medicine.to_string(),
            },
        )
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    pub fn kind(&self) -> QueryKind {
        self.payload.kind()
    }

    pub fn payload(&self) -> &QueryPayload {
        &self.payload
    }

    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }
}
