//! Prompt construction per query kind

use clinical_protocol::{ClinicalQuery, QueryPayload, Vitals};
use rule_engine::canonical_drugs;

const RESPONSE_CONTRACT: &str = "Reply with a single JSON object and nothing else: \
{\"level\": \"minimal|low|moderate|high|critical\", \"rationale\": \"<short clinical explanation>\", \
\"flags\": [\"contraindication\", \"side_effect\", \"dose_check\", \"allergy_risk\", \"emergency_referral\", \"clinician_review\"], \
\"confidence\": <number between 0 and 1>}. Include only the flags that apply.";

/// System instruction plus user message sent to a provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl Prompt {
    /// Build the prompt for a query. Returns `None` when the payload has
    /// nothing a model could reason about (e.g. a prescription that is only
    /// dose tokens).
    pub fn for_query(query: &ClinicalQuery) -> Option<Self> {
        match query.payload() {
            QueryPayload::Triage { symptoms, vitals } => {
                let mut user = format!("Patient-reported symptoms: {}", symptoms);
                if let Some(vitals) = vitals {
                    user.push_str(&format!("\nVital signs: {}", describe_vitals(vitals)));
                }
                user.push_str(
                    "\nAssign a triage priority. Also include \"department\": one of \
                     Cardiology, Neurology, Orthopedic, Oral Health, General.",
                );
                Some(Self::with_contract(
                    "You are a hospital triage assistant supporting registered clinicians.",
                    user,
                ))
            }
            QueryPayload::RiskCheck {
                drugs,
                patient_context,
            } => {
                let canonical = canonical_drugs(drugs);
                if canonical.is_empty() {
                    return None;
                }
                let mut user = format!(
                    "Prescription: {}\nCheck for interactions, contraindications, duplicate therapy and dose concerns.",
                    canonical.join(", ")
                );
                if let Some(context) = patient_context {
                    user.push_str(&format!("\nPatient context: {}", context));
                }
                Some(Self::with_contract(
                    "You are a clinical pharmacist reviewing a prescription for medication risks.",
                    user,
                ))
            }
            QueryPayload::MedicineInfo { medicine } => Some(Self::with_contract(
                "You explain medicines to patients in plain language.",
                format!(
                    "Explain what {} is used for in two short sentences a patient can understand. \
                     Use level \"minimal\" unless the medicine needs special caution.",
                    medicine
                ),
            )),
        }
    }

    fn with_contract(role: &str, user: String) -> Self {
        Self {
            system: format!("{} {}", role, RESPONSE_CONTRACT),
            user,
        }
    }
}

fn describe_vitals(vitals: &Vitals) -> String {
    let readings = [
        ("heart rate", vitals.heart_rate_bpm, "bpm"),
        ("systolic BP", vitals.systolic_bp_mmhg, "mmHg"),
        ("SpO2", vitals.spo2_percent, "%"),
        ("temperature", vitals.temperature_c, "°C"),
        ("respiratory rate", vitals.respiratory_rate, "/min"),
    ];
    readings
        .iter()
        .filter_map(|(name, value, unit)| value.map(|v| format!("{} {}{}", name, v, unit)))
        .collect::<Vec<_>>()
        .join(", ")
}
