//! Rule tables

use clinical_protocol::{Department, Flag, Level, Vitals};
use std::collections::HashSet;

use crate::drugs::canonical_drug;
use crate::RuleSetError;

/// Symptom keyword rule.
///
/// Matches when every group in `all_of` has at least one keyword present in
/// the lowercased symptom text.
#[derive(Debug, Clone, Copy)]
pub struct SymptomRule {
    pub id: &'static str,
    pub all_of: &'static [&'static [&'static str]],
    pub level: Level,
    pub rationale: &'static str,
    pub flags: &'static [Flag],
    pub department: Option<Department>,
    pub high_confidence: bool,
}

impl SymptomRule {
    pub(crate) fn matches(&self, text: &str) -> bool {
        !self.all_of.is_empty()
            && self
                .all_of
                .iter()
                .all(|group| group.iter().any(|keyword| text.contains(keyword)))
    }
}

/// Vital sign measured by a threshold rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VitalSign {
    HeartRate,
    SystolicBp,
    Spo2,
    Temperature,
    RespiratoryRate,
}

impl VitalSign {
    /// Reading from a vitals record
    pub fn read(&self, vitals: &Vitals) -> Option<f64> {
        match self {
            VitalSign::HeartRate => vitals.heart_rate_bpm,
            VitalSign::SystolicBp => vitals.systolic_bp_mmhg,
            VitalSign::Spo2 => vitals.spo2_percent,
            VitalSign::Temperature => vitals.temperature_c,
            VitalSign::RespiratoryRate => vitals.respiratory_rate,
        }
    }

    /// Label with unit
    pub fn label(&self) -> &'static str {
        match self {
            VitalSign::HeartRate => "heart rate (bpm)",
            VitalSign::SystolicBp => "systolic BP (mmHg)",
            VitalSign::Spo2 => "SpO2 (%)",
            VitalSign::Temperature => "temperature (°C)",
            VitalSign::RespiratoryRate => "respiratory rate (/min)",
        }
    }
}

/// Threshold comparison
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Comparison {
    Below(f64),
    Above(f64),
    AtLeast(f64),
}

impl Comparison {
    pub(crate) fn holds(&self, value: f64) -> bool {
        match *self {
            Comparison::Below(limit) => value < limit,
            Comparison::Above(limit) => value > limit,
            Comparison::AtLeast(limit) => value >= limit,
        }
    }
}

/// Vital-sign threshold rule
#[derive(Debug, Clone, Copy)]
pub struct VitalRule {
    pub id: &'static str,
    pub sign: VitalSign,
    pub comparison: Comparison,
    pub level: Level,
    pub rationale: &'static str,
    pub flags: &'static [Flag],
    pub high_confidence: bool,
}

/// Order-independent drug pair interaction
#[derive(Debug, Clone, Copy)]
pub struct InteractionRule {
    pub id: &'static str,
    pub drugs: (&'static str, &'static str),
    pub level: Level,
    pub rationale: &'static str,
    pub flags: &'static [Flag],
    pub high_confidence: bool,
}

impl InteractionRule {
    pub(crate) fn covers(&self, a: &str, b: &str) -> bool {
        (self.drugs.0 == a && self.drugs.1 == b) || (self.drugs.0 == b && self.drugs.1 == a)
    }
}

/// Single drug facts: risk note and patient explanation
#[derive(Debug, Clone, Copy)]
pub struct DrugNote {
    pub id: &'static str,
    pub drug: &'static str,
    pub risk_note: &'static str,
    pub explanation: &'static str,
    pub flags: &'static [Flag],
}

/// Complete set of tables consulted by the engine
#[derive(Debug, Clone, Copy)]
pub struct RuleSet {
    pub symptoms: &'static [SymptomRule],
    pub vitals: &'static [VitalRule],
    pub interactions: &'static [InteractionRule],
    pub drug_notes: &'static [DrugNote],
}

impl RuleSet {
    /// Built-in tables
    pub fn standard() -> Self {
        Self {
            symptoms: SYMPTOM_RULES,
            vitals: VITAL_RULES,
            interactions: INTERACTION_RULES,
            drug_notes: DRUG_NOTES,
        }
    }

    /// Total number of rules
    pub fn len(&self) -> usize {
        self.symptoms.len() + self.vitals.len() + self.interactions.len() + self.drug_notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check ids, rationales, keywords, and drug names before deployment
    pub fn validate(&self) -> Result<(), RuleSetError> {
        let mut seen = HashSet::new();
        let mut check = |id: &'static str, rationale: &'static str| {
            if !seen.insert(id) {
                return Err(RuleSetError::DuplicateId(id));
            }
            if rationale.trim().is_empty() {
                return Err(RuleSetError::EmptyRationale(id));
            }
            Ok(())
        };

        for rule in self.symptoms {
            check(rule.id, rule.rationale)?;
            if rule.all_of.is_empty() || rule.all_of.iter().any(|g| g.is_empty()) {
                return Err(RuleSetError::NoKeywords(rule.id));
            }
        }
        for rule in self.vitals {
            check(rule.id, rule.rationale)?;
        }
        for rule in self.interactions {
            check(rule.id, rule.rationale)?;
            for drug in [rule.drugs.0, rule.drugs.1] {
                if canonical_drug(drug).as_deref() != Some(drug) {
                    return Err(RuleSetError::NonCanonicalDrug { rule: rule.id, drug });
                }
            }
        }
        for note in self.drug_notes {
            check(note.id, note.risk_note)?;
            if note.explanation.trim().is_empty() {
                return Err(RuleSetError::EmptyRationale(note.id));
            }
            if canonical_drug(note.drug).as_deref() != Some(note.drug) {
                return Err(RuleSetError::NonCanonicalDrug {
                    rule: note.id,
                    drug: note.drug,
                });
            }
        }
        Ok(())
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::standard()
    }
}

const CHEST: &[&str] = &["chest pain", "chest tightness", "chest pressure"];

static SYMPTOM_RULES: &[SymptomRule] = &[
    SymptomRule {
        id: "triage.cardiac_emergency",
        all_of: &[CHEST, &["breath", "sweat", "left arm", "jaw", "faint"]],
        level: Level::Critical,
        rationale: "Chest pain with breathlessness, sweating, or radiating pain suggests an acute coronary syndrome; emergency assessment and ECG now.",
        flags: &[Flag::EmergencyReferral],
        department: Some(Department::Cardiology),
        high_confidence: true,
    },
    SymptomRule {
        id: "triage.stroke_signs",
        all_of: &[&[
            "slurred speech",
            "facial droop",
            "face drooping",
            "weakness on one side",
            "one sided weakness",
            "numbness on one side",
            "sudden confusion",
        ]],
        level: Level::Critical,
        rationale: "Focal neurological signs suggest a stroke; time-critical emergency referral.",
        flags: &[Flag::EmergencyReferral],
        department: Some(Department::Neurology),
        high_confidence: true,
    },
    SymptomRule {
        id: "triage.unresponsive",
        all_of: &[&[
            "unconscious",
            "unresponsive",
            "not breathing",
            "seizure",
            "convulsion",
            "collapsed",
        ]],
        level: Level::Critical,
        rationale: "Loss of consciousness, seizure, or absent breathing requires immediate resuscitation-level care.",
        flags: &[Flag::EmergencyReferral],
        department: None,
        high_confidence: true,
    },
    SymptomRule {
        id: "triage.severe_bleeding",
        all_of: &[&[
            "severe bleeding",
            "heavy bleeding",
            "bleeding heavily",
            "vomiting blood",
            "coughing blood",
        ]],
        level: Level::Critical,
        rationale: "Major haemorrhage risk; control bleeding and escalate to emergency care.",
        flags: &[Flag::EmergencyReferral],
        department: None,
        high_confidence: true,
    },
    SymptomRule {
        id: "triage.meningitis_signs",
        all_of: &[
            &["fever", "temperature"],
            &["stiff neck", "neck stiffness", "non-blanching rash", "rash that does not fade"],
        ],
        level: Level::Critical,
        rationale: "Fever with neck stiffness or a non-blanching rash may indicate meningitis; emergency referral.",
        flags: &[Flag::EmergencyReferral],
        department: Some(Department::Neurology),
        high_confidence: true,
    },
    SymptomRule {
        id: "triage.anaphylaxis",
        all_of: &[&[
            "throat swelling",
            "swollen throat",
            "tongue swelling",
            "swollen lips",
            "anaphylaxis",
        ]],
        level: Level::Critical,
        rationale: "Airway swelling suggests anaphylaxis; give emergency treatment immediately.",
        flags: &[Flag::EmergencyReferral, Flag::AllergyRisk],
        department: None,
        high_confidence: true,
    },
    SymptomRule {
        id: "triage.cardiac_symptoms",
        all_of: &[&["chest pain", "chest tightness", "palpitation", "irregular pulse", "heart"]],
        level: Level::High,
        rationale: "Cardiac symptoms need prompt clinician review and an ECG.",
        flags: &[],
        department: Some(Department::Cardiology),
        high_confidence: false,
    },
    SymptomRule {
        id: "triage.breathing_difficulty",
        all_of: &[&["shortness of breath", "difficulty breathing", "breathless", "wheez"]],
        level: Level::High,
        rationale: "Breathing difficulty needs prompt assessment of oxygenation.",
        flags: &[],
        department: None,
        high_confidence: false,
    },
    SymptomRule {
        id: "triage.head_injury",
        all_of: &[&["head injury", "hit my head", "head trauma"]],
        level: Level::High,
        rationale: "Head injury requires neurological observation.",
        flags: &[],
        department: Some(Department::Neurology),
        high_confidence: false,
    },
    SymptomRule {
        id: "triage.fracture",
        all_of: &[&["fracture", "broken bone", "dislocat"]],
        level: Level::Moderate,
        rationale: "Suspected fracture or dislocation; immobilise and arrange imaging.",
        flags: &[],
        department: Some(Department::Orthopedic),
        high_confidence: false,
    },
    SymptomRule {
        id: "triage.high_fever",
        all_of: &[&["high fever", "fever of 39", "fever of 40", "very high temperature"]],
        level: Level::Moderate,
        rationale: "High fever warrants same-day assessment for a source of infection.",
        flags: &[],
        department: None,
        high_confidence: false,
    },
    SymptomRule {
        id: "triage.fever",
        all_of: &[&["fever", "chills"]],
        level: Level::Low,
        rationale: "Fever without red-flag features; routine assessment.",
        flags: &[],
        department: None,
        high_confidence: false,
    },
    SymptomRule {
        id: "triage.headache_dizziness",
        all_of: &[&["headache", "migraine", "dizzy", "dizziness", "vertigo"]],
        level: Level::Low,
        rationale: "Headache or dizziness without red-flag features; routine neurological review.",
        flags: &[],
        department: Some(Department::Neurology),
        high_confidence: false,
    },
    SymptomRule {
        id: "triage.musculoskeletal",
        all_of: &[&["joint pain", "back pain", "sprain", "bone pain"]],
        level: Level::Low,
        rationale: "Musculoskeletal pain without red-flag features; routine review.",
        flags: &[],
        department: Some(Department::Orthopedic),
        high_confidence: false,
    },
    SymptomRule {
        id: "triage.dental",
        all_of: &[&["tooth", "gum", "mouth ulcer"]],
        level: Level::Low,
        rationale: "Dental or oral complaint; routine oral health review.",
        flags: &[],
        department: Some(Department::OralHealth),
        high_confidence: false,
    },
];

static VITAL_RULES: &[VitalRule] = &[
    VitalRule {
        id: "vitals.hypoxia",
        sign: VitalSign::Spo2,
        comparison: Comparison::Below(90.0),
        level: Level::Critical,
        rationale: "Oxygen saturation below 90% indicates hypoxia; give oxygen and escalate.",
        flags: &[Flag::EmergencyReferral],
        high_confidence: true,
    },
    VitalRule {
        id: "vitals.low_saturation",
        sign: VitalSign::Spo2,
        comparison: Comparison::Below(94.0),
        level: Level::High,
        rationale: "Oxygen saturation below 94% needs prompt review.",
        flags: &[],
        high_confidence: false,
    },
    VitalRule {
        id: "vitals.hypotension",
        sign: VitalSign::SystolicBp,
        comparison: Comparison::Below(90.0),
        level: Level::Critical,
        rationale: "Systolic pressure below 90 mmHg suggests shock; emergency assessment.",
        flags: &[Flag::EmergencyReferral],
        high_confidence: true,
    },
    VitalRule {
        id: "vitals.tachycardia",
        sign: VitalSign::HeartRate,
        comparison: Comparison::Above(130.0),
        level: Level::High,
        rationale: "Heart rate above 130 bpm needs urgent review.",
        flags: &[],
        high_confidence: false,
    },
    VitalRule {
        id: "vitals.bradycardia",
        sign: VitalSign::HeartRate,
        comparison: Comparison::Below(40.0),
        level: Level::High,
        rationale: "Heart rate below 40 bpm needs urgent review.",
        flags: &[],
        high_confidence: false,
    },
    VitalRule {
        id: "vitals.tachypnoea",
        sign: VitalSign::RespiratoryRate,
        comparison: Comparison::Above(30.0),
        level: Level::High,
        rationale: "Respiratory rate above 30/min indicates respiratory distress.",
        flags: &[],
        high_confidence: false,
    },
    VitalRule {
        id: "vitals.hyperpyrexia",
        sign: VitalSign::Temperature,
        comparison: Comparison::AtLeast(39.5),
        level: Level::High,
        rationale: "Temperature of 39.5 °C or more needs same-day review.",
        flags: &[],
        high_confidence: false,
    },
    VitalRule {
        id: "vitals.pyrexia",
        sign: VitalSign::Temperature,
        comparison: Comparison::AtLeast(38.0),
        level: Level::Low,
        rationale: "Raised temperature.",
        flags: &[],
        high_confidence: false,
    },
];

static INTERACTION_RULES: &[InteractionRule] = &[
    InteractionRule {
        id: "interaction.warfarin_aspirin",
        drugs: ("warfarin", "aspirin"),
        level: Level::High,
        rationale: "Warfarin with aspirin markedly raises bleeding risk (anticoagulant plus antiplatelet); avoid unless specialist-directed and monitor INR.",
        flags: &[Flag::Contraindication, Flag::SideEffect],
        high_confidence: true,
    },
    InteractionRule {
        id: "interaction.warfarin_ibuprofen",
        drugs: ("warfarin", "ibuprofen"),
        level: Level::High,
        rationale: "NSAIDs with warfarin increase gastrointestinal bleeding risk; prefer paracetamol for analgesia.",
        flags: &[Flag::Contraindication],
        high_confidence: true,
    },
    InteractionRule {
        id: "interaction.warfarin_fluconazole",
        drugs: ("warfarin", "fluconazole"),
        level: Level::High,
        rationale: "Fluconazole inhibits warfarin metabolism and can sharply raise INR; reduce dose and monitor.",
        flags: &[Flag::DoseCheck],
        high_confidence: true,
    },
    InteractionRule {
        id: "interaction.sildenafil_nitrate",
        drugs: ("sildenafil", "nitroglycerin"),
        level: Level::Critical,
        rationale: "Sildenafil with nitrates can cause profound hypotension; never co-prescribe.",
        flags: &[Flag::Contraindication],
        high_confidence: true,
    },
    InteractionRule {
        id: "interaction.simvastatin_clarithromycin",
        drugs: ("simvastatin", "clarithromycin"),
        level: Level::High,
        rationale: "Clarithromycin raises simvastatin levels with risk of rhabdomyolysis; suspend the statin during the course.",
        flags: &[Flag::Contraindication],
        high_confidence: true,
    },
    InteractionRule {
        id: "interaction.fluoxetine_tramadol",
        drugs: ("fluoxetine", "tramadol"),
        level: Level::High,
        rationale: "Fluoxetine with tramadol risks serotonin syndrome and lowers the seizure threshold.",
        flags: &[Flag::Contraindication],
        high_confidence: true,
    },
    InteractionRule {
        id: "interaction.methotrexate_trimethoprim",
        drugs: ("methotrexate", "trimethoprim"),
        level: Level::High,
        rationale: "Trimethoprim with methotrexate can cause bone marrow suppression.",
        flags: &[Flag::Contraindication],
        high_confidence: true,
    },
    InteractionRule {
        id: "interaction.lisinopril_spironolactone",
        drugs: ("lisinopril", "spironolactone"),
        level: Level::Moderate,
        rationale: "ACE inhibitor with spironolactone risks hyperkalaemia; check potassium and renal function.",
        flags: &[Flag::SideEffect, Flag::DoseCheck],
        high_confidence: true,
    },
    InteractionRule {
        id: "interaction.aspirin_ibuprofen",
        drugs: ("aspirin", "ibuprofen"),
        level: Level::Moderate,
        rationale: "Aspirin with ibuprofen adds gastrointestinal bleeding risk and may blunt aspirin's cardioprotection.",
        flags: &[Flag::SideEffect],
        high_confidence: true,
    },
    InteractionRule {
        id: "interaction.clopidogrel_omeprazole",
        drugs: ("clopidogrel", "omeprazole"),
        level: Level::Moderate,
        rationale: "Omeprazole reduces clopidogrel activation; consider pantoprazole instead.",
        flags: &[Flag::SideEffect],
        high_confidence: true,
    },
];

static DRUG_NOTES: &[DrugNote] = &[
    DrugNote {
        id: "drug.paracetamol",
        drug: "paracetamol",
        risk_note: "Paracetamol is hepatotoxic in overdose; keep the total daily dose within limits.",
        explanation: "Paracetamol is a common painkiller used to treat aches and reduce fever.",
        flags: &[Flag::DoseCheck],
    },
    DrugNote {
        id: "drug.aspirin",
        drug: "aspirin",
        risk_note: "Aspirin can irritate the stomach and increases bleeding risk.",
        explanation: "Aspirin is used to reduce pain, fever, or inflammation.",
        flags: &[Flag::SideEffect],
    },
    DrugNote {
        id: "drug.amoxicillin",
        drug: "amoxicillin",
        risk_note: "Amoxicillin is a penicillin; confirm there is no penicillin allergy.",
        explanation: "Amoxicillin is an antibiotic used to treat bacterial infections.",
        flags: &[Flag::AllergyRisk],
    },
    DrugNote {
        id: "drug.ibuprofen",
        drug: "ibuprofen",
        risk_note: "Ibuprofen can cause stomach upset and should be used cautiously with kidney disease.",
        explanation: "Ibuprofen is an anti-inflammatory drug used for pain relief and fever.",
        flags: &[Flag::SideEffect],
    },
    DrugNote {
        id: "drug.warfarin",
        drug: "warfarin",
        risk_note: "Warfarin has a narrow therapeutic range; bleeding risk needs regular INR checks.",
        explanation: "Warfarin is a blood thinner that helps prevent harmful clots; it needs regular blood tests.",
        flags: &[Flag::SideEffect, Flag::DoseCheck],
    },
];
