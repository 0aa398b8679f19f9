//! Response Normalization and Validation
//!
//! Turns raw tier output (model text or a rule match) into the shared
//! `AssessmentResult` schema. Output that cannot be coerced is rejected so the
//! orchestrator escalates instead of passing garbage downstream.

mod confidence;
mod error;
mod extract;
mod normalizer;

pub use confidence::{confidence_from_reported, heuristic_confidence};
pub use error::ValidationError;
pub use extract::extract_json_object;
pub use normalizer::{NormalizerConfig, ResponseNormalizer};
