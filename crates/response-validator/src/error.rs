//! Validation Error Types

use thiserror::Error;

/// Reasons a tier answer is rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// No JSON object anywhere in the text
    #[error("No JSON object found in response")]
    NoJsonObject,

    /// Object found but not parseable
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    /// Missing required field
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// Required field present but blank
    #[error("Field {0} is empty")]
    EmptyField(&'static str),

    /// Level outside the known scale
    #[error("Unknown level: {0}")]
    UnknownLevel(String),
}
