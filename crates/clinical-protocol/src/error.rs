//! Query Error Types

use thiserror::Error;

/// Errors raised while building a clinical query
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    /// Subject identifier was blank
    #[error("Subject id must not be empty")]
    MissingSubject,

    /// Payload carried no usable clinical content
    #[error("Empty {0} payload")]
    EmptyPayload(&'static str),

    /// Free-text field exceeded the accepted size
    #[error("{field} exceeds {max} characters")]
    PayloadTooLarge { field: &'static str, max: usize },

    /// Too many drugs in one risk check
    #[error("Risk check lists {count} drugs, at most {max} allowed")]
    TooManyDrugs { count: usize, max: usize },

    /// Vital sign reading is physiologically implausible
    #[error("{field} value {value} is out of range [{min}, {max}]")]
    VitalOutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
}
