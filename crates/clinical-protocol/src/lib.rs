//! Clinical Query Protocol
//!
//! Shared vocabulary of the failover pipeline: the immutable clinical query a
//! caller submits, the per-tier attempt record kept for the audit trail, and
//! the tier-independent assessment the caller finally consumes.

mod assessment;
mod error;
mod query;
mod tier;

pub use assessment::{AssessmentResult, Confidence, Department, Flag, Level};
pub use error::QueryError;
pub use query::{split_prescription, ClinicalQuery, QueryKind, QueryPayload, Vitals};
pub use tier::{FailureReason, Tier, TierResult};

/// Payload limits
pub mod limits {
    /// Maximum characters accepted in any free-text payload field
    pub const MAX_TEXT_CHARS: usize = 4000;
    /// Maximum number of drugs in a single risk check
    pub const MAX_DRUGS: usize = 16;
}
