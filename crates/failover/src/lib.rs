//! Tiered Failover Orchestration
//!
//! Walks a query down the escalation ladder (primary model, secondary model,
//! rule engine) until one tier produces a valid assessment, keeping an
//! immutable record of every attempt.

mod config;
mod orchestrator;

pub use config::{ConfigError, FailoverConfig};
pub use orchestrator::{Evaluation, FailoverOrchestrator, RULE_ENGINE_SOURCE};

use clinical_protocol::{QueryError, TierResult};
use thiserror::Error;

/// Terminal evaluation failures
#[derive(Debug, Error)]
pub enum EvaluationError {
    /// Query rejected before any tier ran
    #[error("Invalid query: {0}")]
    InvalidQuery(#[from] QueryError),

    /// Not even the rule engine could answer
    #[error("All tiers exhausted after {} attempts", .attempts.len())]
    AllTiersExhausted { attempts: Vec<TierResult> },
}
