//! Orchestrator configuration

use clinical_protocol::Tier;
use health_probe::BreakerConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Invalid configuration values
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("failure_threshold must be at least 1")]
    ZeroThreshold,
    #[error("call_timeout_ms must be greater than zero")]
    ZeroTimeout,
    #[error("{adapter} adapter cannot serve the {slot} tier")]
    TierMismatch { slot: Tier, adapter: Tier },
}

/// Failover configuration, fixed for the lifetime of an orchestrator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FailoverConfig {
    /// Consecutive failures before a tier's breaker opens (default: 3)
    pub failure_threshold: u32,
    /// Breaker cooldown in seconds (default: 30)
    pub cooldown_secs: u64,
    /// Per-call time budget in milliseconds (default: 8000)
    pub call_timeout_ms: u64,
}

impl Default for FailoverConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown_secs: 30,
            call_timeout_ms: 8_000,
        }
    }
}

impl FailoverConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::ZeroThreshold);
        }
        if self.call_timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    /// Breaker settings derived from this config
    pub fn breaker(&self) -> BreakerConfig {
        BreakerConfig {
            failure_threshold: self.failure_threshold,
            cooldown_secs: self.cooldown_secs,
        }
    }
}
