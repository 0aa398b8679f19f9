//! Circuit breaker implementation

use chrono::{DateTime, Duration, Utc};
use clinical_protocol::Tier;
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Breaker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Consecutive failures that open the breaker (default: 3)
    pub failure_threshold: u32,
    /// Time an open breaker stays closed to traffic (seconds)
    pub cooldown_secs: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown_secs: 30,
        }
    }
}

/// Upper bound on the cooldown (one day)
const MAX_COOLDOWN_SECS: u64 = 86_400;

impl BreakerConfig {
    fn cooldown(&self) -> Duration {
        Duration::seconds(self.cooldown_secs.min(MAX_COOLDOWN_SECS) as i64)
    }
}

/// Observable breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    Closed,
    Open,
    /// Cooldown elapsed; the next eligibility check claims the probe
    HalfOpen,
    /// A probe call is in flight
    Probing,
}

/// Per-tier health record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdapterHealth {
    pub tier: Tier,
    pub consecutive_failures: u32,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub open_until: Option<DateTime<Utc>>,
    pub probe_started_at: Option<DateTime<Utc>>,
}

impl AdapterHealth {
    fn new(tier: Tier) -> Self {
        Self {
            tier,
            consecutive_failures: 0,
            last_success_at: None,
            last_failure_at: None,
            open_until: None,
            probe_started_at: None,
        }
    }

    /// Breaker state at `now` for a given cooldown
    pub fn state_at(&self, now: DateTime<Utc>, cooldown: Duration) -> BreakerState {
        match (self.open_until, self.probe_started_at) {
            (None, _) => BreakerState::Closed,
            (Some(until), _) if now < until => BreakerState::Open,
            (Some(_), Some(probe)) if now < probe + cooldown => BreakerState::Probing,
            (Some(_), _) => BreakerState::HalfOpen,
        }
    }
}

/// Health tracker shared by every in-flight evaluation
pub struct HealthProbe {
    config: BreakerConfig,
    /// One lock per remote tier, indexed by `slot`
    records: [Mutex<AdapterHealth>; 2],
}

impl HealthProbe {
    /// Create a new probe with all breakers closed
    pub fn new(config: BreakerConfig) -> Self {
        info!("Creating health probe with config: {:?}", config);
        Self {
            config,
            records: [
                Mutex::new(AdapterHealth::new(Tier::Primary)),
                Mutex::new(AdapterHealth::new(Tier::Secondary)),
            ],
        }
    }

    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    /// Whether `tier` may be attempted now
    pub fn is_eligible(&self, tier: Tier) -> bool {
        self.is_eligible_at(tier, Utc::now())
    }

    /// Whether `tier` may be attempted at `now`.
    ///
    /// Once an open breaker's cooldown has passed, the first caller claims the
    /// single half-open probe and is told yes; everyone else is told no until
    /// that probe is reported or expires.
    pub fn is_eligible_at(&self, tier: Tier, now: DateTime<Utc>) -> bool {
        let Some(mut record) = self.lock(tier) else {
            return true;
        };
        match record.state_at(now, self.config.cooldown()) {
            BreakerState::Closed => true,
            BreakerState::Open | BreakerState::Probing => false,
            BreakerState::HalfOpen => {
                record.probe_started_at = Some(now);
                info!(tier = %tier, "Breaker half-open, granting probe");
                true
            }
        }
    }

    /// Record the outcome of an attempt that finished at `at`
    pub fn record(&self, tier: Tier, succeeded: bool, at: DateTime<Utc>) {
        let Some(mut record) = self.lock(tier) else {
            return;
        };

        if succeeded {
            if record.open_until.is_some() {
                info!(tier = %tier, "Breaker closed after successful probe");
            }
            record.consecutive_failures = 0;
            record.last_success_at = Some(at);
            record.open_until = None;
            record.probe_started_at = None;
            return;
        }

        record.consecutive_failures = record.consecutive_failures.saturating_add(1);
        record.last_failure_at = Some(at);

        let probe_failed = record.probe_started_at.take().is_some();
        let was_open = record.open_until.is_some();
        if probe_failed || record.consecutive_failures >= self.config.failure_threshold {
            record.open_until = Some(at + self.config.cooldown());
            if probe_failed || !was_open {
                warn!(
                    tier = %tier,
                    failures = record.consecutive_failures,
                    cooldown_secs = self.config.cooldown_secs,
                    "Breaker opened"
                );
                metrics::counter!("health_probe_opened_total", "tier" => tier.as_str()).increment(1);
            }
        } else {
            debug!(tier = %tier, failures = record.consecutive_failures, "Failure recorded");
        }
    }

    /// Current record for a remote tier
    pub fn health(&self, tier: Tier) -> Option<AdapterHealth> {
        self.lock(tier).map(|record| record.clone())
    }

    /// Breaker state for a tier at `now`; Tertiary is always closed
    pub fn state_at(&self, tier: Tier, now: DateTime<Utc>) -> BreakerState {
        self.lock(tier)
            .map_or(BreakerState::Closed, |record| record.state_at(now, self.config.cooldown()))
    }

    /// Copy of every remote tier's record
    pub fn snapshot(&self) -> Vec<AdapterHealth> {
        [Tier::Primary, Tier::Secondary]
            .into_iter()
            .filter_map(|tier| self.health(tier))
            .collect()
    }

    fn lock(&self, tier: Tier) -> Option<MutexGuard<'_, AdapterHealth>> {
        let slot = match tier {
            Tier::Primary => 0,
            Tier::Secondary => 1,
            Tier::Tertiary => return None,
        };
        // A panic while holding the lock leaves the record itself consistent
        Some(self.records[slot].lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl Default for HealthProbe {
    fn default() -> Self {
        Self::new(BreakerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-03-01T08:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn secs(n: i64) -> Duration {
        Duration::seconds(n)
    }

    #[test]
    fn test_opens_after_threshold() {
        let probe = HealthProbe::default();
        let now = t0();
        probe.record(Tier::Primary, false, now);
        probe.record(Tier::Primary, false, now);
        assert!(probe.is_eligible_at(Tier::Primary, now));

        probe.record(Tier::Primary, false, now);
        assert!(!probe.is_eligible_at(Tier::Primary, now));
        assert!(!probe.is_eligible_at(Tier::Primary, now + secs(29)));
        assert_eq!(probe.state_at(Tier::Primary, now), BreakerState::Open);
        assert!(probe.is_eligible_at(Tier::Secondary, now));
    }

    #[test]
    fn test_single_half_open_probe() {
        let probe = HealthProbe::default();
        let now = t0();
        for _ in 0..3 {
            probe.record(Tier::Secondary, false, now);
        }

        let later = now + secs(30);
        assert_eq!(probe.state_at(Tier::Secondary, later), BreakerState::HalfOpen);
        assert!(probe.is_eligible_at(Tier::Secondary, later));
        assert!(!probe.is_eligible_at(Tier::Secondary, later));
        assert_eq!(probe.state_at(Tier::Secondary, later), BreakerState::Probing);
    }

    #[test]
    fn test_successful_probe_closes() {
        let probe = HealthProbe::default();
        let now = t0();
        for _ in 0..3 {
            probe.record(Tier::Primary, false, now);
        }
        let later = now + secs(31);
        assert!(probe.is_eligible_at(Tier::Primary, later));
        probe.record(Tier::Primary, true, later);

        let health = probe.health(Tier::Primary).unwrap();
        assert_eq!(health.consecutive_failures, 0);
        assert_eq!(health.open_until, None);
        assert!(probe.is_eligible_at(Tier::Primary, later));
        assert!(probe.is_eligible_at(Tier::Primary, later));
    }

    #[test]
    fn test_failed_probe_reopens_with_same_cooldown() {
        let probe = HealthProbe::default();
        let now = t0();
        for _ in 0..3 {
            probe.record(Tier::Primary, false, now);
        }
        let later = now + secs(30);
        assert!(probe.is_eligible_at(Tier::Primary, later));
        probe.record(Tier::Primary, false, later + secs(2));

        let health = probe.health(Tier::Primary).unwrap();
        assert_eq!(health.open_until, Some(later + secs(32)));
        assert_eq!(health.probe_started_at, None);
        assert!(!probe.is_eligible_at(Tier::Primary, later + secs(31)));
        assert!(probe.is_eligible_at(Tier::Primary, later + secs(32)));
    }

    #[test]
    fn test_lost_probe_expires() {
        let probe = HealthProbe::default();
        let now = t0();
        for _ in 0..3 {
            probe.record(Tier::Primary, false, now);
        }
        let claim = now + secs(30);
        assert!(probe.is_eligible_at(Tier::Primary, claim));
        assert!(!probe.is_eligible_at(Tier::Primary, claim + secs(29)));
        assert!(probe.is_eligible_at(Tier::Primary, claim + secs(30)));
    }

    #[test]
    fn test_success_resets_counter() {
        let probe = HealthProbe::default();
        let now = t0();
        probe.record(Tier::Primary, false, now);
        probe.record(Tier::Primary, false, now);
        probe.record(Tier::Primary, true, now);
        probe.record(Tier::Primary, false, now);
        assert!(probe.is_eligible_at(Tier::Primary, now));
        assert_eq!(probe.health(Tier::Primary).unwrap().consecutive_failures, 1);
    }

    #[test]
    fn test_tertiary_never_gated() {
        let probe = HealthProbe::default();
        let now = t0();
        for _ in 0..10 {
            probe.record(Tier::Tertiary, false, now);
        }
        assert!(probe.is_eligible_at(Tier::Tertiary, now));
        assert!(probe.health(Tier::Tertiary).is_none());
        assert_eq!(probe.snapshot().len(), 2);
    }

    #[test]
    fn test_concurrent_failures_not_lost() {
        let probe = Arc::new(HealthProbe::new(BreakerConfig {
            failure_threshold: 10_000,
            cooldown_secs: 30,
        }));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let probe = Arc::clone(&probe);
                thread::spawn(move || {
                    for _ in 0..250 {
                        probe.record(Tier::Primary, false, Utc::now());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(probe.health(Tier::Primary).unwrap().consecutive_failures, 2000);
    }

    #[test]
    fn test_concurrent_probe_claim_is_exclusive() {
        let probe = Arc::new(HealthProbe::default());
        let now = t0();
        for _ in 0..3 {
            probe.record(Tier::Secondary, false, now);
        }
        let later = now + secs(45);
        let granted: usize = (0..16)
            .map(|_| {
                let probe = Arc::clone(&probe);
                thread::spawn(move || probe.is_eligible_at(Tier::Secondary, later) as usize)
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|h| h.join().unwrap())
            .sum();
        assert_eq!(granted, 1);
    }

    #[test]
    fn test_snapshot_serializes() {
        let probe = HealthProbe::default();
        let json = serde_json::to_value(probe.snapshot()).unwrap();
        assert_eq!(json[0]["tier"], "primary");
        assert_eq!(json[1]["consecutive_failures"], 0);
    }
}
