//! Adapter Health Probe
//!
//! Circuit breaker per remote tier. Eligibility is decided from recorded
//! attempt outcomes only, never by calling the provider.

mod probe;

pub use probe::{AdapterHealth, BreakerConfig, BreakerState, HealthProbe};
