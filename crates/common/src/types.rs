//! Shared types for resilience primitives.

use serde::{Deserialize, Serialize};

/// Circuit breaker tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerConfig {
    /// Consecutive failures before the breaker opens.
    pub failure_threshold: u32,
    /// Consecutive successes in half-open before the breaker closes again.
    pub success_threshold: u32,
    /// Seconds the breaker stays open before probing recovery.
    pub open_secs: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            open_secs: 30,
        }
    }
}

/// Observable breaker state, e.g. for the health endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    /// Normal operation, calls pass through.
    Closed,
    /// Too many failures, calls are skipped.
    Open,
    /// Probing recovery with a limited number of calls.
    HalfOpen,
}

impl std::fmt::Display for BreakerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BreakerState::Closed => write!(f, "closed"),
            BreakerState::Open => write!(f, "open"),
            BreakerState::HalfOpen => write!(f, "half_open"),
        }
    }
}
