//! Circuit breaker guarding best-effort collaborators.
//!
//! The session cache is an accelerator, not a source of truth. When it
//! goes away, every lookup would otherwise eat a connect timeout before
//! falling back to the durable store. The breaker tracks consecutive
//! failures and, once open, short-circuits cache calls entirely until a
//! probe succeeds.
//!
//! All operations are lock-free atomics; `allows()` sits on the session
//! validation path and must stay cheap.

use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::types::{BreakerConfig, BreakerState};

const STATE_CLOSED: u8 = 0;
const STATE_OPEN: u8 = 1;
const STATE_HALF_OPEN: u8 = 2;

/// Failure-tracking circuit breaker.
///
/// States: **Closed** (calls pass), **Open** (calls are skipped),
/// **HalfOpen** (a limited probe is allowed through). Open flips to
/// HalfOpen after `open_secs`; a successful probe run closes the
/// breaker, a failed probe re-opens it.
pub struct CircuitBreaker {
    config: BreakerConfig,
    state: AtomicU8,
    consecutive_failures: AtomicU32,
    consecutive_successes: AtomicU32,
    /// Base instant for monotonic time arithmetic in atomics.
    epoch: Instant,
    /// Milliseconds since `epoch` at the last state change.
    opened_at_ms: AtomicU64,
    name: String,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            config,
            state: AtomicU8::new(STATE_CLOSED),
            consecutive_failures: AtomicU32::new(0),
            consecutive_successes: AtomicU32::new(0),
            epoch: Instant::now(),
            opened_at_ms: AtomicU64::new(0),
            name: name.into(),
        }
    }

    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    /// Whether a call should be attempted right now.
    ///
    /// Transitions Open -> HalfOpen once the open window has elapsed.
    #[inline]
    pub fn allows(&self) -> bool {
        match self.state.load(Ordering::Acquire) {
            STATE_CLOSED | STATE_HALF_OPEN => true,
            _ => {
                let opened = self.opened_at_ms.load(Ordering::Acquire);
                let open_ms = self.config.open_secs * 1000;
                if self.now_ms().saturating_sub(opened) >= open_ms {
                    if self
                        .state
                        .compare_exchange(
                            STATE_OPEN,
                            STATE_HALF_OPEN,
                            Ordering::AcqRel,
                            Ordering::Acquire,
                        )
                        .is_ok()
                    {
                        self.consecutive_successes.store(0, Ordering::Release);
                        debug!(breaker = %self.name, "Open window elapsed, probing recovery");
                    }
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Record a successful call.
    pub fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::Release);
        if self.state.load(Ordering::Acquire) == STATE_HALF_OPEN {
            let successes = self.consecutive_successes.fetch_add(1, Ordering::AcqRel) + 1;
            if successes >= self.config.success_threshold
                && self
                    .state
                    .compare_exchange(
                        STATE_HALF_OPEN,
                        STATE_CLOSED,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    )
                    .is_ok()
            {
                info!(breaker = %self.name, "Recovered, breaker closed");
            }
        }
    }

    /// Record a failed call.
    pub fn record_failure(&self) {
        self.consecutive_successes.store(0, Ordering::Release);
        let failures = self.consecutive_failures.fetch_add(1, Ordering::AcqRel) + 1;

        let state = self.state.load(Ordering::Acquire);
        let should_open = match state {
            STATE_HALF_OPEN => true,
            STATE_CLOSED => failures >= self.config.failure_threshold,
            _ => false,
        };

        if should_open
            && self
                .state
                .compare_exchange(state, STATE_OPEN, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
        {
            self.opened_at_ms.store(self.now_ms(), Ordering::Release);
            warn!(
                breaker = %self.name,
                consecutive_failures = failures,
                open_secs = self.config.open_secs,
                "Breaker opened"
            );
        }
    }

    /// Current state for observability.
    pub fn state(&self) -> BreakerState {
        match self.state.load(Ordering::Acquire) {
            STATE_OPEN => BreakerState::Open,
            STATE_HALF_OPEN => BreakerState::HalfOpen,
            _ => BreakerState::Closed,
        }
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(open_secs: u64) -> CircuitBreaker {
        CircuitBreaker::new(
            "test",
            BreakerConfig {
                failure_threshold: 3,
                success_threshold: 2,
                open_secs,
            },
        )
    }

    #[test]
    fn test_starts_closed() {
        let b = breaker(30);
        assert_eq!(b.state(), BreakerState::Closed);
        assert!(b.allows());
    }

    #[test]
    fn test_opens_after_threshold() {
        let b = breaker(30);
        b.record_failure();
        b.record_failure();
        assert_eq!(b.state(), BreakerState::Closed);
        b.record_failure();
        assert_eq!(b.state(), BreakerState::Open);
        assert!(!b.allows());
    }

    #[test]
    fn test_success_resets_failure_streak() {
        let b = breaker(30);
        b.record_failure();
        b.record_failure();
        b.record_success();
        b.record_failure();
        b.record_failure();
        assert_eq!(b.state(), BreakerState::Closed);
    }

    #[test]
    fn test_half_open_after_window_and_close_on_success() {
        let b = breaker(0);
        for _ in 0..3 {
            b.record_failure();
        }
        assert_eq!(b.state(), BreakerState::Open);

        // Zero-length open window: next check probes immediately
        assert!(b.allows());
        assert_eq!(b.state(), BreakerState::HalfOpen);

        b.record_success();
        assert_eq!(b.state(), BreakerState::HalfOpen);
        b.record_success();
        assert_eq!(b.state(), BreakerState::Closed);
    }

    #[test]
    fn test_half_open_reopens_on_failure() {
        let b = breaker(0);
        for _ in 0..3 {
            b.record_failure();
        }
        assert!(b.allows());
        assert_eq!(b.state(), BreakerState::HalfOpen);

        b.record_failure();
        assert_eq!(b.state(), BreakerState::Open);
    }
}
