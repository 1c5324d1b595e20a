//! Session cache: a TTL'd key/value accelerator in front of the store.
//!
//! The cache is never the source of truth. Entries carry the same
//! remaining TTL as the durable expiry so a cache hit can be validated
//! locally without opening a stale-validity window. Backends:
//!
//! - [`MemoryCache`] — in-process map with per-entry expiry
//! - [`RedisCache`] — shared cache over a managed redis connection
//!
//! [`ResilientCache`] wraps a backend with a circuit breaker: a cache
//! outage degrades every operation to a miss/no-op instead of an error,
//! and the breaker stops paying connect timeouts while the backend is
//! down.

mod memory;
mod redis;

pub use self::redis::RedisCache;
pub use memory::MemoryCache;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use atrium_common::{BreakerConfig, BreakerState, CircuitBreaker};

use crate::errors::CacheError;

/// Key/value cache with per-entry TTL over JSON string values.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    async fn del(&self, key: &str) -> Result<(), CacheError>;
}

/// Breaker-guarded cache facade with degrade-to-miss semantics.
///
/// Callers never see a cache error: `get` answers `None`, `set`/`del`
/// become no-ops. Failures and recoveries are visible in logs and in the
/// breaker state exported on the health endpoint.
pub struct ResilientCache {
    inner: Arc<dyn Cache>,
    breaker: CircuitBreaker,
}

impl ResilientCache {
    pub fn new(inner: Arc<dyn Cache>) -> Self {
        Self::with_breaker_config(inner, BreakerConfig::default())
    }

    pub fn with_breaker_config(inner: Arc<dyn Cache>, config: BreakerConfig) -> Self {
        Self {
            inner,
            breaker: CircuitBreaker::new("session-cache", config),
        }
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        if !self.breaker.allows() {
            return None;
        }
        match self.inner.get(key).await {
            Ok(value) => {
                self.breaker.record_success();
                value
            }
            Err(e) => {
                self.breaker.record_failure();
                warn!(error = %e, "Cache get failed, degrading to store lookup");
                None
            }
        }
    }

    pub async fn set(&self, key: &str, value: &str, ttl: Duration) {
        if !self.breaker.allows() {
            return;
        }
        match self.inner.set(key, value, ttl).await {
            Ok(()) => self.breaker.record_success(),
            Err(e) => {
                self.breaker.record_failure();
                warn!(error = %e, "Cache set failed, entry not cached");
            }
        }
    }

    pub async fn del(&self, key: &str) {
        if !self.breaker.allows() {
            debug!("Cache delete skipped, breaker open");
            return;
        }
        match self.inner.del(key).await {
            Ok(()) => self.breaker.record_success(),
            Err(e) => {
                self.breaker.record_failure();
                warn!(error = %e, "Cache delete failed");
            }
        }
    }

    /// Breaker state for the health endpoint.
    pub fn breaker_state(&self) -> BreakerState {
        self.breaker.state()
    }
}

impl std::fmt::Debug for ResilientCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientCache")
            .field("breaker", &self.breaker.state())
            .finish()
    }
}
