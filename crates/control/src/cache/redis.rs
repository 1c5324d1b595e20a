//! Redis cache backend.
//!
//! Uses a [`ConnectionManager`], which multiplexes one connection and
//! reconnects on its own; there is no hand-rolled reconnect timer here.
//! Transport failures surface as [`CacheError::Backend`] and are absorbed
//! by the resilient wrapper.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::{debug, info};

use crate::cache::Cache;
use crate::errors::CacheError;

/// Shared session cache over redis.
pub struct RedisCache {
    manager: ConnectionManager,
}

impl RedisCache {
    /// Connect to `url` (redis:// or rediss://).
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url)?;
        let manager = ConnectionManager::new(client).await?;
        info!("Connected session cache to redis");
        Ok(Self { manager })
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.manager.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        // Redis EX rejects 0; the managers never cache already-expired
        // entries, so flooring at 1s only guards rounding.
        let ttl_secs = ttl.as_secs().max(1);
        let mut conn = self.manager.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl_secs).await?;
        debug!(ttl_secs, "Cached entry in redis");
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.manager.clone();
        conn.del::<_, ()>(key).await?;
        Ok(())
    }
}

impl std::fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCache").finish()
    }
}
