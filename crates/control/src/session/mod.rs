//! Admin session lifecycle.
//!
//! Sessions are dual-written: the durable store is the source of truth,
//! the cache carries a JSON copy whose TTL equals the remaining lifetime
//! of the session. Validation prefers the cache and self-heals any
//! disagreement in favor of the store.

mod sweeper;

pub use sweeper::SessionSweeper;

use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use atrium_common::{SessionToken, UserId};

use crate::cache::ResilientCache;
use crate::errors::SessionError;
use crate::metrics::Metrics;
use crate::model::AdminSession;
use crate::store::Store;

/// Validation result label for the metrics counter.
const RESULT_OK: &str = "ok";
const RESULT_UNAUTHORIZED: &str = "unauthorized";

/// Creates, validates, and revokes admin sessions.
pub struct SessionManager {
    store: Arc<dyn Store>,
    cache: Arc<ResilientCache>,
    metrics: Arc<Metrics>,
    ttl: Duration,
    key_prefix: String,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn Store>,
        cache: Arc<ResilientCache>,
        metrics: Arc<Metrics>,
        ttl: Duration,
        key_prefix: impl Into<String>,
    ) -> Self {
        Self {
            store,
            cache,
            metrics,
            ttl,
            key_prefix: key_prefix.into(),
        }
    }

    fn cache_key(&self, token: &SessionToken) -> String {
        format!("{}{}", self.key_prefix, token.as_str())
    }

    /// Mirror a live session into the cache with its remaining TTL.
    async fn cache_put(&self, session: &AdminSession, now: DateTime<Utc>) {
        let remaining = session.remaining_secs(now);
        if remaining <= 0 {
            return;
        }
        match serde_json::to_string(session) {
            Ok(json) => {
                self.cache
                    .set(
                        &self.cache_key(&session.token),
                        &json,
                        std::time::Duration::from_secs(remaining as u64),
                    )
                    .await;
            }
            Err(e) => warn!(error = %e, "Failed to serialize session for cache"),
        }
    }

    /// Create a session for `user_id`, expiring after the configured TTL.
    ///
    /// The durable insert happens first; a crash before the cache write
    /// leaves a stale-absent entry that the next validation repopulates.
    #[instrument(skip_all, fields(user_id = %user_id))]
    pub async fn create_session(
        &self,
        user_id: UserId,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> Result<AdminSession, SessionError> {
        let now = Utc::now();
        let session = AdminSession::new(user_id, ip_address, user_agent, self.ttl, now);

        self.store.insert_session(&session).await?;
        self.cache_put(&session, now).await;

        self.metrics.sessions_created.inc();
        info!(
            session_id = %session.id,
            expires_at = %session.expires_at,
            "Created admin session"
        );
        Ok(session)
    }

    /// Validate a bearer token.
    ///
    /// Cache hit: expiry/revocation are checked locally and the cached
    /// copy's activity is bumped; the store is not consulted. Cache miss
    /// or dead cached copy: the entry is evicted and the store decides;
    /// a live durable row has its activity refreshed and is re-cached.
    #[instrument(skip_all)]
    pub async fn validate_session(
        &self,
        token: &SessionToken,
    ) -> Result<AdminSession, SessionError> {
        let now = Utc::now();
        let key = self.cache_key(token);

        if let Some(json) = self.cache.get(&key).await {
            match serde_json::from_str::<AdminSession>(&json) {
                Ok(mut session) if session.is_live(now) => {
                    self.metrics.session_cache_hits.inc();
                    session.last_activity = session.last_activity.max(now);
                    self.cache_put(&session, now).await;
                    self.metrics
                        .session_validations
                        .with_label_values(&[RESULT_OK])
                        .inc();
                    return Ok(session);
                }
                Ok(_) => {
                    debug!("Cached session is expired or revoked, evicting");
                    self.cache.del(&key).await;
                }
                Err(e) => {
                    warn!(error = %e, "Undecodable cache entry, evicting");
                    self.cache.del(&key).await;
                }
            }
        }
        self.metrics.session_cache_misses.inc();

        let Some(session) = self.store.session_by_token(token).await? else {
            self.metrics
                .session_validations
                .with_label_values(&[RESULT_UNAUTHORIZED])
                .inc();
            return Err(SessionError::Unauthorized);
        };

        if !session.is_live(now) {
            // The store is the source of truth; make sure no stale cache
            // copy outlives this verdict.
            self.cache.del(&key).await;
            self.metrics
                .session_validations
                .with_label_values(&[RESULT_UNAUTHORIZED])
                .inc();
            return Err(SessionError::Unauthorized);
        }

        let session = self
            .store
            .touch_session(token, now)
            .await?
            .unwrap_or(session);
        self.cache_put(&session, now).await;
        self.metrics
            .session_validations
            .with_label_values(&[RESULT_OK])
            .inc();
        Ok(session)
    }

    /// Revoke the session carrying `token`.
    #[instrument(skip_all)]
    pub async fn revoke_session(&self, token: &SessionToken) -> Result<(), SessionError> {
        let affected = self.store.revoke_session(token, Utc::now()).await?;
        if affected == 0 {
            return Err(SessionError::NotFound);
        }
        self.cache.del(&self.cache_key(token)).await;
        self.metrics.sessions_revoked.inc();
        info!("Revoked admin session");
        Ok(())
    }

    /// Revoke every live session of `user_id` except `keep`. Revocations
    /// fan out concurrently; the count of revoked sessions is returned.
    #[instrument(skip_all, fields(user_id = %user_id))]
    pub async fn revoke_other_sessions(
        &self,
        user_id: &UserId,
        keep: &SessionToken,
    ) -> Result<usize, SessionError> {
        let sessions = self
            .store
            .live_sessions_for_user(user_id, Utc::now())
            .await?;

        let revocations = sessions
            .iter()
            .filter(|s| s.token != *keep)
            .map(|s| self.revoke_session(&s.token));
        let results = join_all(revocations).await;

        let revoked = results.iter().filter(|r| r.is_ok()).count();
        for result in results {
            if let Err(e) = result {
                // A concurrent revocation can get here first; not fatal
                warn!(error = %e, "Fan-out revocation failed");
            }
        }

        info!(revoked, "Revoked other sessions");
        Ok(revoked)
    }

    /// Delete every expired or revoked session row. Returns the count.
    pub async fn cleanup_sessions(&self) -> Result<u64, SessionError> {
        let removed = self.store.purge_dead_sessions(Utc::now()).await?;
        if removed > 0 {
            self.metrics.sessions_purged.inc_by(removed);
            info!(removed, "Cleaned up dead sessions");
        }
        Ok(removed)
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("ttl_secs", &self.ttl.num_seconds())
            .field("key_prefix", &self.key_prefix)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::store::MemoryStore;

    fn manager() -> (SessionManager, Arc<MemoryStore>, Arc<ResilientCache>) {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(ResilientCache::new(Arc::new(MemoryCache::new())));
        let manager = SessionManager::new(
            store.clone(),
            cache.clone(),
            Arc::new(Metrics::new()),
            Duration::hours(4),
            "test:session:",
        );
        (manager, store, cache)
    }

    #[tokio::test]
    async fn test_create_then_validate_bumps_activity() {
        let (manager, _, _) = manager();
        let created = manager
            .create_session(UserId::new("42"), Some("10.1.1.1".into()), None)
            .await
            .unwrap();

        let validated = manager.validate_session(&created.token).await.unwrap();
        assert_eq!(validated.token, created.token);
        assert!(validated.last_activity >= created.last_activity);
    }

    #[tokio::test]
    async fn test_validate_unknown_token_unauthorized() {
        let (manager, _, _) = manager();
        let err = manager
            .validate_session(&SessionToken::generate())
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Unauthorized));
    }

    #[tokio::test]
    async fn test_validate_expired_session_unauthorized_and_evicts() {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(ResilientCache::new(Arc::new(MemoryCache::new())));
        let manager = SessionManager::new(
            store.clone(),
            cache.clone(),
            Arc::new(Metrics::new()),
            Duration::seconds(-1), // already expired at creation
            "test:session:",
        );

        let session = manager
            .create_session(UserId::new("42"), None, None)
            .await
            .unwrap();

        // Plant a (bogus) cache entry to prove eviction happens
        let key = format!("test:session:{}", session.token.as_str());
        cache
            .set(
                &key,
                &serde_json::to_string(&session).unwrap(),
                std::time::Duration::from_secs(60),
            )
            .await;

        let err = manager.validate_session(&session.token).await.unwrap_err();
        assert!(matches!(err, SessionError::Unauthorized));
        assert_eq!(cache.get(&key).await, None);
    }

    #[tokio::test]
    async fn test_revoke_then_validate_unauthorized() {
        let (manager, _, _) = manager();
        let session = manager
            .create_session(UserId::new("42"), None, None)
            .await
            .unwrap();

        manager.revoke_session(&session.token).await.unwrap();

        let err = manager.validate_session(&session.token).await.unwrap_err();
        assert!(matches!(err, SessionError::Unauthorized));
    }

    #[tokio::test]
    async fn test_revoke_unknown_token_not_found() {
        let (manager, _, _) = manager();
        let err = manager
            .revoke_session(&SessionToken::generate())
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::NotFound));
    }

    #[tokio::test]
    async fn test_revoke_other_sessions_spares_keeper() {
        let (manager, store, _) = manager();
        let user = UserId::new("42");

        let keep = manager
            .create_session(user.clone(), None, None)
            .await
            .unwrap();
        let other_a = manager
            .create_session(user.clone(), None, None)
            .await
            .unwrap();
        let other_b = manager
            .create_session(user.clone(), None, None)
            .await
            .unwrap();
        let bystander = manager
            .create_session(UserId::new("7"), None, None)
            .await
            .unwrap();

        let revoked = manager
            .revoke_other_sessions(&user, &keep.token)
            .await
            .unwrap();
        assert_eq!(revoked, 2);

        for token in [&other_a.token, &other_b.token] {
            let row = store.session_by_token(token).await.unwrap().unwrap();
            assert!(row.revoked_at.is_some());
        }
        let kept = store.session_by_token(&keep.token).await.unwrap().unwrap();
        assert!(kept.revoked_at.is_none());
        let untouched = store
            .session_by_token(&bystander.token)
            .await
            .unwrap()
            .unwrap();
        assert!(untouched.revoked_at.is_none());
    }

    #[tokio::test]
    async fn test_cleanup_counts_dead_rows() {
        let (manager, _, _) = manager();
        let session = manager
            .create_session(UserId::new("42"), None, None)
            .await
            .unwrap();
        manager.revoke_session(&session.token).await.unwrap();

        assert_eq!(manager.cleanup_sessions().await.unwrap(), 1);
        assert_eq!(manager.cleanup_sessions().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_cache_outage_degrades_to_store() {
        struct DownCache;

        #[async_trait::async_trait]
        impl crate::cache::Cache for DownCache {
            async fn get(&self, _: &str) -> Result<Option<String>, crate::errors::CacheError> {
                Err(crate::errors::CacheError::Backend("down".into()))
            }
            async fn set(
                &self,
                _: &str,
                _: &str,
                _: std::time::Duration,
            ) -> Result<(), crate::errors::CacheError> {
                Err(crate::errors::CacheError::Backend("down".into()))
            }
            async fn del(&self, _: &str) -> Result<(), crate::errors::CacheError> {
                Err(crate::errors::CacheError::Backend("down".into()))
            }
        }

        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(ResilientCache::new(Arc::new(DownCache)));
        let manager = SessionManager::new(
            store,
            cache,
            Arc::new(Metrics::new()),
            Duration::hours(1),
            "test:session:",
        );

        let session = manager
            .create_session(UserId::new("42"), None, None)
            .await
            .unwrap();
        // Validation succeeds purely off the durable store
        let validated = manager.validate_session(&session.token).await.unwrap();
        assert_eq!(validated.id, session.id);
    }
}
