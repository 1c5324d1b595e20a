//! In-memory store backend.
//!
//! Lock-free maps keyed the way the queries read: sessions by token,
//! domains by id with a name index, certificates by domain id.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

use atrium_common::{SessionToken, UserId};

use crate::errors::StoreError;
use crate::model::{AdminSession, CustomDomain, SslCertificate};
use crate::store::Store;

/// Volatile store for development and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    sessions: DashMap<String, AdminSession>,
    domains: DashMap<Uuid, CustomDomain>,
    /// Case-folded name -> domain id; the unique-name constraint.
    domain_names: DashMap<String, Uuid>,
    certificates: DashMap<Uuid, SslCertificate>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_session(&self, session: &AdminSession) -> Result<(), StoreError> {
        let key = session.token.as_str().to_string();
        match self.sessions.entry(key) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(StoreError::Conflict(
                "session token already exists".to_string(),
            )),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(session.clone());
                Ok(())
            }
        }
    }

    async fn session_by_token(
        &self,
        token: &SessionToken,
    ) -> Result<Option<AdminSession>, StoreError> {
        Ok(self.sessions.get(token.as_str()).map(|s| s.clone()))
    }

    async fn touch_session(
        &self,
        token: &SessionToken,
        at: DateTime<Utc>,
    ) -> Result<Option<AdminSession>, StoreError> {
        Ok(self.sessions.get_mut(token.as_str()).map(|mut entry| {
            entry.last_activity = entry.last_activity.max(at);
            entry.clone()
        }))
    }

    async fn revoke_session(
        &self,
        token: &SessionToken,
        at: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        match self.sessions.get_mut(token.as_str()) {
            Some(mut entry) if entry.revoked_at.is_none() => {
                entry.revoked_at = Some(at);
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn live_sessions_for_user(
        &self,
        user: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<AdminSession>, StoreError> {
        Ok(self
            .sessions
            .iter()
            .filter(|entry| entry.user_id == *user && entry.is_live(now))
            .map(|entry| entry.clone())
            .collect())
    }

    async fn purge_dead_sessions(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let before = self.sessions.len();
        self.sessions
            .retain(|_, session| session.is_live(now));
        let removed = (before - self.sessions.len()) as u64;
        if removed > 0 {
            debug!(removed, "Purged dead sessions");
        }
        Ok(removed)
    }

    async fn insert_domain(&self, domain: &CustomDomain) -> Result<(), StoreError> {
        match self.domain_names.entry(domain.domain.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(StoreError::Conflict(format!(
                "domain '{}' already exists",
                domain.domain
            ))),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(domain.id);
                self.domains.insert(domain.id, domain.clone());
                Ok(())
            }
        }
    }

    async fn domain_by_id(&self, id: Uuid) -> Result<Option<CustomDomain>, StoreError> {
        Ok(self.domains.get(&id).map(|d| d.clone()))
    }

    async fn domain_by_name(&self, name: &str) -> Result<Option<CustomDomain>, StoreError> {
        let id = match self.domain_names.get(name) {
            Some(id) => *id,
            None => return Ok(None),
        };
        Ok(self.domains.get(&id).map(|d| d.clone()))
    }

    async fn list_domains(&self) -> Result<Vec<CustomDomain>, StoreError> {
        Ok(self.domains.iter().map(|d| d.clone()).collect())
    }

    async fn update_domain(&self, domain: &CustomDomain) -> Result<(), StoreError> {
        match self.domains.get_mut(&domain.id) {
            Some(mut entry) => {
                *entry = domain.clone();
                Ok(())
            }
            None => Err(StoreError::Missing(format!("domain {}", domain.id))),
        }
    }

    async fn upsert_certificate(&self, cert: &SslCertificate) -> Result<(), StoreError> {
        self.certificates.insert(cert.domain_id, cert.clone());
        Ok(())
    }

    async fn certificate_for_domain(
        &self,
        domain_id: Uuid,
    ) -> Result<Option<SslCertificate>, StoreError> {
        Ok(self.certificates.get(&domain_id).map(|c| c.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atrium_common::OrgId;
    use chrono::Duration;

    fn session(user: &str, ttl_secs: i64) -> AdminSession {
        AdminSession::new(
            UserId::new(user),
            None,
            None,
            Duration::seconds(ttl_secs),
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_session_roundtrip() {
        let store = MemoryStore::new();
        let s = session("u1", 60);
        store.insert_session(&s).await.unwrap();

        let loaded = store.session_by_token(&s.token).await.unwrap().unwrap();
        assert_eq!(loaded.id, s.id);
        assert_eq!(loaded.user_id, s.user_id);
    }

    #[tokio::test]
    async fn test_duplicate_token_conflicts() {
        let store = MemoryStore::new();
        let s = session("u1", 60);
        store.insert_session(&s).await.unwrap();
        let err = store.insert_session(&s).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_touch_is_monotonic() {
        let store = MemoryStore::new();
        let s = session("u1", 60);
        store.insert_session(&s).await.unwrap();

        let later = Utc::now() + Duration::seconds(5);
        let touched = store.touch_session(&s.token, later).await.unwrap().unwrap();
        assert_eq!(touched.last_activity, later);

        // An earlier timestamp never rolls activity back
        let earlier = later - Duration::seconds(60);
        let touched = store
            .touch_session(&s.token, earlier)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(touched.last_activity, later);
    }

    #[tokio::test]
    async fn test_revoke_affects_once() {
        let store = MemoryStore::new();
        let s = session("u1", 60);
        store.insert_session(&s).await.unwrap();

        assert_eq!(store.revoke_session(&s.token, Utc::now()).await.unwrap(), 1);
        assert_eq!(store.revoke_session(&s.token, Utc::now()).await.unwrap(), 0);
        assert_eq!(
            store
                .revoke_session(&SessionToken::generate(), Utc::now())
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_live_sessions_filters_dead() {
        let store = MemoryStore::new();
        let live = session("u1", 60);
        let expired = session("u1", -10);
        let mut revoked = session("u1", 60);
        revoked.revoked_at = Some(Utc::now());
        let other_user = session("u2", 60);

        for s in [&live, &expired, &revoked, &other_user] {
            store.insert_session(s).await.unwrap();
        }

        let found = store
            .live_sessions_for_user(&UserId::new("u1"), Utc::now())
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, live.id);
    }

    #[tokio::test]
    async fn test_purge_removes_expired_and_revoked() {
        let store = MemoryStore::new();
        let live = session("u1", 60);
        let expired = session("u1", -10);
        let mut revoked = session("u2", 60);
        revoked.revoked_at = Some(Utc::now());

        for s in [&live, &expired, &revoked] {
            store.insert_session(s).await.unwrap();
        }

        let removed = store.purge_dead_sessions(Utc::now()).await.unwrap();
        assert_eq!(removed, 2);
        assert!(store
            .session_by_token(&live.token)
            .await
            .unwrap()
            .is_some());
        assert!(store
            .session_by_token(&expired.token)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_domain_unique_name() {
        let store = MemoryStore::new();
        let d = CustomDomain::new("example.com".into(), OrgId::new("org-1"), "tok".into());
        store.insert_domain(&d).await.unwrap();

        let dup = CustomDomain::new("example.com".into(), OrgId::new("org-2"), "tok2".into());
        assert!(matches!(
            store.insert_domain(&dup).await.unwrap_err(),
            StoreError::Conflict(_)
        ));

        assert!(store
            .domain_by_name("example.com")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_update_missing_domain_fails() {
        let store = MemoryStore::new();
        let d = CustomDomain::new("example.com".into(), OrgId::new("org-1"), "tok".into());
        assert!(matches!(
            store.update_domain(&d).await.unwrap_err(),
            StoreError::Missing(_)
        ));
    }

    #[tokio::test]
    async fn test_certificate_upsert_replaces() {
        let store = MemoryStore::new();
        let domain_id = Uuid::new_v4();
        let mut cert = SslCertificate {
            id: Uuid::new_v4(),
            domain_id,
            certificate_pem: "a".into(),
            private_key_pem: "k".into(),
            issued_at: Utc::now(),
            expires_at: Utc::now() + Duration::days(90),
            status: crate::model::CertificateStatus::Active,
        };
        store.upsert_certificate(&cert).await.unwrap();

        cert.certificate_pem = "b".into();
        store.upsert_certificate(&cert).await.unwrap();

        let loaded = store
            .certificate_for_domain(domain_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.certificate_pem, "b");
    }
}
