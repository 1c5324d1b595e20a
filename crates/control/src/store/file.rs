//! File-backed store backend.
//!
//! The whole dataset lives in one JSON snapshot, loaded at startup and
//! rewritten after every mutation. Write volume on this path is admin
//! actions and periodic sweeps, not request traffic, so a full rewrite
//! per mutation holds up fine and keeps recovery trivial: the snapshot
//! is the state.
//!
//! The snapshot directory is created with 0700 and the snapshot file with
//! 0600; it contains session tokens and private keys.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

use atrium_common::{SessionToken, UserId};

use crate::errors::StoreError;
use crate::model::{AdminSession, CustomDomain, SslCertificate};
use crate::store::Store;

/// On-disk shape of the snapshot.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    /// Sessions keyed by token.
    sessions: HashMap<String, AdminSession>,
    /// Domains keyed by id (stringified for JSON map keys).
    domains: HashMap<Uuid, CustomDomain>,
    /// Certificates keyed by domain id.
    certificates: HashMap<Uuid, SslCertificate>,
}

/// Durable JSON-snapshot store.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    state: RwLock<Snapshot>,
}

impl FileStore {
    /// Open (or initialize) a snapshot at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    fs::set_permissions(parent, fs::Permissions::from_mode(0o700))?;
                }
            }
        }

        let state = if path.exists() {
            let content = fs::read_to_string(path)?;
            let snapshot: Snapshot = serde_json::from_str(&content)?;
            info!(
                path = %path.display(),
                sessions = snapshot.sessions.len(),
                domains = snapshot.domains.len(),
                "Loaded store snapshot"
            );
            snapshot
        } else {
            info!(path = %path.display(), "Initializing empty store snapshot");
            Snapshot::default()
        };

        let store = Self {
            path: path.to_path_buf(),
            state: RwLock::new(state),
        };
        store.persist(&store.state.read())?;
        Ok(store)
    }

    /// Write the snapshot to disk with restrictive permissions.
    fn persist(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(snapshot)?;
        fs::write(&self.path, content)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))?;
        }
        debug!(path = %self.path.display(), "Persisted store snapshot");
        Ok(())
    }

    /// Run a mutation under the write lock and persist the result.
    fn mutate<T>(
        &self,
        f: impl FnOnce(&mut Snapshot) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut state = self.state.write();
        let out = f(&mut state)?;
        self.persist(&state)?;
        Ok(out)
    }
}

#[async_trait]
impl Store for FileStore {
    async fn insert_session(&self, session: &AdminSession) -> Result<(), StoreError> {
        self.mutate(|state| {
            let key = session.token.as_str().to_string();
            if state.sessions.contains_key(&key) {
                return Err(StoreError::Conflict(
                    "session token already exists".to_string(),
                ));
            }
            state.sessions.insert(key, session.clone());
            Ok(())
        })
    }

    async fn session_by_token(
        &self,
        token: &SessionToken,
    ) -> Result<Option<AdminSession>, StoreError> {
        Ok(self.state.read().sessions.get(token.as_str()).cloned())
    }

    async fn touch_session(
        &self,
        token: &SessionToken,
        at: DateTime<Utc>,
    ) -> Result<Option<AdminSession>, StoreError> {
        self.mutate(|state| {
            Ok(state.sessions.get_mut(token.as_str()).map(|session| {
                session.last_activity = session.last_activity.max(at);
                session.clone()
            }))
        })
    }

    async fn revoke_session(
        &self,
        token: &SessionToken,
        at: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        self.mutate(|state| match state.sessions.get_mut(token.as_str()) {
            Some(session) if session.revoked_at.is_none() => {
                session.revoked_at = Some(at);
                Ok(1)
            }
            _ => Ok(0),
        })
    }

    async fn live_sessions_for_user(
        &self,
        user: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<AdminSession>, StoreError> {
        Ok(self
            .state
            .read()
            .sessions
            .values()
            .filter(|s| s.user_id == *user && s.is_live(now))
            .cloned()
            .collect())
    }

    async fn purge_dead_sessions(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        self.mutate(|state| {
            let before = state.sessions.len();
            state.sessions.retain(|_, s| s.is_live(now));
            Ok((before - state.sessions.len()) as u64)
        })
    }

    async fn insert_domain(&self, domain: &CustomDomain) -> Result<(), StoreError> {
        self.mutate(|state| {
            if state.domains.values().any(|d| d.domain == domain.domain) {
                return Err(StoreError::Conflict(format!(
                    "domain '{}' already exists",
                    domain.domain
                )));
            }
            state.domains.insert(domain.id, domain.clone());
            Ok(())
        })
    }

    async fn domain_by_id(&self, id: Uuid) -> Result<Option<CustomDomain>, StoreError> {
        Ok(self.state.read().domains.get(&id).cloned())
    }

    async fn domain_by_name(&self, name: &str) -> Result<Option<CustomDomain>, StoreError> {
        Ok(self
            .state
            .read()
            .domains
            .values()
            .find(|d| d.domain == name)
            .cloned())
    }

    async fn list_domains(&self) -> Result<Vec<CustomDomain>, StoreError> {
        Ok(self.state.read().domains.values().cloned().collect())
    }

    async fn update_domain(&self, domain: &CustomDomain) -> Result<(), StoreError> {
        self.mutate(|state| match state.domains.get_mut(&domain.id) {
            Some(entry) => {
                *entry = domain.clone();
                Ok(())
            }
            None => Err(StoreError::Missing(format!("domain {}", domain.id))),
        })
    }

    async fn upsert_certificate(&self, cert: &SslCertificate) -> Result<(), StoreError> {
        self.mutate(|state| {
            state.certificates.insert(cert.domain_id, cert.clone());
            Ok(())
        })
    }

    async fn certificate_for_domain(
        &self,
        domain_id: Uuid,
    ) -> Result<Option<SslCertificate>, StoreError> {
        Ok(self.state.read().certificates.get(&domain_id).cloned())
    }
}
