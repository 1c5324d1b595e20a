//! Durable storage for sessions, domains, and certificates.
//!
//! The store is the source of truth; the session cache in front of it is
//! a best-effort accelerator. Unique constraints (session token, domain
//! name) are enforced here and surface as [`StoreError::Conflict`] — they
//! are the only guard against concurrent duplicate writes.
//!
//! Backends are chosen once at startup from the configuration:
//!
//! - [`MemoryStore`] — volatile, for development and tests
//! - [`FileStore`] — JSON snapshot on disk, loaded at startup and
//!   persisted after every mutation

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use atrium_common::{SessionToken, UserId};

use crate::errors::StoreError;
use crate::model::{AdminSession, CustomDomain, SslCertificate};

/// Durable CRUD surface consumed by the session and domain managers.
#[async_trait]
pub trait Store: Send + Sync {
    // -------------------------------------------------------------------
    // Sessions
    // -------------------------------------------------------------------

    /// Insert a new session. Fails with [`StoreError::Conflict`] if the
    /// token already exists.
    async fn insert_session(&self, session: &AdminSession) -> Result<(), StoreError>;

    /// Look up a session by token.
    async fn session_by_token(
        &self,
        token: &SessionToken,
    ) -> Result<Option<AdminSession>, StoreError>;

    /// Refresh `last_activity` (monotonically non-decreasing) and return
    /// the updated session, or `None` if the token is unknown.
    async fn touch_session(
        &self,
        token: &SessionToken,
        at: DateTime<Utc>,
    ) -> Result<Option<AdminSession>, StoreError>;

    /// Conditionally set `revoked_at` on a not-yet-revoked session.
    /// Returns the number of rows affected (0 or 1).
    async fn revoke_session(
        &self,
        token: &SessionToken,
        at: DateTime<Utc>,
    ) -> Result<u64, StoreError>;

    /// All sessions of `user` that are neither revoked nor expired at
    /// `now`.
    async fn live_sessions_for_user(
        &self,
        user: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<AdminSession>, StoreError>;

    /// Delete every session that is expired or revoked at `now`.
    /// Returns the number of rows removed.
    async fn purge_dead_sessions(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;

    // -------------------------------------------------------------------
    // Domains
    // -------------------------------------------------------------------

    /// Insert a new domain. Fails with [`StoreError::Conflict`] if the
    /// (case-folded) name already exists.
    async fn insert_domain(&self, domain: &CustomDomain) -> Result<(), StoreError>;

    async fn domain_by_id(&self, id: Uuid) -> Result<Option<CustomDomain>, StoreError>;

    async fn domain_by_name(&self, name: &str) -> Result<Option<CustomDomain>, StoreError>;

    async fn list_domains(&self) -> Result<Vec<CustomDomain>, StoreError>;

    /// Replace an existing domain row (matched by id).
    async fn update_domain(&self, domain: &CustomDomain) -> Result<(), StoreError>;

    // -------------------------------------------------------------------
    // Certificates
    // -------------------------------------------------------------------

    /// Insert or replace the certificate bound to `domain_id` (1:1).
    async fn upsert_certificate(&self, cert: &SslCertificate) -> Result<(), StoreError>;

    async fn certificate_for_domain(
        &self,
        domain_id: Uuid,
    ) -> Result<Option<SslCertificate>, StoreError>;
}
