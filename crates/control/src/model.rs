//! Control plane records: admin sessions, custom domains, certificates.
//!
//! These are the durable shapes; the store backends persist them as-is
//! and the session cache carries a JSON copy of [`AdminSession`].

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use atrium_common::{OrgId, SessionToken, UserId};

/// Server-side record granting elevated access, identified by an opaque
/// bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminSession {
    pub id: Uuid,
    pub user_id: UserId,
    pub token: SessionToken,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub last_activity: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl AdminSession {
    /// Build a fresh session expiring `ttl` from `now`.
    pub fn new(
        user_id: UserId,
        ip_address: Option<String>,
        user_agent: Option<String>,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            token: SessionToken::generate(),
            ip_address,
            user_agent,
            expires_at: now + ttl,
            revoked_at: None,
            last_activity: now,
            created_at: now,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    /// Usable: neither expired nor revoked.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        !self.is_expired(now) && !self.is_revoked()
    }

    /// Seconds of validity left, for the cache entry's TTL.
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_seconds()
    }
}

/// Verification lifecycle of a custom domain.
///
/// `Pending` is the admission state; a verification attempt moves the
/// domain to `Verified` or `Failed`. `Failed` domains may be retried;
/// `Verified` is sticky and is never downgraded automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DomainStatus {
    Pending,
    Verified,
    Failed,
}

impl std::fmt::Display for DomainStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DomainStatus::Pending => write!(f, "PENDING"),
            DomainStatus::Verified => write!(f, "VERIFIED"),
            DomainStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// Tenant-supplied hostname requiring DNS ownership proof.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomDomain {
    pub id: Uuid,
    /// Case-folded hostname; unique across the platform.
    pub domain: String,
    pub organization_id: OrgId,
    pub status: DomainStatus,
    /// Token the tenant publishes in a TXT record.
    pub verification_token: String,
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl CustomDomain {
    pub fn new(domain: String, organization_id: OrgId, verification_token: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            domain,
            organization_id,
            status: DomainStatus::Pending,
            verification_token,
            verified_at: None,
            created_at: Utc::now(),
        }
    }

    /// The exact TXT record value that proves ownership.
    pub fn expected_txt_record(&self, prefix: &str) -> String {
        format!("{prefix}-verification={}", self.verification_token)
    }
}

/// Certificate record status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CertificateStatus {
    Active,
    Expired,
    Revoked,
}

/// Issued certificate material bound 1:1 to a custom domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SslCertificate {
    pub id: Uuid,
    /// Unique: at most one certificate row per domain.
    pub domain_id: Uuid,
    pub certificate_pem: String,
    pub private_key_pem: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: CertificateStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(ttl_secs: i64) -> AdminSession {
        AdminSession::new(
            UserId::new("user-1"),
            Some("10.0.0.1".into()),
            Some("cli/1.0".into()),
            Duration::seconds(ttl_secs),
            Utc::now(),
        )
    }

    #[test]
    fn test_fresh_session_is_live() {
        let s = session(60);
        assert!(s.is_live(Utc::now()));
        assert!(!s.is_expired(Utc::now()));
        assert!(!s.is_revoked());
    }

    #[test]
    fn test_expiry() {
        let s = session(-1);
        assert!(s.is_expired(Utc::now()));
        assert!(!s.is_live(Utc::now()));
    }

    #[test]
    fn test_revocation_kills_liveness() {
        let mut s = session(60);
        s.revoked_at = Some(Utc::now());
        assert!(!s.is_live(Utc::now()));
    }

    #[test]
    fn test_remaining_secs_tracks_expiry() {
        let s = session(120);
        let remaining = s.remaining_secs(Utc::now());
        assert!(remaining > 110 && remaining <= 120);
    }

    #[test]
    fn test_expected_txt_record() {
        let d = CustomDomain::new("example.com".into(), OrgId::new("org-1"), "abc123".into());
        assert_eq!(
            d.expected_txt_record("saasqali"),
            "saasqali-verification=abc123"
        );
    }

    #[test]
    fn test_domain_status_serde_shape() {
        let json = serde_json::to_string(&DomainStatus::Verified).unwrap();
        assert_eq!(json, "\"VERIFIED\"");
    }
}
