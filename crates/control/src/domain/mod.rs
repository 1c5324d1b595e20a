//! Custom domain admission and verification.
//!
//! A domain enters as `Pending` with a fresh verification token. A
//! verification attempt checks for the exact TXT record
//! `<prefix>-verification=<token>`; proof moves the domain to `Verified`
//! (provisioning a certificate first when SSL is enabled), anything else
//! moves it to `Failed`. `Failed` and `Pending` domains may be retried;
//! `Verified` is sticky.

mod dns;
mod health;

pub use dns::{HickoryTxtResolver, StaticTxtResolver, TxtResolver};
pub use health::DomainHealthChecker;

use chrono::Utc;
use rand::RngCore;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use atrium_common::OrgId;

use crate::errors::DomainError;
use crate::metrics::Metrics;
use crate::model::{CertificateStatus, CustomDomain, DomainStatus, SslCertificate};
use crate::store::Store;
use crate::tls::CertificateIssuer;

/// Verification outcome labels for the metrics counter.
const OUTCOME_VERIFIED: &str = "verified";
const OUTCOME_FAILED: &str = "failed";

/// Length of the random ownership token, in bytes (hex-encoded to 32
/// characters for the TXT record).
const VERIFICATION_TOKEN_BYTES: usize = 16;

/// Feature switches for domain handling, resolved once at startup.
#[derive(Debug, Clone, Copy)]
pub struct DomainFlags {
    pub allow_wildcard: bool,
    pub allow_ssl: bool,
}

/// Drives custom domains through the verification lifecycle.
pub struct DomainManager {
    store: Arc<dyn Store>,
    resolver: Arc<dyn TxtResolver>,
    issuer: Arc<dyn CertificateIssuer>,
    metrics: Arc<Metrics>,
    flags: DomainFlags,
    verification_prefix: String,
}

impl DomainManager {
    pub fn new(
        store: Arc<dyn Store>,
        resolver: Arc<dyn TxtResolver>,
        issuer: Arc<dyn CertificateIssuer>,
        metrics: Arc<Metrics>,
        flags: DomainFlags,
        verification_prefix: impl Into<String>,
    ) -> Self {
        Self {
            store,
            resolver,
            issuer,
            metrics,
            flags,
            verification_prefix: verification_prefix.into(),
        }
    }

    /// Register a new domain for `org`, in `Pending` state.
    ///
    /// The name is case-folded before the uniqueness check; wildcard
    /// names require the wildcard flag.
    #[instrument(skip_all, fields(org = %org))]
    pub async fn add_domain(&self, org: OrgId, name: &str) -> Result<CustomDomain, DomainError> {
        let name = name.trim().to_ascii_lowercase();
        validate_domain_name(&name)?;

        if name.starts_with("*.") && !self.flags.allow_wildcard {
            return Err(DomainError::WildcardForbidden);
        }

        let mut token = [0u8; VERIFICATION_TOKEN_BYTES];
        rand::thread_rng().fill_bytes(&mut token);
        let domain = CustomDomain::new(name, org, hex::encode(token));

        self.store.insert_domain(&domain).await?;
        info!(
            domain = %domain.domain,
            domain_id = %domain.id,
            "Registered custom domain"
        );
        Ok(domain)
    }

    pub async fn domain(&self, id: Uuid) -> Result<CustomDomain, DomainError> {
        self.store
            .domain_by_id(id)
            .await?
            .ok_or(DomainError::NotFound)
    }

    pub async fn list_domains(&self) -> Result<Vec<CustomDomain>, DomainError> {
        Ok(self.store.list_domains().await?)
    }

    pub async fn certificate_for(
        &self,
        domain_id: Uuid,
    ) -> Result<Option<SslCertificate>, DomainError> {
        Ok(self.store.certificate_for_domain(domain_id).await?)
    }

    /// Run one verification attempt for the domain.
    ///
    /// An already-`Verified` domain is returned unchanged: there is no
    /// downgrade path, and certificates are not re-issued here.
    #[instrument(skip_all, fields(domain_id = %id))]
    pub async fn verify_domain(&self, id: Uuid) -> Result<CustomDomain, DomainError> {
        let domain = self
            .store
            .domain_by_id(id)
            .await?
            .ok_or(DomainError::NotFound)?;

        if domain.status == DomainStatus::Verified {
            info!(domain = %domain.domain, "Domain already verified, skipping");
            return Ok(domain);
        }

        if !self.dns_proof_present(&domain).await {
            return self.conclude(domain, DomainStatus::Failed).await;
        }

        if self.flags.allow_ssl {
            match self.issuer.provision(&domain.domain).await {
                Ok(issued) => {
                    let cert = SslCertificate {
                        id: Uuid::new_v4(),
                        domain_id: domain.id,
                        certificate_pem: issued.certificate_pem,
                        private_key_pem: issued.private_key_pem,
                        issued_at: issued.issued_at,
                        expires_at: issued.expires_at,
                        status: CertificateStatus::Active,
                    };
                    self.store.upsert_certificate(&cert).await?;
                    self.metrics.certificates_issued.inc();
                    self.conclude(domain, DomainStatus::Verified).await
                }
                Err(e) => {
                    // A failed issuance overrides the successful DNS proof
                    warn!(
                        domain = %domain.domain,
                        error = %e,
                        "Certificate provisioning failed, marking domain failed"
                    );
                    self.metrics.certificate_failures.inc();
                    self.conclude(domain, DomainStatus::Failed).await
                }
            }
        } else {
            self.conclude(domain, DomainStatus::Verified).await
        }
    }

    /// Check whether the expected TXT record is published.
    async fn dns_proof_present(&self, domain: &CustomDomain) -> bool {
        let expected = domain.expected_txt_record(&self.verification_prefix);
        match self.resolver.resolve_txt(&domain.domain).await {
            Ok(records) => records.iter().any(|record| *record == expected),
            Err(e) => {
                warn!(
                    domain = %domain.domain,
                    error = %e,
                    "TXT lookup failed during verification"
                );
                false
            }
        }
    }

    /// Persist a terminal verification outcome.
    async fn conclude(
        &self,
        mut domain: CustomDomain,
        status: DomainStatus,
    ) -> Result<CustomDomain, DomainError> {
        domain.status = status;
        let outcome = match status {
            DomainStatus::Verified => {
                domain.verified_at = Some(Utc::now());
                OUTCOME_VERIFIED
            }
            _ => OUTCOME_FAILED,
        };
        self.store.update_domain(&domain).await?;
        self.metrics
            .domain_verifications
            .with_label_values(&[outcome])
            .inc();
        info!(
            domain = %domain.domain,
            status = %domain.status,
            "Domain verification concluded"
        );
        Ok(domain)
    }

    pub(crate) fn verification_prefix(&self) -> &str {
        &self.verification_prefix
    }
}

impl std::fmt::Debug for DomainManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DomainManager")
            .field("flags", &self.flags)
            .field("verification_prefix", &self.verification_prefix)
            .finish()
    }
}

/// Syntactic validation of a (case-folded) hostname.
fn validate_domain_name(name: &str) -> Result<(), DomainError> {
    let candidate = name.strip_prefix("*.").unwrap_or(name);

    let well_formed = !candidate.is_empty()
        && candidate.len() <= 253
        && candidate.contains('.')
        && candidate.split('.').all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-')
        });

    if well_formed {
        Ok(())
    } else {
        Err(DomainError::InvalidName(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::IssuerError;
    use crate::store::MemoryStore;
    use crate::tls::IssuedCertificate;
    use async_trait::async_trait;
    use chrono::Duration;

    /// Issuer double: succeeds with canned material or fails on demand.
    struct FakeIssuer {
        fail: bool,
    }

    #[async_trait]
    impl CertificateIssuer for FakeIssuer {
        async fn provision(&self, domain: &str) -> Result<IssuedCertificate, IssuerError> {
            if self.fail {
                return Err(IssuerError::Order("CA unreachable".into()));
            }
            let issued_at = Utc::now();
            Ok(IssuedCertificate {
                certificate_pem: format!("cert for {domain}"),
                private_key_pem: "key".into(),
                issued_at,
                expires_at: issued_at + Duration::days(90),
            })
        }
    }

    struct Fixture {
        manager: DomainManager,
        store: Arc<MemoryStore>,
    }

    fn fixture(resolver: StaticTxtResolver, allow_ssl: bool, issuer_fails: bool) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let manager = DomainManager::new(
            store.clone(),
            Arc::new(resolver),
            Arc::new(FakeIssuer { fail: issuer_fails }),
            Arc::new(Metrics::new()),
            DomainFlags {
                allow_wildcard: false,
                allow_ssl,
            },
            "saasqali",
        );
        Fixture { manager, store }
    }

    async fn pending_domain(f: &Fixture, name: &str, token: &str) -> CustomDomain {
        let domain = CustomDomain::new(name.into(), OrgId::new("org-1"), token.into());
        f.store.insert_domain(&domain).await.unwrap();
        domain
    }

    #[tokio::test]
    async fn test_matching_txt_without_ssl_verifies() {
        let resolver = StaticTxtResolver::new()
            .with_records("example.com", &["saasqali-verification=abc123"]);
        let f = fixture(resolver, false, false);
        let domain = pending_domain(&f, "example.com", "abc123").await;

        let verified = f.manager.verify_domain(domain.id).await.unwrap();
        assert_eq!(verified.status, DomainStatus::Verified);
        assert!(verified.verified_at.is_some());
        // SSL disabled: no certificate row
        assert!(f
            .store
            .certificate_for_domain(domain.id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_no_matching_txt_fails() {
        let resolver = StaticTxtResolver::new()
            .with_records("example.com", &["saasqali-verification=other", "v=spf1"]);
        let f = fixture(resolver, false, false);
        let domain = pending_domain(&f, "example.com", "abc123").await;

        let failed = f.manager.verify_domain(domain.id).await.unwrap();
        assert_eq!(failed.status, DomainStatus::Failed);
        assert!(failed.verified_at.is_none());
    }

    #[tokio::test]
    async fn test_dns_error_fails_verification() {
        let f = fixture(StaticTxtResolver::failing("SERVFAIL"), false, false);
        let domain = pending_domain(&f, "example.com", "abc123").await;

        let failed = f.manager.verify_domain(domain.id).await.unwrap();
        assert_eq!(failed.status, DomainStatus::Failed);
    }

    #[tokio::test]
    async fn test_ssl_path_stores_certificate_with_90_day_window() {
        let resolver = StaticTxtResolver::new()
            .with_records("example.com", &["saasqali-verification=abc123"]);
        let f = fixture(resolver, true, false);
        let domain = pending_domain(&f, "example.com", "abc123").await;

        let verified = f.manager.verify_domain(domain.id).await.unwrap();
        assert_eq!(verified.status, DomainStatus::Verified);

        let cert = f
            .store
            .certificate_for_domain(domain.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cert.status, CertificateStatus::Active);
        assert_eq!(cert.expires_at - cert.issued_at, Duration::days(90));
    }

    #[tokio::test]
    async fn test_issuer_failure_overrides_dns_success() {
        let resolver = StaticTxtResolver::new()
            .with_records("example.com", &["saasqali-verification=abc123"]);
        let f = fixture(resolver, true, true);
        let domain = pending_domain(&f, "example.com", "abc123").await;

        let failed = f.manager.verify_domain(domain.id).await.unwrap();
        assert_eq!(failed.status, DomainStatus::Failed);
        assert!(f
            .store
            .certificate_for_domain(domain.id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_verified_domain_is_sticky() {
        // Resolver now answers nothing, but the domain is already verified
        let f = fixture(StaticTxtResolver::new(), false, false);
        let mut domain = pending_domain(&f, "example.com", "abc123").await;
        domain.status = DomainStatus::Verified;
        domain.verified_at = Some(Utc::now());
        f.store.update_domain(&domain).await.unwrap();

        let still = f.manager.verify_domain(domain.id).await.unwrap();
        assert_eq!(still.status, DomainStatus::Verified);
    }

    #[tokio::test]
    async fn test_failed_domain_can_retry_to_verified() {
        let resolver = StaticTxtResolver::new()
            .with_records("example.com", &["saasqali-verification=abc123"]);
        let f = fixture(resolver, false, false);
        let mut domain = pending_domain(&f, "example.com", "abc123").await;
        domain.status = DomainStatus::Failed;
        f.store.update_domain(&domain).await.unwrap();

        let verified = f.manager.verify_domain(domain.id).await.unwrap();
        assert_eq!(verified.status, DomainStatus::Verified);
    }

    #[tokio::test]
    async fn test_verify_unknown_domain_not_found() {
        let f = fixture(StaticTxtResolver::new(), false, false);
        assert!(matches!(
            f.manager.verify_domain(Uuid::new_v4()).await.unwrap_err(),
            DomainError::NotFound
        ));
    }

    #[tokio::test]
    async fn test_add_domain_case_folds_and_uniques() {
        let f = fixture(StaticTxtResolver::new(), false, false);
        let added = f
            .manager
            .add_domain(OrgId::new("org-1"), "App.Example.COM")
            .await
            .unwrap();
        assert_eq!(added.domain, "app.example.com");
        assert_eq!(added.status, DomainStatus::Pending);
        assert_eq!(added.verification_token.len(), 32);

        let err = f
            .manager
            .add_domain(OrgId::new("org-2"), "app.example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Store(_)));
    }

    #[tokio::test]
    async fn test_wildcard_requires_flag() {
        let f = fixture(StaticTxtResolver::new(), false, false);
        assert!(matches!(
            f.manager
                .add_domain(OrgId::new("org-1"), "*.example.com")
                .await
                .unwrap_err(),
            DomainError::WildcardForbidden
        ));
    }

    #[tokio::test]
    async fn test_invalid_names_rejected() {
        let f = fixture(StaticTxtResolver::new(), false, false);
        for bad in ["", "nodot", "-bad.example.com", "exa mple.com", "a..b"] {
            assert!(
                matches!(
                    f.manager
                        .add_domain(OrgId::new("org-1"), bad)
                        .await
                        .unwrap_err(),
                    DomainError::InvalidName(_)
                ),
                "expected InvalidName for {bad:?}"
            );
        }
    }
}
