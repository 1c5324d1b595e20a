//! Periodic health sweep over verified domains.
//!
//! The sweep re-checks the TXT proof of each `Verified` domain and the
//! expiry window of its certificate. Regressions are logged and counted,
//! and certificates past their expiry are flipped to `Expired`, but a
//! verified domain is never downgraded here. Domains are visited
//! sequentially to bound outbound DNS concurrency.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::metrics::Metrics;
use crate::model::{CertificateStatus, DomainStatus};
use crate::store::Store;

use super::TxtResolver;

/// Warn when a certificate has less than this many days left.
const CERT_EXPIRY_WARN_DAYS: i64 = 30;

/// Background checker for verified domains.
pub struct DomainHealthChecker {
    store: Arc<dyn Store>,
    resolver: Arc<dyn TxtResolver>,
    metrics: Arc<Metrics>,
    verification_prefix: String,
    check_interval: Duration,
    shutdown: CancellationToken,
}

impl DomainHealthChecker {
    pub fn new(
        store: Arc<dyn Store>,
        resolver: Arc<dyn TxtResolver>,
        metrics: Arc<Metrics>,
        verification_prefix: impl Into<String>,
        check_interval: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            store,
            resolver,
            metrics,
            verification_prefix: verification_prefix.into(),
            check_interval,
            shutdown,
        }
    }

    /// Run until the shutdown token fires.
    pub async fn run(self) {
        info!(
            check_interval_secs = self.check_interval.as_secs(),
            "Starting domain health checker"
        );

        let mut ticker = interval(self.check_interval);
        ticker.tick().await; // skip the immediate first tick

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("Domain health checker stopping");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep().await {
                        error!(error = %e, "Domain health sweep failed");
                    }
                }
            }
        }
    }

    /// One pass over all verified domains.
    pub async fn sweep(&self) -> Result<(), crate::errors::StoreError> {
        let domains = self.store.list_domains().await?;
        let verified: Vec<_> = domains
            .into_iter()
            .filter(|d| d.status == DomainStatus::Verified)
            .collect();

        debug!(domains = verified.len(), "Running domain health sweep");

        // Sequential on purpose: one outbound lookup at a time
        for domain in verified {
            self.check_txt_proof(&domain).await;
            self.check_certificate(&domain).await?;

            if self.shutdown.is_cancelled() {
                break;
            }
        }

        Ok(())
    }

    async fn check_txt_proof(&self, domain: &crate::model::CustomDomain) {
        let expected = domain.expected_txt_record(&self.verification_prefix);
        match self.resolver.resolve_txt(&domain.domain).await {
            Ok(records) if records.iter().any(|r| *r == expected) => {
                debug!(domain = %domain.domain, "TXT proof still present");
            }
            Ok(_) => {
                // Status intentionally untouched: no automatic downgrade
                warn!(
                    domain = %domain.domain,
                    "Verified domain lost its TXT proof"
                );
                self.metrics.health_regressions.inc();
            }
            Err(e) => {
                warn!(
                    domain = %domain.domain,
                    error = %e,
                    "TXT health check failed"
                );
                self.metrics.health_regressions.inc();
            }
        }
    }

    async fn check_certificate(
        &self,
        domain: &crate::model::CustomDomain,
    ) -> Result<(), crate::errors::StoreError> {
        let Some(mut cert) = self.store.certificate_for_domain(domain.id).await? else {
            return Ok(());
        };

        let now = Utc::now();
        if cert.expires_at <= now {
            if cert.status == CertificateStatus::Active {
                warn!(
                    domain = %domain.domain,
                    expired_at = %cert.expires_at,
                    "Certificate expired"
                );
                cert.status = CertificateStatus::Expired;
                self.store.upsert_certificate(&cert).await?;
                self.metrics.health_regressions.inc();
            }
        } else {
            // Prefer the notAfter clients actually enforce over the
            // recorded window, when the PEM parses.
            let effective_expiry =
                crate::tls::embedded_expiry(&cert.certificate_pem).unwrap_or(cert.expires_at);
            let days_left = (effective_expiry.min(cert.expires_at) - now).num_days();
            if days_left < CERT_EXPIRY_WARN_DAYS {
                warn!(
                    domain = %domain.domain,
                    days_left,
                    "Certificate expires soon"
                );
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::StaticTxtResolver;
    use crate::model::{CustomDomain, SslCertificate};
    use crate::store::MemoryStore;
    use atrium_common::OrgId;
    use chrono::Duration as ChronoDuration;
    use uuid::Uuid;

    fn checker(store: Arc<MemoryStore>, resolver: StaticTxtResolver) -> DomainHealthChecker {
        DomainHealthChecker::new(
            store,
            Arc::new(resolver),
            Arc::new(Metrics::new()),
            "atrium",
            Duration::from_secs(3600),
            CancellationToken::new(),
        )
    }

    async fn verified_domain(store: &MemoryStore, name: &str, token: &str) -> CustomDomain {
        let mut domain = CustomDomain::new(name.into(), OrgId::new("org-1"), token.into());
        domain.status = DomainStatus::Verified;
        domain.verified_at = Some(Utc::now());
        store.insert_domain(&domain).await.unwrap();
        domain
    }

    #[tokio::test]
    async fn test_sweep_never_downgrades_status() {
        let store = Arc::new(MemoryStore::new());
        let domain = verified_domain(&store, "example.com", "tok").await;

        // No TXT records anywhere: a regression, but not a downgrade
        let checker = checker(store.clone(), StaticTxtResolver::new());
        checker.sweep().await.unwrap();

        let after = store.domain_by_id(domain.id).await.unwrap().unwrap();
        assert_eq!(after.status, DomainStatus::Verified);
    }

    #[tokio::test]
    async fn test_sweep_counts_lost_proof() {
        let store = Arc::new(MemoryStore::new());
        verified_domain(&store, "example.com", "tok").await;

        let metrics = Arc::new(Metrics::new());
        let checker = DomainHealthChecker::new(
            store.clone(),
            Arc::new(StaticTxtResolver::new()),
            metrics.clone(),
            "atrium",
            Duration::from_secs(3600),
            CancellationToken::new(),
        );
        checker.sweep().await.unwrap();

        assert_eq!(metrics.health_regressions.get(), 1);
    }

    #[tokio::test]
    async fn test_sweep_marks_expired_certificates() {
        let store = Arc::new(MemoryStore::new());
        let domain = verified_domain(&store, "example.com", "tok").await;

        let cert = SslCertificate {
            id: Uuid::new_v4(),
            domain_id: domain.id,
            certificate_pem: "cert".into(),
            private_key_pem: "key".into(),
            issued_at: Utc::now() - ChronoDuration::days(100),
            expires_at: Utc::now() - ChronoDuration::days(10),
            status: CertificateStatus::Active,
        };
        store.upsert_certificate(&cert).await.unwrap();

        let resolver = StaticTxtResolver::new()
            .with_records("example.com", &["atrium-verification=tok"]);
        let checker = checker(store.clone(), resolver);
        checker.sweep().await.unwrap();

        let after = store
            .certificate_for_domain(domain.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(after.status, CertificateStatus::Expired);
    }

    #[tokio::test]
    async fn test_healthy_domain_is_quiet() {
        let store = Arc::new(MemoryStore::new());
        verified_domain(&store, "example.com", "tok").await;

        let metrics = Arc::new(Metrics::new());
        let resolver = StaticTxtResolver::new()
            .with_records("example.com", &["atrium-verification=tok"]);
        let checker = DomainHealthChecker::new(
            store,
            Arc::new(resolver),
            metrics.clone(),
            "atrium",
            Duration::from_secs(3600),
            CancellationToken::new(),
        );
        checker.sweep().await.unwrap();

        assert_eq!(metrics.health_regressions.get(), 0);
    }
}
