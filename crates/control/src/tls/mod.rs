//! Certificate issuance.
//!
//! The verification manager only sees the [`CertificateIssuer`] trait;
//! the concrete issuer is chosen once at startup:
//!
//! - [`AcmeIssuer`] — real HTTP-01 issuance against an ACME directory.
//!   Key authorizations are written into a well-known challenge
//!   directory served by the tenant-facing web tier.
//! - [`SelfSignedIssuer`] — offline issuance for development and tests.
//!
//! Issued material is recorded with a fixed 90-day validity window from
//! issuance, matching the CA's certificate lifetime.

mod acme;
mod challenge;
mod material;
mod selfsigned;

pub use acme::AcmeIssuer;
pub use challenge::ChallengeDir;
pub use material::MaterialStore;
pub use selfsigned::SelfSignedIssuer;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::errors::IssuerError;

/// Certificate lifetime in days, from issuance.
pub const CERT_VALIDITY_DAYS: i64 = 90;

/// Material returned by a successful issuance.
#[derive(Debug, Clone)]
pub struct IssuedCertificate {
    /// PEM-encoded certificate chain.
    pub certificate_pem: String,
    /// PEM-encoded private key.
    pub private_key_pem: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl IssuedCertificate {
    /// Stamp the standard validity window onto freshly issued material.
    pub(crate) fn with_standard_validity(
        certificate_pem: String,
        private_key_pem: String,
    ) -> Self {
        let issued_at = Utc::now();
        Self {
            certificate_pem,
            private_key_pem,
            issued_at,
            expires_at: issued_at + Duration::days(CERT_VALIDITY_DAYS),
        }
    }
}

/// Obtains a certificate for a single hostname.
#[async_trait]
pub trait CertificateIssuer: Send + Sync {
    /// One issuance attempt; no internal retry. Failures are surfaced to
    /// the caller, which treats them as a failed verification.
    async fn provision(&self, domain: &str) -> Result<IssuedCertificate, IssuerError>;
}

/// Expiry timestamp embedded in a PEM certificate, if parseable.
///
/// The certificate row's `expires_at` is the recorded 90-day window;
/// the embedded notAfter is what TLS clients actually enforce. The
/// health sweep compares both.
pub(crate) fn embedded_expiry(cert_pem: &str) -> Option<DateTime<Utc>> {
    let parsed = pem::parse(cert_pem.as_bytes()).ok()?;
    let (_, cert) = x509_parser::parse_x509_certificate(parsed.contents()).ok()?;
    let ts = cert.validity().not_after.to_datetime().unix_timestamp();
    DateTime::from_timestamp(ts, 0)
}
