//! Self-signed certificate issuance for development and tests.

use async_trait::async_trait;
use chrono::{Datelike, Duration, Utc};
use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair};
use tracing::info;

use crate::errors::IssuerError;

use super::{CertificateIssuer, IssuedCertificate, CERT_VALIDITY_DAYS};

/// Issues self-signed certificates with the standard validity window.
///
/// Browsers reject these; the point is exercising the full issuance
/// path (including material persistence) without a CA.
#[derive(Debug, Default)]
pub struct SelfSignedIssuer;

impl SelfSignedIssuer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CertificateIssuer for SelfSignedIssuer {
    async fn provision(&self, domain: &str) -> Result<IssuedCertificate, IssuerError> {
        let mut params = CertificateParams::new(vec![domain.to_string()])
            .map_err(|e| IssuerError::Generation(e.to_string()))?;

        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, domain);
        params.distinguished_name = dn;

        let now = Utc::now();
        let until = now + Duration::days(CERT_VALIDITY_DAYS);
        params.not_before = rcgen::date_time_ymd(now.year(), now.month() as u8, now.day() as u8);
        params.not_after =
            rcgen::date_time_ymd(until.year(), until.month() as u8, until.day() as u8);

        let key_pair = KeyPair::generate().map_err(|e| IssuerError::Generation(e.to_string()))?;
        let cert = params
            .self_signed(&key_pair)
            .map_err(|e| IssuerError::Generation(e.to_string()))?;

        info!(domain = %domain, "Issued self-signed certificate");
        Ok(IssuedCertificate::with_standard_validity(
            cert.pem(),
            key_pair.serialize_pem(),
        ))
    }
}
