//! ACME HTTP-01 certificate issuance.
//!
//! One provisioning attempt per call, no internal retry: the domain
//! verification manager treats any failure here as a failed
//! verification. The ACME account is created on first use and restored
//! from stored credentials afterwards.
//!
//! # Order flow
//!
//! 1. Create an order for the hostname
//! 2. For each pending authorization, publish the HTTP-01 key
//!    authorization into the challenge directory and mark the challenge
//!    ready
//! 3. Poll the order until the CA validated the challenges
//! 4. Finalize, download the certificate chain
//! 5. Withdraw the published challenge files (success or failure)

use async_trait::async_trait;
use futures::StreamExt;
use instant_acme::{
    Account, AccountCredentials, AuthorizationStatus, ChallengeType, Identifier, LetsEncrypt,
    NewAccount, NewOrder, OrderStatus, RetryPolicy,
};
use tracing::{debug, info, warn};

use atrium_config::IssuerConfig;

use crate::errors::IssuerError;

use super::{CertificateIssuer, ChallengeDir, IssuedCertificate, MaterialStore};

/// ACME issuer against a configurable directory.
pub struct AcmeIssuer {
    directory_url: String,
    contact: Option<String>,
    challenges: ChallengeDir,
    material: MaterialStore,
}

impl AcmeIssuer {
    /// Build the issuer from configuration, creating the challenge and
    /// state directories as needed.
    pub fn from_config(config: &IssuerConfig) -> Result<Self, IssuerError> {
        let challenges = ChallengeDir::new(&config.challenge_dir)?;
        let material = MaterialStore::new(&config.state_dir)?;

        let directory_url = match (&config.directory_url, config.staging) {
            (Some(url), _) => url.clone(),
            (None, true) => LetsEncrypt::Staging.url().to_owned(),
            (None, false) => LetsEncrypt::Production.url().to_owned(),
        };

        info!(directory = %directory_url, "Configured ACME issuer");
        Ok(Self {
            directory_url,
            contact: config.contact.clone(),
            challenges,
            material,
        })
    }

    /// Restore the ACME account from stored credentials, or register a
    /// new one and persist its credentials.
    async fn account(&self) -> Result<Account, IssuerError> {
        if let Some(json) = self.material.load_account_credentials()? {
            let credentials: AccountCredentials = serde_json::from_str(&json)
                .map_err(|e| IssuerError::Account(format!("stored credentials: {e}")))?;
            let account = Account::builder()
                .map_err(|e| IssuerError::Account(e.to_string()))?
                .from_credentials(credentials)
                .await
                .map_err(|e| IssuerError::Account(e.to_string()))?;
            debug!("Restored ACME account from stored credentials");
            return Ok(account);
        }

        let contact = self
            .contact
            .as_ref()
            .map(|email| format!("mailto:{email}"))
            .into_iter()
            .collect::<Vec<_>>();
        let contact_refs = contact.iter().map(String::as_str).collect::<Vec<_>>();

        let (account, credentials) = Account::builder()
            .map_err(|e| IssuerError::Account(e.to_string()))?
            .create(
                &NewAccount {
                    contact: &contact_refs,
                    terms_of_service_agreed: true,
                    only_return_existing: false,
                },
                self.directory_url.clone(),
                None,
            )
            .await
            .map_err(|e| IssuerError::Account(e.to_string()))?;

        let json = serde_json::to_string(&credentials)
            .map_err(|e| IssuerError::Account(e.to_string()))?;
        self.material.save_account_credentials(&json)?;

        info!("Registered new ACME account");
        Ok(account)
    }

    /// Drive one order to completion. Published challenge tokens are
    /// collected into `published` so the caller can withdraw them on
    /// every exit path.
    async fn run_order(
        &self,
        account: &Account,
        domain: &str,
        published: &mut Vec<String>,
    ) -> Result<(String, String), IssuerError> {
        let identifiers = vec![Identifier::Dns(domain.to_string())];
        let mut order = account
            .new_order(&NewOrder::new(&identifiers))
            .await
            .map_err(|e| IssuerError::Order(e.to_string()))?;

        let mut authorizations = order.authorizations();
        while let Some(result) = authorizations.next().await {
            let mut authz = result.map_err(|e| IssuerError::Order(e.to_string()))?;
            match authz.status {
                AuthorizationStatus::Pending => {}
                AuthorizationStatus::Valid => continue,
                other => {
                    return Err(IssuerError::Order(format!(
                        "authorization in unexpected state {other:?}"
                    )));
                }
            }

            let mut challenge = authz
                .challenge(ChallengeType::Http01)
                .ok_or_else(|| IssuerError::Order("no http-01 challenge offered".to_string()))?;

            let key_authorization = challenge.key_authorization();
            self.challenges
                .publish(&challenge.token, key_authorization.as_str())?;
            published.push(challenge.token.clone());

            challenge
                .set_ready()
                .await
                .map_err(|e| IssuerError::Order(e.to_string()))?;
        }

        let status = order
            .poll_ready(&RetryPolicy::default())
            .await
            .map_err(|e| IssuerError::Order(e.to_string()))?;
        if status != OrderStatus::Ready {
            return Err(IssuerError::Order(format!(
                "order not ready after validation, status {status:?}"
            )));
        }

        let private_key_pem = order
            .finalize()
            .await
            .map_err(|e| IssuerError::Order(e.to_string()))?;
        let cert_chain_pem = order
            .poll_certificate(&RetryPolicy::default())
            .await
            .map_err(|e| IssuerError::Order(e.to_string()))?;

        Ok((cert_chain_pem, private_key_pem))
    }
}

#[async_trait]
impl CertificateIssuer for AcmeIssuer {
    async fn provision(&self, domain: &str) -> Result<IssuedCertificate, IssuerError> {
        info!(domain = %domain, "Requesting certificate from ACME directory");
        let account = self.account().await?;

        let mut published = Vec::new();
        let result = self.run_order(&account, domain, &mut published).await;

        // Key authorizations come down after issuance or failure alike
        for token in &published {
            self.challenges.withdraw(token);
        }

        match result {
            Ok((cert_pem, key_pem)) => {
                self.material.save_material(domain, &cert_pem, &key_pem)?;
                let issued = IssuedCertificate::with_standard_validity(cert_pem, key_pem);
                info!(
                    domain = %domain,
                    expires_at = %issued.expires_at,
                    "Certificate issued"
                );
                Ok(issued)
            }
            Err(e) => {
                warn!(domain = %domain, error = %e, "Certificate issuance failed");
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for AcmeIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcmeIssuer")
            .field("directory_url", &self.directory_url)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> IssuerConfig {
        IssuerConfig {
            kind: atrium_config::IssuerKind::Acme,
            contact: Some("ops@example.com".into()),
            directory_url: None,
            staging: false,
            challenge_dir: dir.path().join("challenges"),
            state_dir: dir.path().join("state"),
        }
    }

    #[test]
    fn test_directory_selection_production() {
        let dir = TempDir::new().unwrap();
        let issuer = AcmeIssuer::from_config(&config(&dir)).unwrap();
        assert!(issuer.directory_url.contains("acme-v02.api.letsencrypt.org"));
    }

    #[test]
    fn test_directory_selection_staging() {
        let dir = TempDir::new().unwrap();
        let mut cfg = config(&dir);
        cfg.staging = true;
        let issuer = AcmeIssuer::from_config(&cfg).unwrap();
        assert!(issuer.directory_url.contains("staging"));
    }

    #[test]
    fn test_explicit_directory_overrides_staging() {
        let dir = TempDir::new().unwrap();
        let mut cfg = config(&dir);
        cfg.staging = true;
        cfg.directory_url = Some("https://ca.internal/directory".into());
        let issuer = AcmeIssuer::from_config(&cfg).unwrap();
        assert_eq!(issuer.directory_url, "https://ca.internal/directory");
    }

    #[test]
    fn test_creates_working_directories() {
        let dir = TempDir::new().unwrap();
        let issuer = AcmeIssuer::from_config(&config(&dir)).unwrap();
        assert!(dir.path().join("challenges").exists());
        assert!(dir.path().join("state").join("domains").exists());
        // Challenge dir is usable straight away
        issuer.challenges.publish("t", "auth").unwrap();
        assert_eq!(issuer.challenges.read("t").as_deref(), Some("auth"));
    }
}
