//! Filesystem persistence for ACME state and issued material.
//!
//! The durable store keeps the authoritative certificate rows; this
//! directory is the hand-off point for the data plane (which terminates
//! TLS) and the home of the ACME account credentials.
//!
//! # Directory structure
//!
//! ```text
//! state/
//! ├── credentials.json      # ACME account credentials
//! └── domains/
//!     └── example.com/
//!         ├── cert.pem      # Certificate chain
//!         └── key.pem       # Private key
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, trace};

use crate::errors::IssuerError;

/// Issued-material and account-credential storage with restrictive
/// permissions (0700 directories, 0600 key files).
#[derive(Debug)]
pub struct MaterialStore {
    base_path: PathBuf,
}

impl MaterialStore {
    pub fn new(base_path: &Path) -> Result<Self, IssuerError> {
        let domains_path = base_path.join("domains");
        fs::create_dir_all(&domains_path)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o700);
            fs::set_permissions(base_path, perms.clone())?;
            fs::set_permissions(&domains_path, perms)?;
        }

        info!(path = %base_path.display(), "Initialized certificate material store");
        Ok(Self {
            base_path: base_path.to_path_buf(),
        })
    }

    fn credentials_path(&self) -> PathBuf {
        self.base_path.join("credentials.json")
    }

    /// Load the raw ACME account credentials JSON, if any.
    pub fn load_account_credentials(&self) -> Result<Option<String>, IssuerError> {
        let path = self.credentials_path();
        if !path.exists() {
            trace!("No stored ACME account credentials");
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        debug!("Loaded ACME account credentials");
        Ok(Some(content))
    }

    /// Persist the raw ACME account credentials JSON.
    pub fn save_account_credentials(&self, json: &str) -> Result<(), IssuerError> {
        let path = self.credentials_path();
        fs::write(&path, json)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o600))?;
        }
        info!("Saved ACME account credentials");
        Ok(())
    }

    /// Persist issued material for `domain`.
    pub fn save_material(
        &self,
        domain: &str,
        cert_pem: &str,
        key_pem: &str,
    ) -> Result<(), IssuerError> {
        let domain_path = self.base_path.join("domains").join(domain);
        fs::create_dir_all(&domain_path)?;

        fs::write(domain_path.join("cert.pem"), cert_pem)?;

        let key_path = domain_path.join("key.pem");
        fs::write(&key_path, key_pem)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&key_path, fs::Permissions::from_mode(0o600))?;
        }

        info!(domain = %domain, "Saved issued certificate material");
        Ok(())
    }

    /// Paths to the stored material for `domain`, if present.
    pub fn material_paths(&self, domain: &str) -> Option<(PathBuf, PathBuf)> {
        let domain_path = self.base_path.join("domains").join(domain);
        let cert = domain_path.join("cert.pem");
        let key = domain_path.join("key.pem");
        (cert.exists() && key.exists()).then_some((cert, key))
    }
}
