//! Atrium configuration
//!
//! Loads and validates the control plane's KDL configuration.
//!
//! # Example
//!
//! ```kdl
//! server {
//!     listen "127.0.0.1:8320"
//! }
//!
//! cache {
//!     backend "redis"
//!     url "redis://127.0.0.1:6379"
//! }
//!
//! store {
//!     backend "file"
//!     path "/var/lib/atrium/store.json"
//! }
//!
//! domains {
//!     verification-prefix "atrium"
//!     allow-ssl #true
//! }
//! ```
//!
//! Parsing is strict about section shapes but lenient about omissions:
//! every field has a default, so an empty document is a valid (in-memory,
//! self-signed) development configuration.

mod kdl;
mod model;
pub mod validate;

pub use model::{
    default_embedded_text, CacheBackend, CacheConfig, Config, DomainConfig, IssuerConfig,
    IssuerKind, ServerConfig, SessionConfig, StoreBackend, StoreConfig,
};
pub use validate::{ErrorCategory, ValidationError, ValidationResult, ValidationWarning};

use anyhow::Context;
use std::path::Path;
use tracing::{debug, info};

impl Config {
    /// Load configuration from a KDL file on disk.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Loading configuration file");
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file {}", path.display()))?;
        let config = Self::from_kdl(&text)
            .with_context(|| format!("Failed to parse configuration file {}", path.display()))?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Parse configuration from a KDL string.
    pub fn from_kdl(text: &str) -> anyhow::Result<Self> {
        kdl::parse_config(text)
    }

    /// The embedded default configuration: in-memory backends, self-signed
    /// issuer. Suitable for development and tests, never for production.
    pub fn default_embedded() -> anyhow::Result<Self> {
        kdl::parse_config(model::default_embedded_text())
    }

    /// Validate the configuration, returning all errors and warnings.
    pub fn validate(&self) -> ValidationResult {
        validate::validate(self)
    }

    /// Validate and fail on the first report with hard errors.
    pub fn ensure_valid(&self) -> anyhow::Result<()> {
        let result = self.validate();
        for warning in &result.warnings {
            tracing::warn!(warning = %warning.message, "Configuration warning");
        }
        if result.is_valid() {
            Ok(())
        } else {
            let rendered = result
                .errors
                .iter()
                .map(|e| format!("  - {e}"))
                .collect::<Vec<_>>()
                .join("\n");
            anyhow::bail!("Configuration is invalid:\n{rendered}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_embedded_is_valid() {
        let config = Config::default_embedded().unwrap();
        assert!(config.validate().is_valid());
        assert_eq!(config.cache.backend, CacheBackend::Memory);
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.issuer.kind, IssuerKind::SelfSigned);
    }

    #[test]
    fn test_from_file_roundtrip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("atrium.kdl");
        std::fs::write(
            &path,
            r#"
            server {
                listen "0.0.0.0:9000"
            }
            sessions {
                ttl-secs 60
            }
            "#,
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.server.listen, "0.0.0.0:9000");
        assert_eq!(config.sessions.ttl_secs, 60);
        // Untouched sections keep their defaults
        assert_eq!(config.domains.dns_timeout_secs, 5);
    }

    #[test]
    fn test_missing_file_errors() {
        assert!(Config::from_file("/nonexistent/atrium.kdl").is_err());
    }
}
