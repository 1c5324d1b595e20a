//! Session, domain, and issuer validation.

use super::{ErrorCategory, ValidationError, ValidationResult, ValidationWarning};
use crate::model::{Config, IssuerKind};

/// Validate session lifecycle settings.
pub(crate) fn validate_sessions(config: &Config) -> ValidationResult {
    let mut result = ValidationResult::new();

    if config.sessions.ttl_secs == 0 {
        result.add_error(ValidationError::new(
            ErrorCategory::Sessions,
            "'ttl-secs' must be greater than 0",
        ));
    } else if config.sessions.ttl_secs < 60 {
        result.add_warning(ValidationWarning::new(format!(
            "Session TTL of {}s is unusually short",
            config.sessions.ttl_secs
        )));
    }

    if config.sessions.cleanup_interval_secs < 60 {
        result.add_warning(ValidationWarning::new(format!(
            "Cleanup interval of {}s hammers the store; consider at least 60s",
            config.sessions.cleanup_interval_secs
        )));
    }

    result
}

/// Validate domain verification settings.
pub(crate) fn validate_domains(config: &Config) -> ValidationResult {
    let mut result = ValidationResult::new();
    let prefix = &config.domains.verification_prefix;

    if prefix.is_empty() {
        result.add_error(ValidationError::new(
            ErrorCategory::Domains,
            "'verification-prefix' must not be empty",
        ));
    } else if prefix.contains('=') || prefix.contains(char::is_whitespace) {
        // The prefix is spliced into "<prefix>-verification=<token>"
        result.add_error(ValidationError::new(
            ErrorCategory::Domains,
            format!("'verification-prefix' '{prefix}' must not contain '=' or whitespace"),
        ));
    }

    if config.domains.dns_timeout_secs == 0 || config.domains.dns_timeout_secs > 60 {
        result.add_error(ValidationError::new(
            ErrorCategory::Domains,
            format!(
                "'dns-timeout-secs' must be between 1 and 60, got {}",
                config.domains.dns_timeout_secs
            ),
        ));
    }

    if config.domains.health_check_interval_secs < 300 {
        result.add_warning(ValidationWarning::new(format!(
            "Health sweep interval of {}s generates heavy external DNS traffic",
            config.domains.health_check_interval_secs
        )));
    }

    result
}

/// Validate issuer settings.
pub(crate) fn validate_issuer(config: &Config) -> ValidationResult {
    let mut result = ValidationResult::new();

    match config.issuer.kind {
        IssuerKind::Acme => {
            if config.issuer.contact.is_none() {
                result.add_error(ValidationError::new(
                    ErrorCategory::Issuer,
                    "Issuer kind 'acme' requires a 'contact' email",
                ));
            }
            if config.issuer.staging && config.issuer.directory_url.is_some() {
                result.add_warning(ValidationWarning::new(
                    "'staging' is ignored when 'directory-url' is set explicitly",
                ));
            }
            if !config.domains.allow_ssl {
                result.add_warning(ValidationWarning::new(
                    "Issuer kind 'acme' configured but 'allow-ssl' is off; \
                     no certificates will be requested",
                ));
            }
        }
        IssuerKind::SelfSigned => {
            if config.domains.allow_ssl && config.issuer.contact.is_some() {
                result.add_warning(ValidationWarning::new(
                    "'contact' is ignored by the self-signed issuer",
                ));
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_ttl_rejected() {
        let mut config = Config::default();
        config.sessions.ttl_secs = 0;
        assert!(!validate_sessions(&config).is_valid());
    }

    #[test]
    fn test_prefix_with_equals_rejected() {
        let mut config = Config::default();
        config.domains.verification_prefix = "bad=prefix".into();
        assert!(!validate_domains(&config).is_valid());
    }

    #[test]
    fn test_dns_timeout_bounds() {
        let mut config = Config::default();
        config.domains.dns_timeout_secs = 0;
        assert!(!validate_domains(&config).is_valid());
        config.domains.dns_timeout_secs = 61;
        assert!(!validate_domains(&config).is_valid());
        config.domains.dns_timeout_secs = 5;
        assert!(validate_domains(&config).is_valid());
    }

    #[test]
    fn test_acme_requires_contact() {
        let mut config = Config::default();
        config.issuer.kind = IssuerKind::Acme;
        assert!(!validate_issuer(&config).is_valid());

        config.issuer.contact = Some("ops@example.com".into());
        assert!(validate_issuer(&config).is_valid());
    }
}
