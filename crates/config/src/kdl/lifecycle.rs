//! Session, domain, and issuer section parsing.

use anyhow::Result;
use kdl::KdlNode;
use std::path::PathBuf;
use tracing::trace;

use super::helpers::{get_bool_entry, get_string_entry, get_u64_entry};
use crate::model::{DomainConfig, IssuerConfig, IssuerKind, SessionConfig};

/// Parse the `sessions` block.
pub(crate) fn parse_sessions(node: &KdlNode) -> Result<SessionConfig> {
    let defaults = SessionConfig::default();
    let config = SessionConfig {
        ttl_secs: get_u64_entry(node, "ttl-secs")?.unwrap_or(defaults.ttl_secs),
        cleanup_interval_secs: get_u64_entry(node, "cleanup-interval-secs")?
            .unwrap_or(defaults.cleanup_interval_secs),
    };

    trace!(
        ttl_secs = config.ttl_secs,
        cleanup_interval_secs = config.cleanup_interval_secs,
        "Parsed sessions section"
    );
    Ok(config)
}

/// Parse the `domains` block.
pub(crate) fn parse_domains(node: &KdlNode) -> Result<DomainConfig> {
    let defaults = DomainConfig::default();
    let config = DomainConfig {
        verification_prefix: get_string_entry(node, "verification-prefix")
            .unwrap_or(defaults.verification_prefix),
        allow_wildcard: get_bool_entry(node, "allow-wildcard").unwrap_or(defaults.allow_wildcard),
        allow_ssl: get_bool_entry(node, "allow-ssl").unwrap_or(defaults.allow_ssl),
        dns_timeout_secs: get_u64_entry(node, "dns-timeout-secs")?
            .unwrap_or(defaults.dns_timeout_secs),
        health_check_interval_secs: get_u64_entry(node, "health-check-interval-secs")?
            .unwrap_or(defaults.health_check_interval_secs),
    };

    trace!(
        verification_prefix = %config.verification_prefix,
        allow_wildcard = config.allow_wildcard,
        allow_ssl = config.allow_ssl,
        "Parsed domains section"
    );
    Ok(config)
}

/// Parse the `issuer` block.
pub(crate) fn parse_issuer(node: &KdlNode) -> Result<IssuerConfig> {
    let defaults = IssuerConfig::default();

    let kind = match get_string_entry(node, "kind").as_deref() {
        None | Some("self-signed") => IssuerKind::SelfSigned,
        Some("acme") => IssuerKind::Acme,
        Some(other) => {
            return Err(anyhow::anyhow!(
                "Invalid issuer kind '{other}'. Valid kinds: self-signed, acme"
            ));
        }
    };

    let config = IssuerConfig {
        kind,
        contact: get_string_entry(node, "contact"),
        directory_url: get_string_entry(node, "directory-url"),
        staging: get_bool_entry(node, "staging").unwrap_or(defaults.staging),
        challenge_dir: get_string_entry(node, "challenge-dir")
            .map(PathBuf::from)
            .unwrap_or(defaults.challenge_dir),
        state_dir: get_string_entry(node, "state-dir")
            .map(PathBuf::from)
            .unwrap_or(defaults.state_dir),
    };

    trace!(kind = ?config.kind, staging = config.staging, "Parsed issuer section");
    Ok(config)
}
