//! Typed configuration model.
//!
//! Every field has a `default_*` function so sections (and the whole
//! document) can be omitted. Backends and issuers are enums resolved here,
//! once, at load time; nothing downstream switches on strings.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration for the control plane.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub cache: CacheConfig,
    pub store: StoreConfig,
    pub sessions: SessionConfig,
    pub domains: DomainConfig,
    pub issuer: IssuerConfig,
}

/// Admin listener and process-level settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the admin/observability listener binds to.
    pub listen: String,
    /// Grace period for in-flight requests and background tasks on shutdown.
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

/// Session cache backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheBackend {
    /// In-process map with TTL. Development and tests.
    Memory,
    /// Redis via a managed (auto-reconnecting) connection.
    Redis,
}

/// Session cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    /// Connection URL, required for the redis backend.
    pub url: Option<String>,
    /// Prefix for session cache keys.
    pub key_prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Memory,
            url: None,
            key_prefix: default_key_prefix(),
        }
    }
}

/// Durable store backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// In-process, volatile. Development and tests.
    Memory,
    /// JSON snapshot on disk, loaded at startup and persisted per mutation.
    File,
}

/// Durable store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Snapshot path, required for the file backend.
    pub path: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            path: None,
        }
    }
}

/// Admin session lifecycle settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Session lifetime from creation.
    pub ttl_secs: u64,
    /// Interval between sweeps deleting expired/revoked rows.
    pub cleanup_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_session_ttl(),
            cleanup_interval_secs: default_cleanup_interval(),
        }
    }
}

/// Custom domain verification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainConfig {
    /// TXT record prefix: ownership is proven by
    /// `<prefix>-verification=<token>`.
    pub verification_prefix: String,
    /// Whether tenants may register wildcard hostnames.
    pub allow_wildcard: bool,
    /// Whether successful verification also provisions a certificate.
    pub allow_ssl: bool,
    /// Upper bound for a single TXT lookup.
    pub dns_timeout_secs: u64,
    /// Interval between health sweeps over verified domains.
    pub health_check_interval_secs: u64,
}

impl Default for DomainConfig {
    fn default() -> Self {
        Self {
            verification_prefix: default_verification_prefix(),
            allow_wildcard: false,
            allow_ssl: false,
            dns_timeout_secs: default_dns_timeout(),
            health_check_interval_secs: default_health_interval(),
        }
    }
}

/// Certificate issuer selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssuerKind {
    /// Offline self-signed issuance. Development and tests.
    SelfSigned,
    /// ACME HTTP-01 against a real certificate authority.
    Acme,
}

/// Certificate issuer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuerConfig {
    pub kind: IssuerKind,
    /// Contact email registered with the ACME account.
    pub contact: Option<String>,
    /// Explicit ACME directory URL; overrides `staging`.
    pub directory_url: Option<String>,
    /// Use the Let's Encrypt staging directory.
    pub staging: bool,
    /// Directory the HTTP-01 key authorizations are written to; the
    /// tenant-facing web tier serves it at
    /// `/.well-known/acme-challenge/`.
    pub challenge_dir: PathBuf,
    /// Directory for ACME account credentials and issued material.
    pub state_dir: PathBuf,
}

impl Default for IssuerConfig {
    fn default() -> Self {
        Self {
            kind: IssuerKind::SelfSigned,
            contact: None,
            directory_url: None,
            staging: false,
            challenge_dir: default_challenge_dir(),
            state_dir: default_state_dir(),
        }
    }
}

pub(crate) fn default_listen() -> String {
    "127.0.0.1:8320".to_string()
}

pub(crate) fn default_shutdown_timeout() -> u64 {
    30
}

pub(crate) fn default_key_prefix() -> String {
    "atrium:session:".to_string()
}

/// 4 hours.
pub(crate) fn default_session_ttl() -> u64 {
    4 * 3600
}

pub(crate) fn default_cleanup_interval() -> u64 {
    3600
}

pub(crate) fn default_verification_prefix() -> String {
    "atrium".to_string()
}

pub(crate) fn default_dns_timeout() -> u64 {
    5
}

/// 6 hours.
pub(crate) fn default_health_interval() -> u64 {
    6 * 3600
}

pub(crate) fn default_challenge_dir() -> PathBuf {
    PathBuf::from("/var/lib/atrium/challenges")
}

pub(crate) fn default_state_dir() -> PathBuf {
    PathBuf::from("/var/lib/atrium/certs")
}

/// Embedded development configuration.
pub fn default_embedded_text() -> &'static str {
    r##"
// Embedded development defaults: volatile backends, offline issuer.
server {
    listen "127.0.0.1:8320"
    shutdown-timeout-secs 30
}

cache {
    backend "memory"
}

store {
    backend "memory"
}

sessions {
    ttl-secs 14400
    cleanup-interval-secs 3600
}

domains {
    verification-prefix "atrium"
    allow-wildcard #false
    allow-ssl #false
    dns-timeout-secs 5
    health-check-interval-secs 21600
}

issuer {
    kind "self-signed"
}
"##
}
