//! Atrium Control Plane Library
//!
//! The control plane of a multi-tenant SaaS platform:
//!
//! - **Sessions**: admin sessions with dual-write caching (durable store
//!   + TTL'd cache), validation, revocation, and periodic cleanup
//! - **Domains**: tenant custom domains driven through DNS-TXT ownership
//!   verification, with an optional certificate on success
//! - **Issuance**: ACME HTTP-01 against a real CA, or self-signed for
//!   development
//! - **Observability**: health endpoint, Prometheus metrics, and an
//!   admin HTTP API
//!
//! # Example
//!
//! ```ignore
//! use atrium_config::Config;
//! use atrium_control::{api, app};
//!
//! let config = Config::default_embedded()?;
//! let state = app::build_state(&config).await?;
//! let router = api::router(state);
//! ```

// ============================================================================
// Module Declarations
// ============================================================================

pub mod api;
pub mod app;
pub mod cache;
pub mod domain;
pub mod errors;
pub mod metrics;
pub mod model;
pub mod session;
pub mod store;
pub mod tls;

// ============================================================================
// Public API Re-exports
// ============================================================================

// Application state
pub use app::{build_state, AppState};

// Sessions
pub use session::{SessionManager, SessionSweeper};

// Domains
pub use domain::{DomainFlags, DomainManager, DomainHealthChecker, HickoryTxtResolver};

// Storage
pub use store::{FileStore, MemoryStore, Store};

// Cache
pub use cache::{Cache, MemoryCache, RedisCache, ResilientCache};

// Issuance
pub use tls::{AcmeIssuer, CertificateIssuer, IssuedCertificate, SelfSignedIssuer};

// Records
pub use model::{AdminSession, CertificateStatus, CustomDomain, DomainStatus, SslCertificate};

// Metrics
pub use metrics::Metrics;
