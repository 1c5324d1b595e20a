//! Control plane error types.
//!
//! One enum per subsystem; infrastructure failures wrap the backend error
//! and stay distinguishable from domain-level outcomes (Unauthorized,
//! NotFound, Forbidden).

use thiserror::Error;

/// Durable store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Unique constraint violation (duplicate token or domain).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Update target does not exist.
    #[error("Row not found: {0}")]
    Missing(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Session cache errors. These never surface to callers of the session
/// manager; the resilient wrapper degrades them to cache misses.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache backend error: {0}")]
    Backend(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<redis::RedisError> for CacheError {
    fn from(e: redis::RedisError) -> Self {
        CacheError::Backend(e.to_string())
    }
}

/// Session manager errors.
#[derive(Error, Debug)]
pub enum SessionError {
    /// Token unknown, session expired, or session revoked.
    #[error("Unauthorized")]
    Unauthorized,

    /// Revocation target does not exist (or is already revoked).
    #[error("Session not found")]
    NotFound,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// DNS lookup errors during domain verification.
#[derive(Error, Debug)]
pub enum DnsError {
    #[error("TXT lookup timed out after {0}s")]
    Timeout(u64),

    #[error("TXT lookup failed: {0}")]
    Lookup(String),
}

/// Domain verification errors.
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Domain not found")]
    NotFound,

    #[error("Wildcard domains are not allowed for this tenant")]
    WildcardForbidden,

    #[error("Invalid domain name '{0}'")]
    InvalidName(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Certificate issuance errors.
#[derive(Error, Debug)]
pub enum IssuerError {
    #[error("ACME account error: {0}")]
    Account(String),

    #[error("ACME order error: {0}")]
    Order(String),

    #[error("Certificate generation error: {0}")]
    Generation(String),

    #[error("Challenge publication error: {0}")]
    Challenge(#[from] std::io::Error),

    #[error("Issued material persistence error: {0}")]
    Persistence(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_wraps_into_session_error() {
        let e: SessionError = StoreError::Conflict("token".into()).into();
        assert!(matches!(e, SessionError::Store(StoreError::Conflict(_))));
    }

    #[test]
    fn test_display_messages() {
        assert_eq!(SessionError::Unauthorized.to_string(), "Unauthorized");
        assert_eq!(
            DnsError::Timeout(5).to_string(),
            "TXT lookup timed out after 5s"
        );
    }
}
