//! TXT record resolution for domain ownership checks.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::error::ResolveErrorKind;
use hickory_resolver::TokioAsyncResolver;
use tracing::trace;

use crate::errors::DnsError;

/// Resolves the TXT records of a domain.
///
/// A domain with no TXT records answers an empty list; only transport
/// problems (timeout, SERVFAIL, no route) are errors. Both outcomes fail
/// a verification attempt, but the distinction matters for logs.
#[async_trait]
pub trait TxtResolver: Send + Sync {
    async fn resolve_txt(&self, domain: &str) -> Result<Vec<String>, DnsError>;
}

/// System-configured resolver with a hard per-lookup timeout.
pub struct HickoryTxtResolver {
    resolver: TokioAsyncResolver,
    timeout: Duration,
}

impl HickoryTxtResolver {
    /// Resolver using the system configuration, bounded at `timeout_secs`
    /// per lookup.
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            resolver: TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default()),
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}

#[async_trait]
impl TxtResolver for HickoryTxtResolver {
    async fn resolve_txt(&self, domain: &str) -> Result<Vec<String>, DnsError> {
        let lookup = tokio::time::timeout(self.timeout, self.resolver.txt_lookup(domain))
            .await
            .map_err(|_| DnsError::Timeout(self.timeout.as_secs()))?;

        let records = match lookup {
            Ok(lookup) => lookup
                .iter()
                .map(|txt| {
                    // A TXT record is a sequence of character-strings;
                    // concatenate them the way every client reads them.
                    txt.txt_data()
                        .iter()
                        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
                        .collect::<String>()
                })
                .collect(),
            Err(e) => match e.kind() {
                ResolveErrorKind::NoRecordsFound { .. } => Vec::new(),
                _ => return Err(DnsError::Lookup(e.to_string())),
            },
        };

        trace!(domain = %domain, records = records.len(), "Resolved TXT records");
        Ok(records)
    }
}

/// Fixed-answer resolver for tests.
#[derive(Debug, Default)]
pub struct StaticTxtResolver {
    records: HashMap<String, Vec<String>>,
    fail_with: Option<String>,
}

impl StaticTxtResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `domain` with `records`.
    pub fn with_records(mut self, domain: &str, records: &[&str]) -> Self {
        self.records.insert(
            domain.to_string(),
            records.iter().map(|s| s.to_string()).collect(),
        );
        self
    }

    /// Fail every lookup with the given message.
    pub fn failing(message: &str) -> Self {
        Self {
            records: HashMap::new(),
            fail_with: Some(message.to_string()),
        }
    }
}

#[async_trait]
impl TxtResolver for StaticTxtResolver {
    async fn resolve_txt(&self, domain: &str) -> Result<Vec<String>, DnsError> {
        if let Some(message) = &self.fail_with {
            return Err(DnsError::Lookup(message.clone()));
        }
        Ok(self.records.get(domain).cloned().unwrap_or_default())
    }
}
