//! Prometheus metrics for the control plane.

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

/// All control plane counters, registered against one registry.
#[derive(Debug)]
pub struct Metrics {
    registry: Registry,

    pub sessions_created: IntCounter,
    pub sessions_revoked: IntCounter,
    pub sessions_purged: IntCounter,
    /// result: "ok" | "unauthorized"
    pub session_validations: IntCounterVec,
    pub session_cache_hits: IntCounter,
    pub session_cache_misses: IntCounter,
    /// outcome: "verified" | "failed"
    pub domain_verifications: IntCounterVec,
    pub certificates_issued: IntCounter,
    pub certificate_failures: IntCounter,
    pub health_regressions: IntCounter,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let sessions_created = IntCounter::with_opts(Opts::new(
            "atrium_sessions_created_total",
            "Admin sessions created",
        ))
        .expect("metric opts are static");
        let sessions_revoked = IntCounter::with_opts(Opts::new(
            "atrium_sessions_revoked_total",
            "Admin sessions revoked",
        ))
        .expect("metric opts are static");
        let sessions_purged = IntCounter::with_opts(Opts::new(
            "atrium_sessions_purged_total",
            "Expired or revoked sessions deleted by the sweeper",
        ))
        .expect("metric opts are static");
        let session_validations = IntCounterVec::new(
            Opts::new(
                "atrium_session_validations_total",
                "Session validation attempts by result",
            ),
            &["result"],
        )
        .expect("metric opts are static");
        let session_cache_hits = IntCounter::with_opts(Opts::new(
            "atrium_session_cache_hits_total",
            "Session validations answered from the cache",
        ))
        .expect("metric opts are static");
        let session_cache_misses = IntCounter::with_opts(Opts::new(
            "atrium_session_cache_misses_total",
            "Session validations that fell through to the store",
        ))
        .expect("metric opts are static");
        let domain_verifications = IntCounterVec::new(
            Opts::new(
                "atrium_domain_verifications_total",
                "Domain verification attempts by outcome",
            ),
            &["outcome"],
        )
        .expect("metric opts are static");
        let certificates_issued = IntCounter::with_opts(Opts::new(
            "atrium_certificates_issued_total",
            "Certificates successfully provisioned",
        ))
        .expect("metric opts are static");
        let certificate_failures = IntCounter::with_opts(Opts::new(
            "atrium_certificate_failures_total",
            "Certificate provisioning failures",
        ))
        .expect("metric opts are static");
        let health_regressions = IntCounter::with_opts(Opts::new(
            "atrium_health_regressions_total",
            "Verified domains observed with missing TXT proof or expiring certificates",
        ))
        .expect("metric opts are static");

        for collector in [
            Box::new(sessions_created.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(sessions_revoked.clone()),
            Box::new(sessions_purged.clone()),
            Box::new(session_validations.clone()),
            Box::new(session_cache_hits.clone()),
            Box::new(session_cache_misses.clone()),
            Box::new(domain_verifications.clone()),
            Box::new(certificates_issued.clone()),
            Box::new(certificate_failures.clone()),
            Box::new(health_regressions.clone()),
        ] {
            registry
                .register(collector)
                .expect("collectors registered exactly once");
        }

        Self {
            registry,
            sessions_created,
            sessions_revoked,
            sessions_purged,
            session_validations,
            session_cache_hits,
            session_cache_misses,
            domain_verifications,
            certificates_issued,
            certificate_failures,
            health_regressions,
        }
    }

    /// Render the registry in Prometheus text exposition format.
    pub fn render(&self) -> String {
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        if encoder.encode(&self.registry.gather(), &mut buf).is_err() {
            return String::new();
        }
        String::from_utf8(buf).unwrap_or_default()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_render() {
        let metrics = Metrics::new();
        metrics.sessions_created.inc();
        metrics
            .session_validations
            .with_label_values(&["ok"])
            .inc();

        let text = metrics.render();
        assert!(text.contains("atrium_sessions_created_total 1"));
        assert!(text.contains("atrium_session_validations_total{result=\"ok\"} 1"));
    }
}
