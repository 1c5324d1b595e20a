//! Application state and startup wiring.
//!
//! Backends (store, cache, resolver, issuer) are resolved from the
//! configuration exactly once, here. Everything downstream holds trait
//! objects; nothing re-inspects the configuration at runtime.

use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use tracing::info;

use atrium_config::{CacheBackend, Config, IssuerKind, StoreBackend};

use crate::cache::{Cache, MemoryCache, RedisCache, ResilientCache};
use crate::domain::{DomainFlags, DomainManager, HickoryTxtResolver, TxtResolver};
use crate::metrics::Metrics;
use crate::session::SessionManager;
use crate::store::{FileStore, MemoryStore, Store};
use crate::tls::{AcmeIssuer, CertificateIssuer, SelfSignedIssuer};

/// Shared state handed to the API and the background tasks.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
    pub domains: Arc<DomainManager>,
    pub store: Arc<dyn Store>,
    pub resolver: Arc<dyn TxtResolver>,
    pub cache: Arc<ResilientCache>,
    pub metrics: Arc<Metrics>,
    pub started_at: DateTime<Utc>,
}

/// Resolve every backend and construct the managers.
pub async fn build_state(config: &Config) -> anyhow::Result<AppState> {
    let metrics = Arc::new(Metrics::new());

    let store: Arc<dyn Store> = match config.store.backend {
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
        StoreBackend::File => {
            let path = config
                .store
                .path
                .as_ref()
                .context("file store requires a path")?;
            Arc::new(FileStore::open(path).context("Failed to open store snapshot")?)
        }
    };

    let cache_backend: Arc<dyn Cache> = match config.cache.backend {
        CacheBackend::Memory => Arc::new(MemoryCache::new()),
        CacheBackend::Redis => {
            let url = config
                .cache
                .url
                .as_ref()
                .context("redis cache requires a url")?;
            Arc::new(
                RedisCache::connect(url)
                    .await
                    .context("Failed to connect to redis")?,
            )
        }
    };
    let cache = Arc::new(ResilientCache::new(cache_backend));

    let resolver: Arc<dyn TxtResolver> =
        Arc::new(HickoryTxtResolver::new(config.domains.dns_timeout_secs));

    let issuer: Arc<dyn CertificateIssuer> = match config.issuer.kind {
        IssuerKind::SelfSigned => Arc::new(SelfSignedIssuer::new()),
        IssuerKind::Acme => Arc::new(
            AcmeIssuer::from_config(&config.issuer).context("Failed to set up ACME issuer")?,
        ),
    };

    let sessions = Arc::new(SessionManager::new(
        Arc::clone(&store),
        Arc::clone(&cache),
        Arc::clone(&metrics),
        Duration::seconds(config.sessions.ttl_secs as i64),
        config.cache.key_prefix.clone(),
    ));

    let domains = Arc::new(DomainManager::new(
        Arc::clone(&store),
        Arc::clone(&resolver),
        issuer,
        Arc::clone(&metrics),
        DomainFlags {
            allow_wildcard: config.domains.allow_wildcard,
            allow_ssl: config.domains.allow_ssl,
        },
        config.domains.verification_prefix.clone(),
    ));

    info!(
        store = ?config.store.backend,
        cache = ?config.cache.backend,
        issuer = ?config.issuer.kind,
        allow_ssl = config.domains.allow_ssl,
        "Control plane state assembled"
    );

    Ok(AppState {
        sessions,
        domains,
        store,
        resolver,
        cache,
        metrics,
        started_at: Utc::now(),
    })
}
