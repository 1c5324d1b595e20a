//! KDL configuration parsing.
//!
//! The document is a flat set of named sections; unknown sections are
//! rejected so typos surface at load time instead of silently falling
//! back to defaults.

mod helpers;
mod infra;
mod lifecycle;

use anyhow::Result;
use kdl::KdlDocument;
use tracing::trace;

use crate::model::Config;

/// Parse a KDL document into a [`Config`].
pub(crate) fn parse_config(text: &str) -> Result<Config> {
    let doc: KdlDocument = text.parse().map_err(|e: kdl::KdlError| {
        // Render miette's diagnostic (labels, source spans) into the error
        anyhow::anyhow!("{:?}", miette::Report::new(e))
    })?;

    let mut config = Config::default();

    for node in doc.nodes() {
        match node.name().value() {
            "server" => config.server = infra::parse_server(node)?,
            "cache" => config.cache = infra::parse_cache(node)?,
            "store" => config.store = infra::parse_store(node)?,
            "sessions" => config.sessions = lifecycle::parse_sessions(node)?,
            "domains" => config.domains = lifecycle::parse_domains(node)?,
            "issuer" => config.issuer = lifecycle::parse_issuer(node)?,
            other => {
                return Err(anyhow::anyhow!(
                    "Unknown configuration section '{other}'. Valid sections: \
                     server, cache, store, sessions, domains, issuer"
                ));
            }
        }
    }

    trace!(
        cache_backend = ?config.cache.backend,
        store_backend = ?config.store.backend,
        issuer = ?config.issuer.kind,
        "Parsed configuration document"
    );

    Ok(config)
}
