//! Server, cache, and store section parsing.

use anyhow::Result;
use kdl::KdlNode;
use std::path::PathBuf;
use tracing::trace;

use super::helpers::{get_string_entry, get_u64_entry};
use crate::model::{CacheBackend, CacheConfig, ServerConfig, StoreBackend, StoreConfig};

/// Parse the `server` block.
pub(crate) fn parse_server(node: &KdlNode) -> Result<ServerConfig> {
    let defaults = ServerConfig::default();
    let config = ServerConfig {
        listen: get_string_entry(node, "listen").unwrap_or(defaults.listen),
        shutdown_timeout_secs: get_u64_entry(node, "shutdown-timeout-secs")?
            .unwrap_or(defaults.shutdown_timeout_secs),
    };

    trace!(listen = %config.listen, "Parsed server section");
    Ok(config)
}

/// Parse the `cache` block.
pub(crate) fn parse_cache(node: &KdlNode) -> Result<CacheConfig> {
    let defaults = CacheConfig::default();

    let backend = match get_string_entry(node, "backend").as_deref() {
        None | Some("memory") => CacheBackend::Memory,
        Some("redis") => CacheBackend::Redis,
        Some(other) => {
            return Err(anyhow::anyhow!(
                "Invalid cache backend '{other}'. Valid backends: memory, redis"
            ));
        }
    };

    let config = CacheConfig {
        backend,
        url: get_string_entry(node, "url"),
        key_prefix: get_string_entry(node, "key-prefix").unwrap_or(defaults.key_prefix),
    };

    trace!(backend = ?config.backend, key_prefix = %config.key_prefix, "Parsed cache section");
    Ok(config)
}

/// Parse the `store` block.
pub(crate) fn parse_store(node: &KdlNode) -> Result<StoreConfig> {
    let backend = match get_string_entry(node, "backend").as_deref() {
        None | Some("memory") => StoreBackend::Memory,
        Some("file") => StoreBackend::File,
        Some(other) => {
            return Err(anyhow::anyhow!(
                "Invalid store backend '{other}'. Valid backends: memory, file"
            ));
        }
    };

    let config = StoreConfig {
        backend,
        path: get_string_entry(node, "path").map(PathBuf::from),
    };

    trace!(backend = ?config.backend, "Parsed store section");
    Ok(config)
}
