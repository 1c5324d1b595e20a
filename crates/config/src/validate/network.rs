//! Listener, cache, and store validation.

use std::net::SocketAddr;

use super::{ErrorCategory, ValidationError, ValidationResult, ValidationWarning};
use crate::model::{CacheBackend, Config, StoreBackend};

/// Validate the admin listener address.
pub(crate) fn validate_listener(config: &Config) -> ValidationResult {
    let mut result = ValidationResult::new();

    match config.server.listen.parse::<SocketAddr>() {
        Ok(addr) => {
            if addr.ip().is_unspecified() {
                result.add_warning(ValidationWarning::new(format!(
                    "Admin listener binds all interfaces ({addr}); the admin API has no \
                     network-level protection of its own"
                )));
            }
        }
        Err(_) => {
            result.add_error(ValidationError::new(
                ErrorCategory::Network,
                format!(
                    "Invalid listen address '{}', expected host:port",
                    config.server.listen
                ),
            ));
        }
    }

    if config.server.shutdown_timeout_secs == 0 {
        result.add_warning(ValidationWarning::new(
            "shutdown-timeout-secs is 0; in-flight requests are dropped on shutdown",
        ));
    }

    result
}

/// Validate cache backend settings.
pub(crate) fn validate_cache(config: &Config) -> ValidationResult {
    let mut result = ValidationResult::new();

    match config.cache.backend {
        CacheBackend::Redis => match config.cache.url.as_deref() {
            None => result.add_error(ValidationError::new(
                ErrorCategory::Cache,
                "Cache backend 'redis' requires a 'url'",
            )),
            Some(url) if !url.starts_with("redis://") && !url.starts_with("rediss://") => {
                result.add_error(ValidationError::new(
                    ErrorCategory::Cache,
                    format!("Cache URL '{url}' must use the redis:// or rediss:// scheme"),
                ));
            }
            Some(_) => {}
        },
        CacheBackend::Memory => {
            if config.cache.url.is_some() {
                result.add_warning(ValidationWarning::new(
                    "Cache 'url' is ignored for the memory backend",
                ));
            }
        }
    }

    if config.cache.key_prefix.is_empty() {
        result.add_error(ValidationError::new(
            ErrorCategory::Cache,
            "Cache 'key-prefix' must not be empty",
        ));
    }

    result
}

/// Validate durable store settings.
pub(crate) fn validate_store(config: &Config) -> ValidationResult {
    let mut result = ValidationResult::new();

    match config.store.backend {
        StoreBackend::File => match &config.store.path {
            None => result.add_error(ValidationError::new(
                ErrorCategory::Store,
                "Store backend 'file' requires a 'path'",
            )),
            Some(path) => {
                if let Some(parent) = path.parent() {
                    if !parent.as_os_str().is_empty() && !parent.exists() {
                        result.add_warning(ValidationWarning::new(format!(
                            "Store directory {} does not exist yet; it is created at startup",
                            parent.display()
                        )));
                    }
                }
            }
        },
        StoreBackend::Memory => {
            result.add_warning(ValidationWarning::new(
                "Store backend 'memory' is volatile; sessions and domains are lost on restart",
            ));
        }
    }

    result
}
