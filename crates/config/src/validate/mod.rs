//! Configuration validation.
//!
//! Collects every problem in one pass instead of failing on the first,
//! so `atrium test-config` reports the whole picture.

mod lifecycle;
mod network;

use std::fmt;

use crate::model::Config;

/// Category a validation error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Cache,
    Store,
    Sessions,
    Domains,
    Issuer,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCategory::Network => "network",
            ErrorCategory::Cache => "cache",
            ErrorCategory::Store => "store",
            ErrorCategory::Sessions => "sessions",
            ErrorCategory::Domains => "domains",
            ErrorCategory::Issuer => "issuer",
        };
        write!(f, "{name}")
    }
}

/// A hard configuration error; the daemon refuses to start.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub category: ErrorCategory,
    pub message: String,
}

impl ValidationError {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.category, self.message)
    }
}

/// A suspicious but workable setting; logged, never fatal.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub message: String,
}

impl ValidationWarning {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Accumulated validation outcome.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    pub fn merge(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Run every validation pass over the configuration.
pub(crate) fn validate(config: &Config) -> ValidationResult {
    let mut result = ValidationResult::new();
    result.merge(network::validate_listener(config));
    result.merge(network::validate_cache(config));
    result.merge(network::validate_store(config));
    result.merge(lifecycle::validate_sessions(config));
    result.merge(lifecycle::validate_domains(config));
    result.merge(lifecycle::validate_issuer(config));
    result
}
