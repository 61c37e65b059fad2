//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (slot count > 0, addresses parse)
//! - Reject empty or duplicate preload library names
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: WatchConfig → Result<(), Vec<ValidationError>>

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::WatchConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("supervisor.max_worker_processes must be at least 1")]
    NoWorkerSlots,
    #[error("supervisor.preload_libraries contains an empty name")]
    EmptyLibraryName,
    #[error("supervisor.preload_libraries lists {0:?} more than once")]
    DuplicateLibrary(String),
    #[error("observability.log_level {0:?} is not one of trace, debug, info, warn, error")]
    UnknownLogLevel(String),
    #[error("observability.metrics_address {0:?} is not a socket address")]
    BadMetricsAddress(String),
}

/// Check a parsed configuration, collecting every problem found.
pub fn validate_config(config: &WatchConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.supervisor.max_worker_processes == 0 {
        errors.push(ValidationError::NoWorkerSlots);
    }

    let mut seen = HashSet::new();
    for library in &config.supervisor.preload_libraries {
        if library.is_empty() {
            errors.push(ValidationError::EmptyLibraryName);
        } else if !seen.insert(library.as_str()) {
            errors.push(ValidationError::DuplicateLibrary(library.clone()));
        }
    }

    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::UnknownLogLevel(
            config.observability.log_level.clone(),
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::BadMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
