//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber for supervisor and worker processes
//! - Pick the log level from `RUST_LOG`, falling back to the config
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - Compact format by default, JSON for machine parsing, pretty for humans
//! - Logs go to stderr so stdout stays clean for `describe`; worker children
//!   inherit the supervisor's stderr

use std::io;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, ObservabilityConfig};

/// Install the global subscriber.
///
/// A second call in the same process is ignored.
pub fn init_logging(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_ascii_lowercase()));
    let registry = tracing_subscriber::registry().with(filter);

    let layer = fmt::layer().with_writer(io::stderr);
    let result = match config.log_format {
        LogFormat::Compact => registry.with(layer.compact()).try_init(),
        LogFormat::Pretty => registry.with(layer.pretty()).try_init(),
        LogFormat::Json => registry.with(layer.json()).try_init(),
    };

    if let Err(e) = result {
        tracing::debug!(error = %e, "Log subscriber already installed");
    }
}
