//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Supervisor and worker produce:
//!     → logging.rs (structured log events, stderr)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → Log aggregation (stderr)
//!     → Metrics endpoint (Prometheus scrape, supervisor only)
//! ```

pub mod logging;
pub mod metrics;
