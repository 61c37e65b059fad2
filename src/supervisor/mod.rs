//! Host process supervisor.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     preload libraries → Library::init → registry.rs (bounded slots)
//!
//! Run (monitor.rs):
//!     start phases → launcher.rs (spawn `worker` child) → wait task per child
//!     child exit → exit-code rules → restart policy
//!     Control::Reload → SIGHUP to workers
//!     Control::Shutdown → SIGTERM, deadline, SIGKILL
//! ```
//!
//! # Design Decisions
//! - No recovery is modelled; start phases advance immediately
//! - A worker crash does not restart its siblings

pub mod launcher;
pub mod monitor;
pub mod registry;

pub use launcher::{Launcher, ProcessLauncher};
pub use monitor::{Supervisor, SupervisorError, SupervisorReport, WorkerExit};
pub use registry::WorkerRegistry;
