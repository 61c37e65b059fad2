//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Worker process (signals.rs, latch.rs):
//!     Spawned blocked → Block signals → Install SIGTERM/SIGHUP handlers
//!         → Unblock → Main loop
//!     Handlers: store flag, set latch, nothing else
//!
//! Supervisor process (signals.rs, control.rs):
//!     SIGTERM/SIGINT → Control::Shutdown → forward SIGTERM to workers
//!     SIGHUP → Control::Reload → forward SIGHUP to workers
//! ```
//!
//! # Design Decisions
//! - Handler installation strictly precedes unblocking (typestate)
//! - Shutdown has timeout: workers are killed after the deadline

pub mod control;
pub mod latch;
pub mod signals;

pub use control::{Control, ControlHandle};
pub use latch::Latch;
pub use signals::{
    startup_block_set, BlockedSignals, HandlersInstalled, SignalError, SignalFlags, SignalListener,
};
