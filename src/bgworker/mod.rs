//! Background worker host interface.
//!
//! # Data Flow
//! ```text
//! Supervisor startup:
//!     catalog.rs (find library) → Library::init → registration.rs (validate)
//!     → WorkerRegistrar (slot table)
//!
//! Worker process:
//!     entry.rs (block signals, create latch) → catalog.rs (resolve entry point)
//!     → entry point → ProcExit → process exit status
//! ```

pub mod catalog;
pub mod entry;
pub mod registration;

pub use catalog::{Catalog, CatalogError, EntryPoint, Library, LoadCallback};
pub use entry::{run_entry_point, LaunchError, ProcExit, WorkerContext};
pub use registration::{
    BackgroundWorker, BackgroundWorkerBuilder, RegistrationError, RestartPolicy, StartTime,
    WorkerFlags, WorkerRegistrar, BGW_MAXLEN,
};
