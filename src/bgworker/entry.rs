//! Worker process entry shim.
//!
//! Mirrors what the host does in a freshly spawned worker process. The
//! caller blocks signals before anything else; the shim then resolves the
//! entry point, creates the process latch and calls it. The returned
//! [`ProcExit`] becomes the process exit status.

use std::io;

use thiserror::Error;

use crate::bgworker::catalog::{Catalog, CatalogError};
use crate::lifecycle::{BlockedSignals, Latch, SignalError};

/// Exit status requested by a worker's main routine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcExit(pub i32);

impl ProcExit {
    pub fn code(self) -> i32 {
        self.0
    }
}

/// What the host hands to an entry point.
#[derive(Debug)]
pub struct WorkerContext {
    pub main_arg: i64,
    /// This process's wake-up primitive.
    pub latch: Latch,
    /// Signals are blocked until the worker unblocks them.
    pub signals: BlockedSignals,
}

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Signal(#[from] SignalError),
    #[error("could not create latch: {0}")]
    Latch(#[from] io::Error),
}

/// Run `library.function` in the current process.
///
/// `signals` must have been taken before any other process setup.
pub fn run_entry_point(
    catalog: &Catalog,
    signals: BlockedSignals,
    library: &str,
    function: &str,
    main_arg: i64,
) -> Result<ProcExit, LaunchError> {
    let entry = catalog.entry_point(library, function)?;
    let latch = Latch::new()?;

    tracing::debug!(library, function, main_arg, "Calling background worker entry point");

    let exit = entry(WorkerContext {
        main_arg,
        latch,
        signals,
    })?;
    Ok(exit)
}
