//! The `watch_backend` library: one background worker that logs until told
//! to terminate.
//!
//! # Registration
//! Shared memory access and a database connection, started once recovery
//! has finished, never restarted.
//!
//! # Main routine
//! ```text
//! install SIGTERM/SIGHUP handlers → unblock signals → startup record
//!     → busy-poll (one record per iteration) → exit status 1
//! ```

pub mod main_loop;

use crate::bgworker::{
    BackgroundWorkerBuilder, EntryPoint, Library, ProcExit, RegistrationError, StartTime,
    WorkerContext, WorkerRegistrar,
};
use crate::lifecycle::SignalError;

pub use main_loop::{WatchLoop, WorkerState, TERMINATED};

pub const LIBRARY_NAME: &str = "watch_backend";
pub const FUNCTION_NAME: &str = "watch_backend_main";

pub const LIBRARY: Library = Library {
    name: LIBRARY_NAME,
    init,
    entry_points: &[(FUNCTION_NAME, watch_backend_main as EntryPoint)],
};

/// Load callback: register the worker with the host.
pub fn init(registrar: &mut dyn WorkerRegistrar) -> Result<(), RegistrationError> {
    let worker = BackgroundWorkerBuilder::new(LIBRARY_NAME)
        .set_library(LIBRARY_NAME)
        .set_function(FUNCTION_NAME)
        .enable_shmem_access()
        .enable_database_connection()
        .set_start_time(StartTime::RecoveryFinished)
        .set_restart_time(None)
        .set_notify_pid(None)
        .build();

    registrar.register(worker)
}

/// Worker main routine.
pub fn watch_backend_main(ctx: WorkerContext) -> Result<ProcExit, SignalError> {
    let WorkerContext { latch, signals, .. } = ctx;

    let flags = signals.install_handlers(&latch)?.unblock()?;

    Ok(WatchLoop::new(&flags).run())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bgworker::{BackgroundWorker, RestartPolicy, WorkerFlags};

    #[derive(Default)]
    struct Collect(Vec<BackgroundWorker>);

    impl WorkerRegistrar for Collect {
        fn register(&mut self, worker: BackgroundWorker) -> Result<(), RegistrationError> {
            self.0.push(worker.validate()?);
            Ok(())
        }
    }

    #[test]
    fn test_registration_contract() {
        let mut collected = Collect::default();
        init(&mut collected).unwrap();

        let worker = &collected.0[0];
        assert_eq!(
            worker.flags,
            WorkerFlags::SHMEM_ACCESS | WorkerFlags::BACKEND_DATABASE_CONNECTION
        );
        assert_eq!(worker.start_time, StartTime::RecoveryFinished);
        assert_eq!(worker.restart, RestartPolicy::Never);
        assert_eq!(worker.library_name, "watch_backend");
        assert_eq!(worker.function_name, "watch_backend_main");
        assert_eq!(worker.notify_pid, None);
    }
}
