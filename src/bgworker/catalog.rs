//! Loadable worker libraries.
//!
//! A library has a load callback, run once by the supervisor at startup to
//! register workers, and a table of named entry points that worker processes
//! resolve by `(library, function)`.

use thiserror::Error;

use crate::bgworker::entry::{ProcExit, WorkerContext};
use crate::bgworker::registration::{RegistrationError, WorkerRegistrar};
use crate::lifecycle::SignalError;

/// Registers the library's workers.
pub type LoadCallback = fn(&mut dyn WorkerRegistrar) -> Result<(), RegistrationError>;

/// Main routine of a worker process.
pub type EntryPoint = fn(WorkerContext) -> Result<ProcExit, SignalError>;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("could not access library \"{0}\"")]
    UnknownLibrary(String),
    #[error("could not find function \"{function}\" in library \"{library}\"")]
    UnknownFunction { library: String, function: String },
    #[error(transparent)]
    Registration(#[from] RegistrationError),
}

/// A loadable library.
#[derive(Debug, Clone, Copy)]
pub struct Library {
    pub name: &'static str,
    pub init: LoadCallback,
    pub entry_points: &'static [(&'static str, EntryPoint)],
}

impl Library {
    pub fn entry_point(&self, function: &str) -> Result<EntryPoint, CatalogError> {
        self.entry_points
            .iter()
            .find(|(name, _)| *name == function)
            .map(|(_, entry)| *entry)
            .ok_or_else(|| CatalogError::UnknownFunction {
                library: self.name.to_string(),
                function: function.to_string(),
            })
    }
}

const BUILTIN: &[Library] = &[crate::worker::LIBRARY];

/// The set of libraries this binary can load.
#[derive(Debug, Clone, Copy)]
pub struct Catalog {
    libraries: &'static [Library],
}

impl Catalog {
    pub const fn new(libraries: &'static [Library]) -> Self {
        Self { libraries }
    }

    /// Libraries compiled into this binary.
    pub const fn builtin() -> Self {
        Self::new(BUILTIN)
    }

    pub fn library(&self, name: &str) -> Result<&'static Library, CatalogError> {
        self.libraries
            .iter()
            .find(|lib| lib.name == name)
            .ok_or_else(|| CatalogError::UnknownLibrary(name.to_string()))
    }

    pub fn entry_point(&self, library: &str, function: &str) -> Result<EntryPoint, CatalogError> {
        self.library(library)?.entry_point(function)
    }

    /// Run a library's load callback against `registrar`.
    pub fn load(
        &self,
        name: &str,
        registrar: &mut dyn WorkerRegistrar,
    ) -> Result<(), CatalogError> {
        let library = self.library(name)?;
        tracing::info!(library = name, "Loading library");
        (library.init)(registrar)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bgworker::registration::BackgroundWorker;

    #[derive(Default)]
    struct Collect(Vec<BackgroundWorker>);

    impl WorkerRegistrar for Collect {
        fn register(&mut self, worker: BackgroundWorker) -> Result<(), RegistrationError> {
            self.0.push(worker);
            Ok(())
        }
    }

    #[test]
    fn test_builtin_has_watch_backend() {
        let catalog = Catalog::builtin();
        assert!(catalog.entry_point("watch_backend", "watch_backend_main").is_ok());
    }

    #[test]
    fn test_unknown_names() {
        let catalog = Catalog::builtin();
        assert!(matches!(
            catalog.library("nope"),
            Err(CatalogError::UnknownLibrary(name)) if name == "nope"
        ));
        let err = catalog.entry_point("watch_backend", "missing").unwrap_err();
        assert_eq!(
            err.to_string(),
            "could not find function \"missing\" in library \"watch_backend\""
        );
    }

    #[test]
    fn test_load_runs_callback() {
        let mut collected = Collect::default();
        Catalog::builtin()
            .load("watch_backend", &mut collected)
            .unwrap();
        assert_eq!(collected.0.len(), 1);
        assert_eq!(collected.0[0].function_name, "watch_backend_main");
    }
}
