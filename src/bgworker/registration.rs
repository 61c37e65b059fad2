//! Background worker registration descriptors.
//!
//! # Responsibilities
//! - Describe a worker: capability flags, start phase, restart policy,
//!   entry point (library + function), main argument, notify pid
//! - Validate a description against host rules before it takes a slot
//!
//! # Design Decisions
//! - Descriptions are plain data; registration goes through [`WorkerRegistrar`]
//! - An empty worker name falls back to the function name

use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Size of the name fields, terminator included.
pub const BGW_MAXLEN: usize = 96;

/// Capability requests passed to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct WorkerFlags(u32);

impl WorkerFlags {
    /// The worker attaches to shared memory.
    pub const SHMEM_ACCESS: Self = Self(0x0001);
    /// The worker opens a database connection. Requires [`Self::SHMEM_ACCESS`].
    pub const BACKEND_DATABASE_CONNECTION: Self = Self(0x0002);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for WorkerFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for WorkerFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Host lifecycle point after which a worker may be started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum StartTime {
    PostmasterStart,
    ConsistentState,
    RecoveryFinished,
}

impl StartTime {
    /// All phases in the order the host passes through them.
    pub const ALL: [StartTime; 3] = [
        StartTime::PostmasterStart,
        StartTime::ConsistentState,
        StartTime::RecoveryFinished,
    ];
}

impl fmt::Display for StartTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StartTime::PostmasterStart => "postmaster start",
            StartTime::ConsistentState => "consistent state",
            StartTime::RecoveryFinished => "recovery finished",
        };
        f.write_str(name)
    }
}

/// What the host does after the worker exits with a non-zero status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RestartPolicy {
    Never,
    After(Duration),
}

impl From<Option<Duration>> for RestartPolicy {
    fn from(interval: Option<Duration>) -> Self {
        interval.map_or(RestartPolicy::Never, RestartPolicy::After)
    }
}

/// A background worker as handed to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackgroundWorker {
    pub name: String,
    pub worker_type: String,
    pub flags: WorkerFlags,
    pub start_time: StartTime,
    pub restart: RestartPolicy,
    pub library_name: String,
    pub function_name: String,
    pub main_arg: i64,
    /// Process to send SIGUSR1 to when this worker starts or stops.
    pub notify_pid: Option<u32>,
}

/// Reasons the host refuses a registration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("background worker {field} must not be empty")]
    EmptyField { field: &'static str },
    #[error("background worker {field} is {len} bytes, limit is {limit}")]
    NameTooLong {
        field: &'static str,
        len: usize,
        limit: usize,
    },
    #[error("background worker \"{0}\": must attach to shared memory in order to request a database connection")]
    DatabaseWithoutShmem(String),
    #[error("background worker \"{0}\": cannot request database access if starting at postmaster start")]
    DatabaseAtPostmasterStart(String),
    #[error("too many background workers: up to {max} can be registered")]
    SlotsExhausted { max: usize },
}

fn check_name(field: &'static str, value: &str) -> Result<(), RegistrationError> {
    if value.is_empty() {
        return Err(RegistrationError::EmptyField { field });
    }
    if value.len() >= BGW_MAXLEN {
        return Err(RegistrationError::NameTooLong {
            field,
            len: value.len(),
            limit: BGW_MAXLEN - 1,
        });
    }
    Ok(())
}

impl BackgroundWorker {
    /// Fill defaulted names and check host rules.
    pub fn validate(mut self) -> Result<Self, RegistrationError> {
        if self.name.is_empty() {
            self.name = self.function_name.clone();
        }
        if self.worker_type.is_empty() {
            self.worker_type = self.name.clone();
        }

        check_name("library name", &self.library_name)?;
        check_name("function name", &self.function_name)?;
        check_name("name", &self.name)?;
        check_name("type", &self.worker_type)?;

        if self.flags.contains(WorkerFlags::BACKEND_DATABASE_CONNECTION) {
            if !self.flags.contains(WorkerFlags::SHMEM_ACCESS) {
                return Err(RegistrationError::DatabaseWithoutShmem(self.name));
            }
            if self.start_time == StartTime::PostmasterStart {
                return Err(RegistrationError::DatabaseAtPostmasterStart(self.name));
            }
        }

        Ok(self)
    }
}

/// Anything that accepts worker registrations.
pub trait WorkerRegistrar {
    fn register(&mut self, worker: BackgroundWorker) -> Result<(), RegistrationError>;
}

/// Builder for [`BackgroundWorker`].
///
/// Defaults: no capability flags, start after recovery finished, never
/// restart, main argument 0, no notify pid.
#[derive(Debug, Clone)]
pub struct BackgroundWorkerBuilder {
    worker: BackgroundWorker,
}

impl BackgroundWorkerBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            worker: BackgroundWorker {
                name: name.to_string(),
                worker_type: String::new(),
                flags: WorkerFlags::empty(),
                start_time: StartTime::RecoveryFinished,
                restart: RestartPolicy::Never,
                library_name: String::new(),
                function_name: String::new(),
                main_arg: 0,
                notify_pid: None,
            },
        }
    }

    pub fn set_type(mut self, worker_type: &str) -> Self {
        self.worker.worker_type = worker_type.to_string();
        self
    }

    pub fn set_library(mut self, library: &str) -> Self {
        self.worker.library_name = library.to_string();
        self
    }

    pub fn set_function(mut self, function: &str) -> Self {
        self.worker.function_name = function.to_string();
        self
    }

    pub fn enable_shmem_access(mut self) -> Self {
        self.worker.flags |= WorkerFlags::SHMEM_ACCESS;
        self
    }

    pub fn enable_database_connection(mut self) -> Self {
        self.worker.flags |= WorkerFlags::BACKEND_DATABASE_CONNECTION;
        self
    }

    pub fn set_start_time(mut self, start_time: StartTime) -> Self {
        self.worker.start_time = start_time;
        self
    }

    /// `None` means never restart.
    pub fn set_restart_time(mut self, interval: Option<Duration>) -> Self {
        self.worker.restart = interval.into();
        self
    }

    pub fn set_argument(mut self, main_arg: i64) -> Self {
        self.worker.main_arg = main_arg;
        self
    }

    pub fn set_notify_pid(mut self, pid: Option<u32>) -> Self {
        self.worker.notify_pid = pid;
        self
    }

    pub fn build(self) -> BackgroundWorker {
        self.worker
    }
}
