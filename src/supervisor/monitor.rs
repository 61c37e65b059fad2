//! Supervisor run loop.
//!
//! # Responsibilities
//! - Walk the start phases and launch workers whose start time has come
//! - Reap exits, apply exit-code and restart-policy rules
//! - Forward SIGHUP; on shutdown forward SIGTERM, wait, then SIGKILL
//!
//! # Exit rules
//! ```text
//! exit code 0          → unregister (never restarted)
//! any other exit       → RestartPolicy::Never     → unregister
//!                        RestartPolicy::After(d)  → relaunch after d
//! ```

use std::collections::{HashMap, HashSet};
use std::io;
use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;
use std::time::Duration;

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::{JoinError, JoinSet};
use tokio::time::{self, Instant};

use crate::bgworker::{Catalog, CatalogError, RegistrationError, RestartPolicy, StartTime};
use crate::config::SupervisorConfig;
use crate::lifecycle::Control;
use crate::observability::metrics;
use crate::supervisor::launcher::Launcher;
use crate::supervisor::registry::WorkerRegistry;

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// One reaped worker process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerExit {
    pub worker: String,
    pub pid: u32,
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

/// What happened during a supervisor run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SupervisorReport {
    pub exits: Vec<WorkerExit>,
}

type Reaped = (usize, u32, io::Result<ExitStatus>);

pub struct Supervisor<L: Launcher> {
    registry: WorkerRegistry,
    launcher: L,
    config: SupervisorConfig,
    /// Slots launched at least once; later launches are restarts.
    launched: HashSet<usize>,
    /// slot → pid of the live process.
    running: HashMap<usize, u32>,
    restarts: Vec<(Instant, usize)>,
    shutting_down: bool,
    report: SupervisorReport,
}

impl<L: Launcher> Supervisor<L> {
    pub fn new(config: SupervisorConfig, launcher: L) -> Self {
        Self {
            registry: WorkerRegistry::new(config.max_worker_processes),
            launcher,
            config,
            launched: HashSet::new(),
            running: HashMap::new(),
            restarts: Vec::new(),
            shutting_down: false,
            report: SupervisorReport::default(),
        }
    }

    pub fn registry(&self) -> &WorkerRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut WorkerRegistry {
        &mut self.registry
    }

    /// Run each library's load callback.
    ///
    /// Running out of slots skips the worker; any other failure is fatal.
    pub fn load_libraries(
        &mut self,
        catalog: &Catalog,
        libraries: &[String],
    ) -> Result<(), SupervisorError> {
        for name in libraries {
            match catalog.load(name, &mut self.registry) {
                Ok(()) => {}
                Err(CatalogError::Registration(e @ RegistrationError::SlotsExhausted { .. })) => {
                    tracing::warn!(library = %name, error = %e, "Background worker not registered");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Launch workers and supervise them until none is left or shutdown is requested.
    pub async fn run(mut self, mut control: broadcast::Receiver<Control>) -> SupervisorReport {
        let mut exits: JoinSet<Reaped> = JoinSet::new();

        for phase in StartTime::ALL {
            tracing::info!(phase = %phase, "Entering start phase");
            self.launch_phase(phase, &mut exits);
        }

        loop {
            if exits.is_empty() && self.restarts.is_empty() {
                tracing::info!("No background workers left to supervise");
                break;
            }

            let next_restart = self.restarts.iter().map(|(at, _)| *at).min();
            let restart_deadline =
                next_restart.unwrap_or_else(|| Instant::now() + Duration::from_secs(3600));

            tokio::select! {
                Some(joined) = exits.join_next() => {
                    self.reap(joined);
                }
                event = control.recv() => match event {
                    Ok(Control::Reload) => self.signal_all(Signal::SIGHUP),
                    Ok(Control::Shutdown) | Err(RecvError::Closed) => {
                        self.shutdown(&mut exits).await;
                        break;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Control events dropped");
                    }
                },
                _ = time::sleep_until(restart_deadline), if next_restart.is_some() => {
                    self.launch_due_restarts(&mut exits);
                }
            }
        }

        self.report
    }

    fn launch_phase(&mut self, phase: StartTime, exits: &mut JoinSet<Reaped>) {
        let due: Vec<usize> = self
            .registry
            .iter()
            .filter(|(slot, worker)| worker.start_time <= phase && !self.launched.contains(slot))
            .map(|(slot, _)| slot)
            .collect();

        for slot in due {
            self.launch(slot, exits);
        }
    }

    fn launch_due_restarts(&mut self, exits: &mut JoinSet<Reaped>) {
        let now = Instant::now();
        let (due, pending): (Vec<_>, Vec<_>) =
            self.restarts.drain(..).partition(|(at, _)| *at <= now);
        self.restarts = pending;

        for (_, slot) in due {
            self.launch(slot, exits);
        }
    }

    fn launch(&mut self, slot: usize, exits: &mut JoinSet<Reaped>) {
        let Some(worker) = self.registry.get(slot) else {
            return;
        };
        self.launched.insert(slot);

        match self.launcher.launch(worker) {
            Ok(mut child) => {
                // No pid means the child was already reaped; it cannot be signalled.
                let Some(pid) = child.id() else {
                    tracing::error!(
                        worker = %worker.name,
                        "Background worker exited before it was tracked"
                    );
                    self.after_exit(slot);
                    return;
                };
                tracing::info!(worker = %worker.name, pid, "Started background worker");
                metrics::record_worker_launched(&worker.name);
                notify(worker.notify_pid);

                self.running.insert(slot, pid);
                exits.spawn(async move {
                    let status = child.wait().await;
                    (slot, pid, status)
                });
            }
            Err(e) => {
                tracing::error!(
                    worker = %worker.name,
                    error = %e,
                    "Could not start background worker"
                );
                self.after_exit(slot);
            }
        }
    }

    fn reap(&mut self, joined: Result<Reaped, JoinError>) {
        let (slot, pid, status) = match joined {
            Ok(reaped) => reaped,
            Err(e) => {
                tracing::error!(error = %e, "Worker wait task failed");
                return;
            }
        };
        self.running.remove(&slot);

        let Some(worker) = self.registry.get(slot) else {
            return;
        };
        let name = worker.name.clone();
        notify(worker.notify_pid);

        let (code, signal) = match &status {
            Ok(status) => (status.code(), status.signal()),
            Err(e) => {
                tracing::error!(
                    worker = %name,
                    pid,
                    error = %e,
                    "Could not wait for background worker"
                );
                (None, None)
            }
        };
        self.report.exits.push(WorkerExit {
            worker: name.clone(),
            pid,
            code,
            signal,
        });

        match (code, signal) {
            (Some(0), _) => {
                tracing::info!(worker = %name, pid, "Background worker exited with exit code 0");
                metrics::record_worker_exit(&name, "clean");
                self.registry.unregister(slot);
                self.launched.remove(&slot);
            }
            (Some(code), _) => {
                tracing::info!(
                    worker = %name,
                    pid,
                    code,
                    "Background worker exited with exit code {}",
                    code
                );
                metrics::record_worker_exit(&name, "restartable");
                self.after_exit(slot);
            }
            (None, Some(signal)) => {
                tracing::warn!(
                    worker = %name,
                    pid,
                    signal,
                    "Background worker was terminated by signal {}",
                    signal
                );
                metrics::record_worker_exit(&name, "signaled");
                self.after_exit(slot);
            }
            (None, None) => self.after_exit(slot),
        }
    }

    /// Apply the restart policy to a worker that is no longer running.
    fn after_exit(&mut self, slot: usize) {
        let Some(worker) = self.registry.get(slot) else {
            return;
        };

        match worker.restart {
            RestartPolicy::After(interval) if !self.shutting_down => {
                tracing::info!(
                    worker = %worker.name,
                    ?interval,
                    "Scheduling background worker restart"
                );
                self.restarts.push((Instant::now() + interval, slot));
            }
            _ => {
                self.registry.unregister(slot);
                self.launched.remove(&slot);
            }
        }
    }

    fn signal_all(&self, signal: Signal) {
        for (&slot, &pid) in &self.running {
            let worker = self
                .registry
                .get(slot)
                .map_or("<unregistered>", |w| w.name.as_str());
            tracing::debug!(worker, pid, %signal, "Signalling background worker");

            if let Err(e) = kill(Pid::from_raw(pid as i32), signal) {
                tracing::warn!(
                    worker,
                    pid,
                    %signal,
                    error = %e,
                    "Could not signal background worker"
                );
            }
        }
    }

    async fn shutdown(&mut self, exits: &mut JoinSet<Reaped>) {
        self.shutting_down = true;
        self.restarts.clear();

        tracing::info!(workers = self.running.len(), "Stopping background workers");
        self.signal_all(Signal::SIGTERM);

        let deadline = Duration::from_secs(self.config.shutdown_timeout_secs);
        let drained = time::timeout(deadline, async {
            while let Some(joined) = exits.join_next().await {
                self.reap(joined);
            }
        })
        .await;

        if drained.is_err() {
            tracing::warn!(
                remaining = self.running.len(),
                "Background workers did not stop in time, killing them"
            );
            self.signal_all(Signal::SIGKILL);
            while let Some(joined) = exits.join_next().await {
                self.reap(joined);
            }
        }
    }
}

fn notify(pid: Option<u32>) {
    if let Some(pid) = pid {
        if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGUSR1) {
            tracing::debug!(pid, error = %e, "Could not notify process");
        }
    }
}
