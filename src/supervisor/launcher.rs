//! Starting worker processes.

use std::io;
use std::path::PathBuf;
use std::process::Stdio;

use nix::sys::signal::{pthread_sigmask, SigmaskHow};
use tokio::process::{Child, Command};

use crate::bgworker::BackgroundWorker;
use crate::lifecycle::startup_block_set;

/// Spawns the process that runs a worker's entry point.
pub trait Launcher: Send + Sync {
    fn launch(&self, worker: &BackgroundWorker) -> io::Result<Child>;
}

/// Re-executes a binary with the `worker` subcommand.
///
/// Children get their own process group so terminal signals reach only the
/// supervisor, which forwards them. They start with every asynchronous
/// signal blocked; the worker unblocks once its handlers are installed.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    program: PathBuf,
    config_path: Option<PathBuf>,
}

impl ProcessLauncher {
    pub fn new(program: PathBuf, config_path: Option<PathBuf>) -> Self {
        Self {
            program,
            config_path,
        }
    }

    /// Launch workers with the currently running executable.
    pub fn current_exe(config_path: Option<PathBuf>) -> io::Result<Self> {
        Ok(Self::new(std::env::current_exe()?, config_path))
    }

    fn command(&self, worker: &BackgroundWorker) -> Command {
        let mut command = Command::new(&self.program);
        if let Some(path) = &self.config_path {
            command.arg("--config").arg(path);
        }
        command
            .arg("worker")
            .arg("--library")
            .arg(&worker.library_name)
            .arg("--function")
            .arg(&worker.function_name)
            .arg(format!("--main-arg={}", worker.main_arg));
        command
    }
}

impl Launcher for ProcessLauncher {
    fn launch(&self, worker: &BackgroundWorker) -> io::Result<Child> {
        spawn_blocked(self.command(worker))
    }
}

/// Spawn `command` in its own process group with the startup signal set blocked.
fn spawn_blocked(mut command: Command) -> io::Result<Child> {
    let blocked = startup_block_set();
    // SAFETY: runs in the forked child before exec and only calls
    // pthread_sigmask, which is async-signal-safe and does not allocate.
    unsafe {
        command.pre_exec(move || {
            pthread_sigmask(SigmaskHow::SIG_BLOCK, Some(&blocked), None).map_err(io::Error::from)
        });
    }

    command
        .stdin(Stdio::null())
        .process_group(0)
        .kill_on_drop(true)
        .spawn()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bgworker::BackgroundWorkerBuilder;
    use nix::sys::signal::Signal;

    #[test]
    fn test_command_line() {
        let launcher = ProcessLauncher::new(
            PathBuf::from("/usr/bin/watch-backend"),
            Some(PathBuf::from("/etc/watch.toml")),
        );
        let worker = BackgroundWorkerBuilder::new("w")
            .set_library("watch_backend")
            .set_function("watch_backend_main")
            .set_argument(-3)
            .build();

        let command = launcher.command(&worker);
        let args: Vec<_> = command
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec![
                "--config",
                "/etc/watch.toml",
                "worker",
                "--library",
                "watch_backend",
                "--function",
                "watch_backend_main",
                "--main-arg=-3",
            ]
        );
    }

    #[tokio::test]
    async fn test_children_start_with_signals_blocked() {
        let mut command = Command::new("grep");
        command
            .arg("^SigBlk:")
            .arg("/proc/self/status")
            .stdout(Stdio::piped());

        let output = spawn_blocked(command)
            .unwrap()
            .wait_with_output()
            .await
            .unwrap();
        assert!(output.status.success());

        let line = String::from_utf8(output.stdout).unwrap();
        let mask = u64::from_str_radix(line.trim_start_matches("SigBlk:").trim(), 16).unwrap();
        for signal in [Signal::SIGTERM, Signal::SIGHUP, Signal::SIGINT] {
            assert_ne!(mask & (1u64 << (signal as i32 - 1)), 0, "{signal} is not blocked");
        }
    }
}
