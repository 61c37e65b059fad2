//! Shared utilities for process-level tests.

use std::io::{self, BufRead, BufReader};
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use nix::sys::signal::{kill, pthread_sigmask, SigmaskHow, Signal};
use nix::unistd::Pid;
use watch_backend::lifecycle::startup_block_set;

pub const BIN: &str = env!("CARGO_BIN_EXE_watch-backend");

/// A running `watch-backend` process whose stderr is drained on a thread.
///
/// The worker logs on every loop iteration, so stderr must be read
/// continuously or the child blocks on a full pipe.
pub struct Spawned {
    pub child: Child,
    lines: Arc<AtomicUsize>,
    head: Arc<Mutex<Vec<String>>>,
    needles: &'static [&'static str],
    counts: Arc<Vec<AtomicUsize>>,
    drained: Arc<AtomicBool>,
}

/// Number of leading stderr lines kept verbatim.
const HEAD_LINES: usize = 32;

impl Spawned {
    /// Spawn the binary with `args`, counting stderr lines that contain each of `needles`.
    pub fn start(args: &[&str], needles: &'static [&'static str]) -> Self {
        Self::spawn(Self::command(args), needles)
    }

    /// Like [`Spawned::start`], but the child starts with signals blocked,
    /// as the supervisor launches workers.
    pub fn start_blocked(args: &[&str], needles: &'static [&'static str]) -> Self {
        let mut command = Self::command(args);
        let blocked = startup_block_set();
        // SAFETY: only pthread_sigmask runs between fork and exec.
        unsafe {
            command.pre_exec(move || {
                pthread_sigmask(SigmaskHow::SIG_BLOCK, Some(&blocked), None)
                    .map_err(io::Error::from)
            });
        }
        Self::spawn(command, needles)
    }

    fn command(args: &[&str]) -> Command {
        let mut command = Command::new(BIN);
        command
            .args(args)
            .env("NO_COLOR", "1")
            .env_remove("RUST_LOG")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        command
    }

    fn spawn(mut command: Command, needles: &'static [&'static str]) -> Self {
        let mut child = command.spawn().expect("failed to spawn watch-backend");

        let stderr = child.stderr.take().unwrap();
        let lines = Arc::new(AtomicUsize::new(0));
        let head = Arc::new(Mutex::new(Vec::new()));
        let counts: Arc<Vec<AtomicUsize>> =
            Arc::new(needles.iter().map(|_| AtomicUsize::new(0)).collect());

        let total = Arc::clone(&lines);
        let kept = Arc::clone(&head);
        let matched = Arc::clone(&counts);
        let drained = Arc::new(AtomicBool::new(false));
        let done = Arc::clone(&drained);
        thread::spawn(move || {
            for line in BufReader::new(stderr).lines() {
                let Ok(line) = line else { break };
                if total.fetch_add(1, Ordering::SeqCst) < HEAD_LINES {
                    kept.lock().unwrap().push(line.clone());
                }
                for (needle, count) in needles.iter().zip(matched.iter()) {
                    if line.contains(needle) {
                        count.fetch_add(1, Ordering::SeqCst);
                    }
                }
            }
            done.store(true, Ordering::SeqCst);
        });

        Self {
            child,
            lines,
            head,
            needles,
            counts,
            drained,
        }
    }

    /// The watch_backend worker, launched the way the supervisor launches it.
    pub fn worker() -> Self {
        Self::start_blocked(
            &[
                "worker",
                "--library",
                "watch_backend",
                "--function",
                "watch_backend_main",
            ],
            &["worker started", "worker is alive"],
        )
    }

    pub fn pid(&self) -> Pid {
        Pid::from_raw(self.child.id() as i32)
    }

    pub fn line_count(&self) -> usize {
        self.lines.load(Ordering::SeqCst)
    }

    /// The first stderr lines, verbatim.
    pub fn head(&self) -> Vec<String> {
        self.head.lock().unwrap().clone()
    }

    /// Lines seen so far containing `needle`, which must be one of the spawn needles.
    pub fn count_matching(&self, needle: &str) -> usize {
        let index = self
            .needles
            .iter()
            .position(|n| *n == needle)
            .expect("needle was not registered at spawn");
        self.counts[index].load(Ordering::SeqCst)
    }

    /// Wait until a line containing `needle` has been seen.
    pub fn wait_for(&self, needle: &str, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if self.count_matching(needle) > 0 {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        false
    }

    /// Wait until stderr reaches end of file, so every line has been counted.
    pub fn wait_drained(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if self.drained.load(Ordering::SeqCst) {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        false
    }

    pub fn signal(&self, signal: Signal) {
        kill(self.pid(), signal).expect("failed to signal process");
    }

    /// Poll for exit until `timeout`.
    pub fn wait_exit(&mut self, timeout: Duration) -> Option<ExitStatus> {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if let Some(status) = self.child.try_wait().unwrap() {
                return Some(status);
            }
            thread::sleep(Duration::from_millis(10));
        }
        None
    }
}

impl Drop for Spawned {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
