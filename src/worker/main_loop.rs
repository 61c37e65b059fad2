//! The watch loop.
//!
//! # States
//! - Running: entered when the loop starts
//! - Terminating: termination flag observed; terminal
//!
//! The loop busy-polls. It has no sleep, no latch wait and no reload check;
//! every iteration emits one INFO record and re-reads the termination flag.

use crate::bgworker::ProcExit;
use crate::lifecycle::SignalFlags;
use crate::observability::metrics;

/// Exit status reported once termination is observed.
pub const TERMINATED: ProcExit = ProcExit(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Running,
    Terminating,
}

pub struct WatchLoop<'a> {
    flags: &'a SignalFlags,
    state: WorkerState,
    iterations: u64,
}

impl<'a> WatchLoop<'a> {
    /// `flags` can only be obtained after signals are unblocked.
    pub fn new(flags: &'a SignalFlags) -> Self {
        Self {
            flags,
            state: WorkerState::Running,
            iterations: 0,
        }
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    /// Log the startup record, then poll until termination is requested.
    pub fn run(&mut self) -> ProcExit {
        tracing::info!("watch_backend worker started");

        while !self.flags.termination_requested() {
            tracing::info!("watch_backend worker is alive");
            metrics::record_loop_iteration();
            self.iterations += 1;
        }

        self.state = WorkerState::Terminating;
        TERMINATED
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    /// Collects formatted records; requests termination after `trip_after` of them.
    #[derive(Clone)]
    struct TrippingWriter {
        records: Arc<Mutex<Vec<String>>>,
        flags: SignalFlags,
        trip_after: usize,
    }

    impl io::Write for TrippingWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let mut records = self.records.lock().unwrap();
            records.push(String::from_utf8_lossy(buf).into_owned());
            if records.len() >= self.trip_after {
                self.flags.request_termination();
            }
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn run_capturing(flags: &SignalFlags, trip_after: usize) -> (ProcExit, u64, Vec<String>) {
        let writer = TrippingWriter {
            records: Arc::new(Mutex::new(Vec::new())),
            flags: flags.clone(),
            trip_after,
        };
        let records = Arc::clone(&writer.records);
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .without_time()
            .finish();

        let (exit, iterations) = tracing::subscriber::with_default(subscriber, || {
            let mut watch = WatchLoop::new(flags);
            let exit = watch.run();
            assert_eq!(watch.state(), WorkerState::Terminating);
            (exit, watch.iterations())
        });

        let records = records.lock().unwrap().clone();
        (exit, iterations, records)
    }

    #[test]
    fn test_startup_record_precedes_loop_records() {
        let flags = SignalFlags::default();
        let (exit, iterations, records) = run_capturing(&flags, 6);

        assert_eq!(exit, ProcExit(1));
        assert_eq!(iterations, 5);
        assert_eq!(records.len(), 6);
        assert!(records[0].contains("watch_backend worker started"));
        assert_eq!(
            records.iter().filter(|r| r.contains("worker started")).count(),
            1
        );
        assert!(records[1..].iter().all(|r| r.contains("worker is alive")));
    }

    #[test]
    fn test_termination_before_first_iteration() {
        let flags = SignalFlags::default();
        flags.request_termination();

        let (exit, iterations, records) = run_capturing(&flags, usize::MAX);
        assert_eq!(exit, TERMINATED);
        assert_eq!(iterations, 0);
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_reload_flag_does_not_stop_loop() {
        let flags = SignalFlags::default();
        let mut watch = WatchLoop::new(&flags);
        assert_eq!(watch.state(), WorkerState::Running);

        let setter = flags.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(20));
            setter.request_termination();
        });

        assert_eq!(watch.run(), TERMINATED);
        assert!(!flags.reload_requested());
        assert!(flags.termination_requested());
        handle.join().unwrap();
    }
}
