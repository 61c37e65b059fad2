//! Process-local wake-up primitive.
//!
//! A latch is a flag plus a self-pipe. Setting it (from normal code or from a
//! signal handler) stores the flag and writes one byte, so a thread sleeping
//! in [`Latch::wait`] wakes immediately. Signal handlers only perform the
//! atomic store and a non-blocking write.

use std::io::{self, Read, Write};
use std::os::raw::c_int;
use std::os::unix::net::UnixStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use signal_hook::flag;
use signal_hook::low_level::pipe;

/// Flag + self-pipe wake-up primitive.
#[derive(Debug)]
pub struct Latch {
    is_set: Arc<AtomicBool>,
    reader: UnixStream,
    writer: UnixStream,
}

impl Latch {
    /// Create an unset latch.
    pub fn new() -> io::Result<Self> {
        let (reader, writer) = UnixStream::pair()?;
        reader.set_nonblocking(true)?;
        writer.set_nonblocking(true)?;
        Ok(Self {
            is_set: Arc::new(AtomicBool::new(false)),
            reader,
            writer,
        })
    }

    /// Make delivery of `signal` set this latch.
    ///
    /// Registered actions run in registration order, so a flag registered for
    /// the same signal beforehand is visible by the time a waiter wakes.
    pub fn register_signal(&self, signal: c_int) -> io::Result<()> {
        flag::register(signal, Arc::clone(&self.is_set))?;
        pipe::register(signal, self.writer.try_clone()?)?;
        Ok(())
    }

    /// Set the latch and wake any waiter.
    pub fn set(&self) {
        self.is_set.store(true, Ordering::SeqCst);
        // A full pipe already guarantees a wake-up.
        let _ = (&self.writer).write(&[1]);
    }

    pub fn is_set(&self) -> bool {
        self.is_set.load(Ordering::SeqCst)
    }

    /// Sleep until the latch is set or `timeout` elapses.
    ///
    /// Returns whether the latch is set on return.
    pub fn wait(&self, timeout: Duration) -> io::Result<bool> {
        if self.is_set() {
            return Ok(true);
        }

        // A zero read timeout is rejected by the OS.
        let timeout = timeout.max(Duration::from_millis(1));
        self.reader.set_nonblocking(false)?;
        self.reader.set_read_timeout(Some(timeout))?;

        let mut buf = [0u8; 64];
        let result = (&self.reader).read(&mut buf);
        self.reader.set_nonblocking(true)?;

        match result {
            Ok(_) => {}
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
                ) => {}
            Err(e) => return Err(e),
        }

        Ok(self.is_set())
    }
}
