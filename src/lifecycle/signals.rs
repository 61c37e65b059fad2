//! OS signal handling.
//!
//! # Responsibilities
//! - Worker side: hold signals blocked until handlers exist, then install
//!   SIGTERM/SIGHUP handlers that only store a flag and set the latch
//! - Supervisor side: translate SIGTERM/SIGINT/SIGHUP into [`Control`] events
//!
//! # Design Decisions
//! - Worker handlers are `signal-hook` flag/pipe actions (async-signal-safe)
//! - Ordering is enforced by types: [`BlockedSignals`] → [`HandlersInstalled`]
//!   → [`SignalFlags`]; the flags exist only after unblocking
//! - Supervisor uses Tokio's signal handling (async-safe)

use std::io;
use std::os::raw::c_int;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use nix::sys::signal::{pthread_sigmask, SigSet, SigmaskHow, Signal};
use signal_hook::consts::{SIGHUP, SIGTERM};
use signal_hook::flag;
use thiserror::Error;
use tokio::signal::unix::{signal, SignalKind};

use crate::lifecycle::control::{Control, ControlHandle};
use crate::lifecycle::latch::Latch;

/// Errors raised while preparing worker signal handling.
#[derive(Debug, Error)]
pub enum SignalError {
    #[error("failed to change the signal mask: {0}")]
    Mask(#[from] nix::Error),
    #[error("failed to install {signal} handler: {source}")]
    Install {
        signal: &'static str,
        #[source]
        source: io::Error,
    },
}

/// Synchronous fault signals stay deliverable; blocking them is undefined.
const NEVER_BLOCKED: [Signal; 7] = [
    Signal::SIGSEGV,
    Signal::SIGBUS,
    Signal::SIGILL,
    Signal::SIGFPE,
    Signal::SIGTRAP,
    Signal::SIGABRT,
    Signal::SIGSYS,
];

/// Every asynchronous signal: what a worker holds blocked until its
/// handlers exist, and what it unblocks afterwards.
pub fn startup_block_set() -> SigSet {
    let mut set = SigSet::all();
    for sig in NEVER_BLOCKED {
        set.remove(sig);
    }
    set
}

/// Signals are blocked on the calling thread while this value is alive.
///
/// Anything delivered in the meantime stays pending and is handled right
/// after [`HandlersInstalled::unblock`]. The host starts workers with the
/// same set already blocked, so blocking here is usually a no-op.
#[derive(Debug)]
pub struct BlockedSignals {
    set: SigSet,
}

impl BlockedSignals {
    /// Block all asynchronous signals on the calling thread.
    pub fn block() -> Result<Self, SignalError> {
        let set = startup_block_set();
        pthread_sigmask(SigmaskHow::SIG_BLOCK, Some(&set), None)?;
        Ok(Self { set })
    }

    /// Install the terminate (SIGTERM) and reload (SIGHUP) handlers.
    pub fn install_handlers(self, latch: &Latch) -> Result<HandlersInstalled, SignalError> {
        let flags = SignalFlags::default();
        register(SIGTERM, "SIGTERM", &flags.termination, latch)?;
        register(SIGHUP, "SIGHUP", &flags.reload, latch)?;
        Ok(HandlersInstalled {
            blocked: self,
            flags,
        })
    }
}

fn register(
    signal: c_int,
    name: &'static str,
    target: &Arc<AtomicBool>,
    latch: &Latch,
) -> Result<(), SignalError> {
    flag::register(signal, Arc::clone(target)).map_err(|source| SignalError::Install {
        signal: name,
        source,
    })?;
    latch
        .register_signal(signal)
        .map_err(|source| SignalError::Install {
            signal: name,
            source,
        })?;
    Ok(())
}

/// Handlers are in place; signals are still blocked.
#[derive(Debug)]
pub struct HandlersInstalled {
    blocked: BlockedSignals,
    flags: SignalFlags,
}

impl HandlersInstalled {
    /// Unblock every asynchronous signal, including any the process
    /// inherited blocked. Pending signals are delivered before this returns.
    pub fn unblock(self) -> Result<SignalFlags, SignalError> {
        pthread_sigmask(SigmaskHow::SIG_UNBLOCK, Some(&self.blocked.set), None)?;
        Ok(self.flags)
    }
}

/// Flags written by the worker's signal handlers.
///
/// There is no way to clear either flag.
#[derive(Debug, Clone, Default)]
pub struct SignalFlags {
    termination: Arc<AtomicBool>,
    reload: Arc<AtomicBool>,
}

impl SignalFlags {
    pub fn termination_requested(&self) -> bool {
        self.termination.load(Ordering::SeqCst)
    }

    pub fn reload_requested(&self) -> bool {
        self.reload.load(Ordering::SeqCst)
    }

    #[cfg(test)]
    pub(crate) fn request_termination(&self) {
        self.termination.store(true, Ordering::SeqCst);
    }
}

/// Supervisor-side listener for process signals.
///
/// Streams are registered in [`SignalListener::new`] so nothing is missed
/// between construction and the first poll.
pub struct SignalListener {
    terminate: tokio::signal::unix::Signal,
    interrupt: tokio::signal::unix::Signal,
    hangup: tokio::signal::unix::Signal,
}

impl SignalListener {
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            terminate: signal(SignalKind::terminate())?,
            interrupt: signal(SignalKind::interrupt())?,
            hangup: signal(SignalKind::hangup())?,
        })
    }

    /// Forward signals as control events until a shutdown signal arrives.
    pub async fn run(mut self, control: ControlHandle) {
        loop {
            tokio::select! {
                _ = self.terminate.recv() => {
                    tracing::info!("Received SIGTERM, shutting down");
                    break;
                }
                _ = self.interrupt.recv() => {
                    tracing::info!("Received SIGINT, shutting down");
                    break;
                }
                _ = self.hangup.recv() => {
                    tracing::info!("Received SIGHUP, forwarding to workers");
                    control.trigger(Control::Reload);
                }
            }
        }
        control.trigger(Control::Shutdown);
    }
}
