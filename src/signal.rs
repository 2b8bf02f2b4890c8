//! # Signal bridge: sticky requests between signal senders and a worker loop.
//!
//! OS signal handlers (and anything else that wants a worker's attention) run
//! concurrently with the loop they target, so requests are carried by two
//! sticky flags plus a latch wake:
//!
//! ```text
//!  sender                      worker loop
//!  ──────                      ───────────
//!  request_termination() ──►   latch wakes
//!  request_reconfigure() ──►   take_termination()? ─► shut down
//!                              take_reconfigure()? ─► re-read config
//! ```
//!
//! A request made while the worker is busy is *not* lost: the flag stays up
//! until the loop reads-and-clears it at the top of an iteration. Duplicate
//! requests coalesce. Reading clears atomically, so a request racing with the
//! read is either folded into the current iteration or left for the next one.
//!
//! [`wait_for_signal`] and [`forward_os_signals`] translate process signals
//! (SIGTERM/SIGINT for termination, SIGHUP for reconfiguration) into bridge
//! requests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::latch::Latch;

/// A process-level request decoded from an OS signal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignalRequest {
    /// Stop after the current cycle (SIGTERM, SIGINT, Ctrl-C).
    Terminate,
    /// Re-read configuration at the next opportunity (SIGHUP).
    Reconfigure,
}

/// Sticky request flags paired with the latch they wake.
#[derive(Debug)]
pub struct SignalBridge {
    termination: AtomicBool,
    reconfigure: AtomicBool,
    latch: Arc<Latch>,
}

impl SignalBridge {
    /// Creates a bridge that wakes `latch` whenever a request arrives.
    pub fn new(latch: Arc<Latch>) -> Self {
        Self {
            termination: AtomicBool::new(false),
            reconfigure: AtomicBool::new(false),
            latch,
        }
    }

    /// The latch this bridge wakes.
    pub fn latch(&self) -> &Arc<Latch> {
        &self.latch
    }

    /// Requests termination: one atomic store and a latch set, nothing else,
    /// so it is safe from any task, thread, or signal-driven context.
    pub fn request_termination(&self) {
        self.termination.store(true, Ordering::SeqCst);
        self.latch.set();
    }

    /// Requests a configuration re-read. Same cost and safety as
    /// [`SignalBridge::request_termination`].
    pub fn request_reconfigure(&self) {
        self.reconfigure.store(true, Ordering::SeqCst);
        self.latch.set();
    }

    /// Atomically reads and clears the termination flag.
    pub fn take_termination(&self) -> bool {
        self.termination.swap(false, Ordering::SeqCst)
    }

    /// Atomically reads and clears the reconfigure flag.
    pub fn take_reconfigure(&self) -> bool {
        self.reconfigure.swap(false, Ordering::SeqCst)
    }
}

/// Waits for the next termination or reconfiguration signal.
///
/// On Unix this listens for SIGINT, SIGTERM and Ctrl-C (termination) and
/// SIGHUP (reconfiguration). Each call creates independent listeners, so
/// callers that care about repeated SIGHUPs call this in a loop.
#[cfg(unix)]
pub async fn wait_for_signal() -> std::io::Result<SignalRequest> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sighup = signal(SignalKind::hangup())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => Ok(SignalRequest::Terminate),
        _ = sigint.recv() => Ok(SignalRequest::Terminate),
        _ = sigterm.recv() => Ok(SignalRequest::Terminate),
        _ = sighup.recv() => Ok(SignalRequest::Reconfigure),
    }
}

/// Waits for the next termination signal.
///
/// Non-Unix platforms have no SIGHUP; only Ctrl-C is monitored, so this never
/// resolves to [`SignalRequest::Reconfigure`].
#[cfg(not(unix))]
pub async fn wait_for_signal() -> std::io::Result<SignalRequest> {
    tokio::signal::ctrl_c().await?;
    Ok(SignalRequest::Terminate)
}

/// Drives OS signals into `bridge` until a termination signal is forwarded.
///
/// Reconfiguration signals are forwarded without returning, so a long-lived
/// worker can be reloaded any number of times before it is stopped.
pub async fn forward_os_signals(bridge: &SignalBridge) -> std::io::Result<()> {
    loop {
        match wait_for_signal().await? {
            SignalRequest::Terminate => {
                bridge.request_termination();
                return Ok(());
            }
            SignalRequest::Reconfigure => bridge.request_reconfigure(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::latch::Wake;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn bridge() -> SignalBridge {
        SignalBridge::new(Arc::new(Latch::new(CancellationToken::new())))
    }

    #[test]
    fn test_take_reads_and_clears() {
        let b = bridge();
        assert!(!b.take_termination());

        b.request_termination();
        assert!(b.take_termination());
        assert!(!b.take_termination());
    }

    #[test]
    fn test_flags_are_independent() {
        let b = bridge();
        b.request_reconfigure();

        assert!(!b.take_termination());
        assert!(b.take_reconfigure());
        assert!(!b.take_reconfigure());
    }

    #[test]
    fn test_duplicate_requests_coalesce() {
        let b = bridge();
        b.request_termination();
        b.request_termination();

        assert!(b.take_termination());
        assert!(!b.take_termination());
    }

    #[tokio::test]
    async fn test_request_wakes_the_latch() {
        let b = bridge();
        b.request_reconfigure();

        let reason = b.latch().wait(Duration::from_secs(1), Wake::ALL).await;
        assert!(reason.contains(Wake::LATCH_SET));
    }
}
