//! OS signal handling.
//!
//! # Responsibilities
//! - Register handlers for the signals a platform uses to stop a container
//! - Deliver them, in arrival order, to whoever supervises the foreground child
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - Handlers are installed once, before the first child is spawned
//! - SIGKILL cannot be caught; it reaches the orchestrator (or, after exec, the server) directly
//! - Supervised children get their own process group, so a terminal Ctrl-C
//!   reaches only the orchestrator and the child sees SIGINT once
//! - TERM/INT/QUIT before the server starts cancel the server launch

use std::io;

use async_trait::async_trait;
use nix::sys::signal::Signal;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Signals relayed to the foreground child.
pub const FORWARDED_SIGNALS: [Signal; 6] = [
    Signal::SIGTERM,
    Signal::SIGINT,
    Signal::SIGQUIT,
    Signal::SIGHUP,
    Signal::SIGUSR1,
    Signal::SIGUSR2,
];

/// Signals that ask the container to stop.
pub fn is_termination(sig: Signal) -> bool {
    matches!(sig, Signal::SIGTERM | Signal::SIGINT | Signal::SIGQUIT)
}

/// A stream of signals to forward.
#[async_trait]
pub trait SignalSource: Send {
    /// Next signal, or `None` once the source is closed.
    async fn recv(&mut self) -> Option<Signal>;

    /// A signal already queued, without waiting.
    fn try_recv(&mut self) -> Option<Signal>;
}

#[async_trait]
impl SignalSource for mpsc::UnboundedReceiver<Signal> {
    async fn recv(&mut self) -> Option<Signal> {
        mpsc::UnboundedReceiver::recv(self).await
    }

    fn try_recv(&mut self) -> Option<Signal> {
        mpsc::UnboundedReceiver::try_recv(self).ok()
    }
}

/// Process-wide signal handlers merged into one channel.
pub struct SignalRelay {
    rx: mpsc::UnboundedReceiver<Signal>,
    listeners: Vec<JoinHandle<()>>,
}

impl SignalRelay {
    /// Install handlers for every signal in [`FORWARDED_SIGNALS`].
    ///
    /// Must be called from within a Tokio runtime.
    pub fn install() -> io::Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut listeners = Vec::with_capacity(FORWARDED_SIGNALS.len());

        for sig in FORWARDED_SIGNALS {
            let mut stream = signal(SignalKind::from_raw(sig as i32))?;
            let tx = tx.clone();
            listeners.push(tokio::spawn(async move {
                while stream.recv().await.is_some() {
                    tracing::info!(signal = %sig, "Signal received");
                    if tx.send(sig).is_err() {
                        break;
                    }
                }
            }));
        }

        tracing::debug!(signals = ?FORWARDED_SIGNALS, "Signal handlers installed");
        Ok(Self { rx, listeners })
    }
}

#[async_trait]
impl SignalSource for SignalRelay {
    async fn recv(&mut self) -> Option<Signal> {
        self.rx.recv().await
    }

    fn try_recv(&mut self) -> Option<Signal> {
        self.rx.try_recv().ok()
    }
}

impl Drop for SignalRelay {
    fn drop(&mut self) {
        for listener in &self.listeners {
            listener.abort();
        }
    }
}
