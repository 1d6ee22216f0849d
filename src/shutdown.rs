//! Shutdown notice and termination signal handling.
//!
//! The notice is a broadcast flag: once raised it stays raised, and any
//! number of listeners can observe it any number of times.

use std::io;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

/// Broadcast shutdown flag, shared by the acceptor and the signal task.
#[derive(Debug, Clone)]
pub struct ShutdownNotice {
    tx: Arc<watch::Sender<bool>>,
}

/// Read side of a [`ShutdownNotice`], one per observer.
#[derive(Debug, Clone)]
pub struct ShutdownListener {
    rx: watch::Receiver<bool>,
}

impl ShutdownNotice {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Raise the notice. Raising twice is a no-op.
    pub fn raise(&self) {
        self.tx.send_replace(true);
    }

    pub fn subscribe(&self) -> ShutdownListener {
        ShutdownListener {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for ShutdownNotice {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownListener {
    /// Non-blocking check.
    pub fn is_raised(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait until the notice is raised.
    ///
    /// Also resolves if every [`ShutdownNotice`] handle has been dropped,
    /// since nothing can raise it after that.
    pub async fn raised(&mut self) {
        let _ = self.rx.wait_for(|raised| *raised).await;
    }
}

/// Raise `notice` when the process receives a termination request.
///
/// The signal handler is installed before this returns, so a request that
/// arrives right after startup is not lost.
#[cfg(unix)]
pub fn watch_termination(notice: ShutdownNotice) -> io::Result<JoinHandle<()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = signal(SignalKind::terminate())?;
    Ok(tokio::spawn(async move {
        if term.recv().await.is_some() {
            info!(signal = "SIGTERM", "Received termination signal, shutting down gracefully");
            notice.raise();
        }
    }))
}

/// Raise `notice` when the process receives a termination request.
#[cfg(not(unix))]
pub fn watch_termination(notice: ShutdownNotice) -> io::Result<JoinHandle<()>> {
    Ok(tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!(signal = "ctrl-c", "Received termination signal, shutting down gracefully");
                notice.raise();
            }
            Err(e) => tracing::error!(error = %e, "Failed to listen for termination signal"),
        }
    }))
}
