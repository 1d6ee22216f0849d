//! TCP acceptor and shutdown coordination.
//!
//! Accepts connections, admits each one through the [`AdmissionGate`] and
//! runs its handler on its own task. When the shutdown notice is raised the
//! listener is closed and the server waits for every handler to finish.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::admission::AdmissionGate;
use crate::config::Config;
use crate::error::ServerError;
use crate::protocols::line::{handle_connection, CloseReason};
use crate::shutdown::ShutdownNotice;

/// Pending connection queue length passed to listen(2).
const LISTEN_BACKLOG: i32 = 1024;

/// Server instance
pub struct Server {
    listener: TcpListener,
    gate: AdmissionGate,
    shutdown: ShutdownNotice,
    drain_timeout: Option<Duration>,
}

impl Server {
    /// Bind the listening socket.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn bind(config: Config) -> Result<Self, ServerError> {
        let addr: SocketAddr = config
            .listen
            .parse()
            .map_err(|_| ServerError::InvalidAddress(config.listen.clone()))?;

        let listener = create_listener(addr)
            .and_then(TcpListener::from_std)
            .map_err(|source| ServerError::Bind { addr, source })?;

        let gate = AdmissionGate::new(config.max_connections);
        info!(
            address = %listener.local_addr().unwrap_or(addr),
            max_connections = gate.capacity(),
            "Server listening"
        );

        Ok(Server {
            listener,
            gate,
            shutdown: ShutdownNotice::new(),
            drain_timeout: config.drain_timeout,
        })
    }

    /// Address the listener is bound to.
    #[cfg(test)]
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Handle for raising the shutdown notice.
    pub fn shutdown_notice(&self) -> ShutdownNotice {
        self.shutdown.clone()
    }

    /// Get a handle to the admission gate for testing
    #[cfg(test)]
    pub fn admission_gate(&self) -> AdmissionGate {
        self.gate.clone()
    }

    /// Accept connections until the shutdown notice is raised, then drain.
    pub async fn run(self) -> Result<(), ServerError> {
        let Server {
            listener,
            gate,
            shutdown,
            drain_timeout,
        } = self;

        let mut stop = shutdown.subscribe();
        let mut handlers = JoinSet::new();

        loop {
            tokio::select! {
                biased;

                _ = stop.raised() => {
                    info!("Shutdown notice raised, no longer accepting connections");
                    break;
                }

                result = listener.accept() => match result {
                    Ok((stream, peer)) => {
                        info!(peer = %peer, "Accepted a connection");

                        // Waiting here stalls the accept loop while the gate is full.
                        let token = tokio::select! {
                            biased;

                            _ = stop.raised() => {
                                info!(peer = %peer, "Shutdown notice raised while waiting for a slot, dropping connection");
                                break;
                            }
                            token = gate.acquire() => token?,
                        };

                        handlers.spawn(
                            handle_connection(stream, shutdown.subscribe(), token)
                                .instrument(info_span!("conn", peer = %peer)),
                        );
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to accept connection");
                    }
                },
            }

            while let Some(result) = handlers.try_join_next() {
                report(result, &gate);
            }

            debug!("Ready for another connection");
        }

        drop(listener);
        drain(&mut handlers, drain_timeout, &gate).await;

        info!("Shutdown gracefully");
        Ok(())
    }
}

/// Wait for every handler to finish, or abort the stragglers once `limit`
/// has elapsed.
async fn drain(
    handlers: &mut JoinSet<CloseReason>,
    limit: Option<Duration>,
    gate: &AdmissionGate,
) {
    info!(active = handlers.len(), "Waiting for in-flight connections to finish");

    let wait_all = async {
        while let Some(result) = handlers.join_next().await {
            report(result, gate);
        }
    };

    let finished = match limit {
        None => {
            wait_all.await;
            true
        }
        Some(limit) => tokio::time::timeout(limit, wait_all).await.is_ok(),
    };

    if !finished {
        warn!(
            remaining = handlers.len(),
            "Drain timeout reached, aborting remaining connections"
        );
        handlers.shutdown().await;
    }
}

fn report(result: Result<CloseReason, JoinError>, gate: &AdmissionGate) {
    match result {
        Ok(reason) => {
            debug!(reason = ?reason, in_use = gate.in_use(), "Connection handler finished");
        }
        Err(e) if e.is_panic() => {
            error!(error = %e, "Connection handler panicked");
        }
        Err(e) => {
            debug!(error = %e, "Connection handler cancelled");
        }
    }
}

/// Create a non-blocking listening socket.
///
/// SO_REUSEPORT is left off so a second server on the same port fails to
/// bind instead of sharing the port.
fn create_listener(addr: SocketAddr) -> io::Result<std::net::TcpListener> {
    let socket = socket2::Socket::new(
        match addr {
            SocketAddr::V4(_) => socket2::Domain::IPV4,
            SocketAddr::V6(_) => socket2::Domain::IPV6,
        },
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    #[cfg(unix)]
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(LISTEN_BACKLOG)?;

    Ok(socket.into())
}
