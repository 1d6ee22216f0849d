//! Line echo connection handler.

use bytes::Bytes;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};
use tracing::{debug, error, info};

use super::parser::{display, LineBuffer};
use crate::admission::AdmissionToken;
use crate::shutdown::ShutdownListener;

/// Read buffer size
const BUFFER_SIZE: usize = 16 * 1024;

/// Why a handler stopped serving its connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The peer closed at a message boundary.
    PeerClosed,
    /// The peer closed with a partial message buffered.
    Truncated,
    /// Reading from the peer failed.
    ReadError,
    /// Writing the response failed.
    WriteError,
    /// Flushing the response failed.
    FlushError,
    /// The shutdown notice was raised.
    Shutdown,
}

/// Serve one connection until the peer leaves, an I/O error occurs, or the
/// shutdown notice is observed between two messages.
///
/// The stream is closed once on return and `token` is released after that.
/// Errors are logged here and never reach the caller.
pub async fn handle_connection<S>(
    stream: S,
    shutdown: ShutdownListener,
    token: AdmissionToken,
) -> CloseReason
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut stream = BufWriter::new(stream);
    let mut lines = LineBuffer::with_capacity(BUFFER_SIZE);

    let reason = echo_lines(&mut stream, &mut lines, &shutdown).await;

    // Responses are flushed one by one, so anything still buffered here
    // belongs to a write that already failed.
    let mut stream = stream.into_inner();
    if let Err(e) = stream.shutdown().await {
        error!(error = %e, "Failed to close connection");
    }
    drop(stream);
    token.release();

    reason
}

async fn echo_lines<S>(
    stream: &mut BufWriter<S>,
    lines: &mut LineBuffer,
    shutdown: &ShutdownListener,
) -> CloseReason
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        let line = match read_line(stream, lines).await {
            Ok(Some(line)) => line,
            Ok(None) if lines.is_empty() => {
                debug!("Connection closed by client");
                return CloseReason::PeerClosed;
            }
            Ok(None) => {
                error!(
                    pending = lines.pending(),
                    "Connection closed by client in the middle of a message"
                );
                return CloseReason::Truncated;
            }
            Err(e) => {
                error!(error = %e, "Failed to read message");
                return CloseReason::ReadError;
            }
        };

        let text = display(&line);
        info!("Read a message: {}", text);

        if let Err(e) = stream.write_all(&line).await {
            error!(error = %e, "Failed to write response");
            return CloseReason::WriteError;
        }

        if let Err(e) = stream.flush().await {
            error!(error = %e, "Failed to flush response");
            return CloseReason::FlushError;
        }

        info!(length = line.len(), "Wrote a response: {}", text);

        if shutdown.is_raised() {
            info!("Shutdown notice received, closing connection");
            return CloseReason::Shutdown;
        }

        debug!("Ready for another message");
    }
}

/// Read until one complete line is buffered.
///
/// Returns `Ok(None)` at end of stream.
async fn read_line<S>(stream: &mut S, lines: &mut LineBuffer) -> io::Result<Option<Bytes>>
where
    S: AsyncRead + Unpin,
{
    loop {
        if let Some(line) = lines.next_line() {
            return Ok(Some(line));
        }

        if stream.read_buf(lines.read_buf()).await? == 0 {
            return Ok(None);
        }
    }
}
