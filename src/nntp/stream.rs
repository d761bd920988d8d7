//! Timeout-bounded reads and writes over an NNTP connection
//!
//! Every socket operation runs under a fixed deadline rather than blocking forever.
//! Bytes that arrive ahead of the caller's needs (e.g. the first part of a body read
//! together with its status line) are kept in a pending buffer and handed out first.

use crate::config::TimeoutConfig;
use crate::error::NntpError;
use crate::nntp::response::Response;
use crate::stats::TransferStats;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

/// End of a multi-line body: CRLF, a lone dot, CRLF
pub const BODY_TERMINATOR: &[u8] = b"\r\n.\r\n";

/// A body that is empty consists of the dot line alone
const EMPTY_BODY: &[u8] = b".\r\n";

const READ_CHUNK: usize = 16 * 1024;
const MAX_LINE_LEN: usize = 64 * 1024;

/// Buffered, deadline-bounded NNTP transport
///
/// Generic over the underlying stream so the protocol logic runs unchanged over
/// `TcpStream` and in-memory pipes.
#[derive(Debug)]
pub struct NntpStream<S> {
    stream: S,
    pending: Vec<u8>,
    stats: TransferStats,
    write_timeout: Duration,
    read_timeout: Duration,
    read_retries: u32,
}

impl<S> NntpStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap `stream`; every received byte is recorded in `stats`
    #[must_use]
    pub fn new(stream: S, stats: TransferStats, timeouts: &TimeoutConfig) -> Self {
        Self {
            stream,
            pending: Vec::new(),
            stats,
            write_timeout: timeouts.write,
            read_timeout: timeouts.read,
            read_retries: timeouts.read_retries,
        }
    }

    /// Write all of `data`, waiting at most the write timeout
    pub async fn send(&mut self, data: &[u8]) -> Result<(), NntpError> {
        let deadline = self.write_timeout;
        let write = async {
            self.stream.write_all(data).await?;
            self.stream.flush().await
        };
        match tokio::time::timeout(deadline, write).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(NntpError::Transport(e)),
            Err(_) => Err(NntpError::Timeout { operation: "send" }),
        }
    }

    /// Receive whatever is available into `buf`, waiting at most the read timeout
    ///
    /// Returns the number of bytes appended; `0` means the server closed the connection.
    pub async fn recv_into(&mut self, buf: &mut Vec<u8>) -> Result<usize, NntpError> {
        buf.reserve(READ_CHUNK);
        let deadline = self.read_timeout;
        match tokio::time::timeout(deadline, self.stream.read_buf(buf)).await {
            Ok(Ok(n)) => {
                if n > 0 {
                    self.stats.record_bytes(n);
                }
                Ok(n)
            }
            Ok(Err(e)) => Err(NntpError::Transport(e)),
            Err(_) => Err(NntpError::Timeout {
                operation: "receive",
            }),
        }
    }

    /// Read one CRLF-terminated status line
    ///
    /// A timeout here is not retried: the caller sees it straight away.
    pub async fn read_response(&mut self) -> Result<Response, NntpError> {
        let mut scanned = 0;
        loop {
            if let Some(pos) = self.pending[scanned..].iter().position(|&b| b == b'\n') {
                let end = scanned + pos + 1;
                let line: Vec<u8> = self.pending.drain(..end).collect();
                return Ok(Response::parse(&String::from_utf8_lossy(&line)));
            }
            scanned = self.pending.len();
            if scanned > MAX_LINE_LEN {
                return Err(NntpError::Protocol {
                    command: "response".to_string(),
                    response: format!("status line exceeds {MAX_LINE_LEN} bytes"),
                });
            }

            let mut pending = std::mem::take(&mut self.pending);
            let received = self.recv_into(&mut pending).await;
            self.pending = pending;
            if received? == 0 {
                return Err(NntpError::ConnectionClosed);
            }
        }
    }

    /// Send `line` followed by CRLF and read the status line it provokes
    pub async fn command(&mut self, line: &str) -> Result<Response, NntpError> {
        if line.starts_with("AUTHINFO PASS") {
            tracing::debug!(command = "AUTHINFO PASS ****", "->");
        } else {
            tracing::debug!(command = line, "->");
        }

        let mut wire = Vec::with_capacity(line.len() + 2);
        wire.extend_from_slice(line.as_bytes());
        wire.extend_from_slice(b"\r\n");
        self.send(&wire).await?;

        let response = self.read_response().await?;
        tracing::debug!(response = %response, "<-");
        Ok(response)
    }

    /// Accumulate a multi-line body into `buf` until the terminator arrives
    ///
    /// On success `buf` holds the body up to and including the CRLF that precedes the
    /// dot line; the terminator itself is consumed. Up to `read_retries` consecutive
    /// timeouts are tolerated. `cancel` is checked before every wait, so cancellation
    /// takes effect once the in-flight wait finishes. `on_chunk` is called with the
    /// accumulated length for already-buffered bytes and after each successful receive.
    pub async fn read_until_terminator<F>(
        &mut self,
        buf: &mut Vec<u8>,
        cancel: &CancellationToken,
        mut on_chunk: F,
    ) -> Result<(), NntpError>
    where
        F: FnMut(usize),
    {
        buf.append(&mut self.pending);
        if !buf.is_empty() {
            on_chunk(buf.len());
        }
        let mut search_from = 0;
        let mut timeouts = 0;

        loop {
            if let Some((content_end, consumed)) = find_terminator(buf, search_from) {
                self.pending.extend_from_slice(&buf[consumed..]);
                buf.truncate(content_end);
                return Ok(());
            }
            // The terminator may straddle the next read
            search_from = buf.len().saturating_sub(BODY_TERMINATOR.len() - 1);

            if cancel.is_cancelled() {
                return Err(NntpError::Cancelled);
            }

            match self.recv_into(buf).await {
                Ok(0) => return Err(NntpError::ConnectionClosed),
                Ok(_) => {
                    timeouts = 0;
                    on_chunk(buf.len());
                }
                Err(NntpError::Timeout { .. }) => {
                    timeouts += 1;
                    if timeouts >= self.read_retries {
                        return Err(NntpError::TimeoutsExhausted { attempts: timeouts });
                    }
                    tracing::warn!(
                        attempt = timeouts,
                        max_attempts = self.read_retries,
                        received = buf.len(),
                        "Timed out waiting for body data, retrying"
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Close the write half, bounded by the write timeout
    pub async fn shutdown(&mut self) {
        let deadline = self.write_timeout;
        match tokio::time::timeout(deadline, self.stream.shutdown()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::debug!(error = %e, "Error shutting down connection"),
            Err(_) => tracing::debug!("Timed out shutting down connection"),
        }
    }
}

/// Locate the body terminator in `buf`, scanning from `from`
///
/// Returns `(content_end, consumed)`: the body is `buf[..content_end]` and the
/// terminator ends at `consumed`.
fn find_terminator(buf: &[u8], from: usize) -> Option<(usize, usize)> {
    if buf.starts_with(EMPTY_BODY) {
        return Some((0, EMPTY_BODY.len()));
    }
    buf[from..]
        .windows(BODY_TERMINATOR.len())
        .position(|w| w == BODY_TERMINATOR)
        .map(|pos| {
            let at = from + pos;
            (at + 2, at + BODY_TERMINATOR.len())
        })
}
