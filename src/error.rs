//! Error types for nzb-fetch
//!
//! Two layers:
//! - [`NntpError`] classifies everything that can go wrong on the wire (resolution,
//!   transport, timeouts, protocol replies) as named conditions
//! - [`Error`] is the crate-wide error that wraps it alongside configuration, I/O and
//!   decoder failures

use thiserror::Error;

/// Result type alias for nzb-fetch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for nzb-fetch
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "server.host")
        key: Option<String>,
    },

    /// NNTP protocol or connection error
    #[error("NNTP error: {0}")]
    Nntp(#[from] NntpError),

    /// Invalid NZB manifest
    #[error("invalid NZB: {0}")]
    InvalidNzb(String),

    /// I/O error (staging files, markers, output directory)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Decoder failed outright (as opposed to reporting per-item failures)
    #[error("decode error: {0}")]
    Decode(String),

    /// The job was cancelled
    #[error("operation cancelled")]
    Cancelled,

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Failures on an NNTP session
///
/// Authentication rejection and "too many connections" are separate variants so
/// callers can tell sleep-and-retry conditions from hard failures.
#[derive(Debug, Error)]
pub enum NntpError {
    /// Hostname lookup failed
    #[error("failed to resolve {host}: {reason}")]
    Resolve {
        /// Host that could not be resolved
        host: String,
        /// Resolver message
        reason: String,
    },

    /// Socket-level failure other than a timeout
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// A single bounded wait expired
    #[error("timed out waiting to {operation}")]
    Timeout {
        /// What was being waited for ("send", "receive", "connect")
        operation: &'static str,
    },

    /// Too many consecutive receive timeouts while streaming a body
    #[error("gave up after {attempts} consecutive receive timeouts")]
    TimeoutsExhausted {
        /// Number of consecutive timeouts observed
        attempts: u32,
    },

    /// The server closed the connection
    #[error("connection closed by server")]
    ConnectionClosed,

    /// The server kept answering the greeting with 400
    #[error("server refused connection (too many connections) after {attempts} attempts")]
    TooManyConnections {
        /// Connection attempts made
        attempts: u32,
    },

    /// Credentials were rejected (452)
    #[error("authentication rejected: {response}")]
    AuthRejected {
        /// Server response line
        response: String,
    },

    /// Unexpected status code for the command issued
    #[error("unexpected response to {command}: {response}")]
    Protocol {
        /// Command verb that was issued
        command: String,
        /// Server response line
        response: String,
    },

    /// GROUP answered 411
    #[error("no such group: {0}")]
    NoSuchGroup(String),

    /// A command was issued without a live connection
    #[error("not connected")]
    NotConnected,

    /// The cancellation token fired while streaming
    #[error("cancelled while streaming")]
    Cancelled,
}

impl NntpError {
    /// Whether the session is unusable after this error and must be reset
    ///
    /// Timeouts that stop a body mid-stream leave unread data on the socket, so they
    /// desynchronize the protocol just like a dead connection does.
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            NntpError::Transport(_)
                | NntpError::Timeout { .. }
                | NntpError::TimeoutsExhausted { .. }
                | NntpError::ConnectionClosed
                | NntpError::NotConnected
        )
    }
}

impl Error {
    /// Build a configuration error for `key`
    pub fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(e: tokio::task::JoinError) -> Self {
        Error::Other(format!("background task failed: {e}"))
    }
}
