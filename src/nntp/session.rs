//! NNTP session lifecycle: connect, greet, authenticate, negotiate, tear down
//!
//! A [`Session`] owns at most one live connection. Connecting resolves the host once
//! (a resolution failure is final), then loops over connection attempts while the
//! server answers the greeting with 400, sleeping the configured backoff between
//! attempts.

use crate::config::{Config, ServerConfig};
use crate::error::NntpError;
use crate::nntp::response::{Response, codes};
use crate::nntp::stream::NntpStream;
use crate::nntp::wire_message_id;
use crate::retry::with_retry;
use crate::stats::TransferStats;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

/// Negotiated state of a live session
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionState {
    /// AUTHINFO completed successfully
    pub authenticated: bool,
    /// MODE READER was accepted
    pub reader_mode: bool,
    /// Greeting was 200 rather than 201
    pub posting_allowed: bool,
    /// Currently selected newsgroup
    pub group: Option<String>,
}

/// One NNTP connection plus its negotiated state
///
/// Not shared: every operation takes `&mut self`.
#[derive(Debug)]
pub struct Session<S = TcpStream> {
    config: Arc<Config>,
    stats: TransferStats,
    conn: Option<NntpStream<S>>,
    state: SessionState,
}

enum Greeting {
    Ready { posting_allowed: bool },
    Busy(Response),
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Run the greeting, authentication and reader-mode exchange over an already
    /// connected transport
    ///
    /// A 400 greeting is reported as [`NntpError::TooManyConnections`] after this
    /// single attempt.
    pub async fn establish(
        stream: S,
        config: Arc<Config>,
        stats: TransferStats,
    ) -> Result<Self, NntpError> {
        let mut conn = NntpStream::new(stream, stats.clone(), &config.timeouts);
        match read_greeting(&mut conn).await? {
            Greeting::Ready { posting_allowed } => {
                let state = negotiate(&mut conn, &config.server, posting_allowed).await?;
                Ok(Self {
                    config,
                    stats,
                    conn: Some(conn),
                    state,
                })
            }
            Greeting::Busy(_) => {
                conn.shutdown().await;
                Err(NntpError::TooManyConnections { attempts: 1 })
            }
        }
    }

    /// Whether a connection is currently held
    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    /// Negotiated state of the current connection
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Transfer counters fed by this session
    pub fn stats(&self) -> &TransferStats {
        &self.stats
    }

    /// The live connection
    pub fn stream_mut(&mut self) -> Result<&mut NntpStream<S>, NntpError> {
        self.conn.as_mut().ok_or(NntpError::NotConnected)
    }

    /// Send QUIT if possible, then always drop the connection
    pub async fn disconnect(&mut self) {
        if let Some(mut conn) = self.conn.take() {
            if let Err(e) = conn.send(b"QUIT\r\n").await {
                tracing::debug!(error = %e, "Failed to send QUIT, closing anyway");
            }
            conn.shutdown().await;
            tracing::debug!(host = %self.config.server.host, "Disconnected");
        }
        self.state = SessionState::default();
    }

    /// Select `group` (211 ok, 411 no such group)
    pub async fn select_group(&mut self, group: &str) -> Result<(), NntpError> {
        let response = self
            .stream_mut()?
            .command(&format!("GROUP {group}"))
            .await?;
        match response.code() {
            Some(codes::GROUP_OK) => {
                self.state.group = Some(group.to_string());
                Ok(())
            }
            Some(codes::NO_SUCH_GROUP) => Err(NntpError::NoSuchGroup(group.to_string())),
            _ => Err(protocol_error("GROUP", &response)),
        }
    }

    /// Check whether an article exists with STAT
    ///
    /// 223 means present and 430 means missing. Any other reply counts as present,
    /// so an unusual server never produces a false "missing".
    pub async fn stat(&mut self, message_id: &str) -> Result<bool, NntpError> {
        let response = self
            .stream_mut()?
            .command(&format!("STAT {}", wire_message_id(message_id)))
            .await?;
        match response.code() {
            Some(codes::STAT_OK) => Ok(true),
            Some(codes::NO_SUCH_ARTICLE) => Ok(false),
            _ => {
                tracing::debug!(
                    message_id,
                    response = %response,
                    "Unexpected STAT response, assuming article exists"
                );
                Ok(true)
            }
        }
    }

    /// Issue BODY and return its status line; the caller streams the body
    pub async fn request_body(&mut self, message_id: &str) -> Result<Response, NntpError> {
        self.stream_mut()?
            .command(&format!("BODY {}", wire_message_id(message_id)))
            .await
    }

    fn install(&mut self, conn: NntpStream<S>, state: SessionState) {
        self.conn = Some(conn);
        self.state = state;
    }
}

impl Session<TcpStream> {
    /// Create a disconnected session
    #[must_use]
    pub fn new(config: Arc<Config>, stats: TransferStats) -> Self {
        Self {
            config,
            stats,
            conn: None,
            state: SessionState::default(),
        }
    }

    /// Connect, allowing up to `max_attempts` tries while the server is busy
    pub async fn connect(&mut self, max_attempts: u32) -> Result<(), NntpError> {
        if self.conn.is_some() {
            self.disconnect().await;
        }
        let (conn, state) = open(&self.config, &self.stats, max_attempts).await?;
        tracing::info!(
            host = %self.config.server.host,
            port = self.config.server.port,
            authenticated = state.authenticated,
            "Connected to NNTP server"
        );
        self.install(conn, state);
        Ok(())
    }

    /// Tear down the current connection and establish a fresh one
    ///
    /// Each reconnect uses the `reset_attempts` busy budget; transient failures are
    /// retried with the `reconnect` backoff.
    pub async fn reset(&mut self) -> Result<(), NntpError> {
        self.disconnect().await;

        let config = Arc::clone(&self.config);
        let stats = self.stats.clone();
        let attempts = config.timeouts.reset_attempts;
        let (conn, state) =
            with_retry(&config.reconnect, || open(&config, &stats, attempts)).await?;

        tracing::info!(host = %config.server.host, "Session re-established");
        self.install(conn, state);
        Ok(())
    }
}

async fn open(
    config: &Config,
    stats: &TransferStats,
    max_attempts: u32,
) -> Result<(NntpStream<TcpStream>, SessionState), NntpError> {
    let addrs = resolve(&config.server).await?;

    for attempt in 1..=max_attempts {
        let tcp = connect_tcp(&addrs, config).await?;
        let mut conn = NntpStream::new(tcp, stats.clone(), &config.timeouts);

        match read_greeting(&mut conn).await? {
            Greeting::Ready { posting_allowed } => {
                let state = negotiate(&mut conn, &config.server, posting_allowed).await?;
                return Ok((conn, state));
            }
            Greeting::Busy(response) => {
                conn.shutdown().await;
                tracing::warn!(
                    host = %config.server.host,
                    attempt,
                    max_attempts,
                    response = %response,
                    "Server busy (too many connections)"
                );
                if attempt < max_attempts {
                    tokio::time::sleep(config.timeouts.busy_backoff).await;
                }
            }
        }
    }

    Err(NntpError::TooManyConnections {
        attempts: max_attempts,
    })
}

async fn resolve(server: &ServerConfig) -> Result<Vec<SocketAddr>, NntpError> {
    let resolve_error = |reason: String| NntpError::Resolve {
        host: server.host.clone(),
        reason,
    };

    let addrs: Vec<SocketAddr> = tokio::net::lookup_host((server.host.as_str(), server.port))
        .await
        .map_err(|e| resolve_error(e.to_string()))?
        .collect();

    if addrs.is_empty() {
        return Err(resolve_error("no addresses found".to_string()));
    }
    Ok(addrs)
}

async fn connect_tcp(addrs: &[SocketAddr], config: &Config) -> Result<TcpStream, NntpError> {
    let tcp = tokio::time::timeout(config.timeouts.connect, TcpStream::connect(addrs))
        .await
        .map_err(|_| NntpError::Timeout {
            operation: "connect",
        })??;
    tcp.set_nodelay(true)?;
    Ok(tcp)
}

async fn read_greeting<S>(conn: &mut NntpStream<S>) -> Result<Greeting, NntpError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let greeting = conn.read_response().await?;
    tracing::debug!(response = %greeting, "Greeting");
    match greeting.code() {
        Some(codes::READY_POSTING) => Ok(Greeting::Ready {
            posting_allowed: true,
        }),
        Some(codes::READY_NO_POSTING) => Ok(Greeting::Ready {
            posting_allowed: false,
        }),
        Some(codes::SERVICE_UNAVAILABLE) => Ok(Greeting::Busy(greeting)),
        _ => Err(protocol_error("greeting", &greeting)),
    }
}

async fn negotiate<S>(
    conn: &mut NntpStream<S>,
    server: &ServerConfig,
    posting_allowed: bool,
) -> Result<SessionState, NntpError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut state = SessionState {
        posting_allowed,
        ..SessionState::default()
    };

    if let Some(username) = &server.username {
        let response = conn.command(&format!("AUTHINFO USER {username}")).await?;
        match response.code() {
            Some(codes::AUTH_CONTINUE) => {}
            Some(codes::AUTH_REJECTED) => return Err(auth_rejected(&response)),
            _ => return Err(protocol_error("AUTHINFO USER", &response)),
        }

        let password = server.password.as_deref().unwrap_or_default();
        let response = conn.command(&format!("AUTHINFO PASS {password}")).await?;
        match response.code() {
            Some(codes::AUTH_OK | codes::AUTH_OK_LEGACY) => state.authenticated = true,
            Some(codes::AUTH_REJECTED) => return Err(auth_rejected(&response)),
            _ => return Err(protocol_error("AUTHINFO PASS", &response)),
        }
    }

    let response = conn.command("MODE READER").await?;
    if !response.is_any(&[codes::READY_POSTING, codes::READY_NO_POSTING]) {
        return Err(protocol_error("MODE READER", &response));
    }
    state.reader_mode = true;

    Ok(state)
}

fn protocol_error(command: &str, response: &Response) -> NntpError {
    NntpError::Protocol {
        command: command.to_string(),
        response: response.line().to_string(),
    }
}

fn auth_rejected(response: &Response) -> NntpError {
    NntpError::AuthRejected {
        response: response.line().to_string(),
    }
}
