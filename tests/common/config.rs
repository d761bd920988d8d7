//! Test configuration helpers for loading .env credentials and building fast-failing configs

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use nzb_fetch::{Config, RetryConfig, ServerConfig, TimeoutConfig};

/// Error type for test configuration
#[derive(Debug)]
pub struct ConfigError(pub String);

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Config error: {}", self.0)
    }
}

impl std::error::Error for ConfigError {}

/// Load NNTP server configuration from environment variables
///
/// Required environment variables:
/// - `NNTP_HOST` - Server hostname
/// - `NNTP_USERNAME` - Authentication username
/// - `NNTP_PASSWORD` - Authentication password
///
/// Optional environment variables:
/// - `NNTP_PORT` - Plain-text port (default: 119)
pub fn load_server_config() -> Result<ServerConfig, ConfigError> {
    dotenvy::dotenv().ok();

    let host = std::env::var("NNTP_HOST")
        .map_err(|_| ConfigError("NNTP_HOST not set in environment".to_string()))?;

    let port: u16 = std::env::var("NNTP_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(119);

    let username = std::env::var("NNTP_USERNAME")
        .map_err(|_| ConfigError("NNTP_USERNAME not set in environment".to_string()))?;

    let password = std::env::var("NNTP_PASSWORD")
        .map_err(|_| ConfigError("NNTP_PASSWORD not set in environment".to_string()))?;

    let mut server = ServerConfig::new(host).with_credentials(username, password);
    server.port = port;
    Ok(server)
}

/// Load server config with invalid password for auth failure tests
pub fn load_server_config_bad_password() -> Result<ServerConfig, ConfigError> {
    let mut config = load_server_config()?;
    config.password = Some("invalid_password_12345".to_string());
    Ok(config)
}

/// Check if live credentials are available
pub fn has_live_credentials() -> bool {
    load_server_config().is_ok()
}

/// Config pointed at a local mock server, with timeouts short enough for tests
pub fn mock_config(addr: SocketAddr, output_dir: &Path) -> Config {
    let mut server = ServerConfig::new(addr.ip().to_string());
    server.port = addr.port();

    let mut config = Config::new(server);
    config.output_dir = output_dir.to_path_buf();
    config.timeouts = TimeoutConfig {
        write: Duration::from_secs(2),
        read: Duration::from_millis(300),
        connect: Duration::from_secs(2),
        busy_backoff: Duration::from_millis(20),
        ..TimeoutConfig::default()
    };
    config.reconnect = RetryConfig {
        max_attempts: 1,
        initial_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(50),
        backoff_multiplier: 2.0,
        jitter: false,
    };
    config
}
