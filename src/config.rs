//! Configuration types for nzb-fetch

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for a fetch job
///
/// Replaces process-wide globals: everything the engine needs is passed in here.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// NNTP server to fetch from
    pub server: ServerConfig,

    /// Directory receiving staging files, completion markers and decoded output (default: ".")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Download files, or only check that their articles exist
    #[serde(default)]
    pub mode: JobMode,

    /// Per-operation socket timeouts and retry budgets
    #[serde(default)]
    pub timeouts: TimeoutConfig,

    /// Backoff applied around a session reset when reconnecting fails transiently
    #[serde(default)]
    pub reconnect: RetryConfig,
}

impl Config {
    /// Create a configuration for `server` with every other setting at its default
    #[must_use]
    pub fn new(server: ServerConfig) -> Self {
        Self {
            server,
            output_dir: default_output_dir(),
            mode: JobMode::default(),
            timeouts: TimeoutConfig::default(),
            reconnect: RetryConfig::default(),
        }
    }

    /// Check the configuration for values the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.server.host.trim().is_empty() {
            return Err(Error::config("server.host", "host must not be empty"));
        }
        if self.server.username.is_some() && self.server.password.is_none() {
            return Err(Error::config(
                "server.password",
                "a password is required when a username is set",
            ));
        }
        if self.server.connect_attempts == 0 {
            return Err(Error::config(
                "server.connect_attempts",
                "at least one connection attempt is required",
            ));
        }
        if self.timeouts.read_retries == 0 {
            return Err(Error::config(
                "timeouts.read_retries",
                "at least one read attempt is required",
            ));
        }
        if self.timeouts.reset_attempts == 0 {
            return Err(Error::config(
                "timeouts.reset_attempts",
                "at least one reconnect attempt is required",
            ));
        }
        Ok(())
    }
}

/// NNTP server configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server hostname
    pub host: String,

    /// Server port (default: 119)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Username for AUTHINFO (None = anonymous)
    #[serde(default)]
    pub username: Option<String>,

    /// Password for AUTHINFO
    #[serde(default)]
    pub password: Option<String>,

    /// Connection attempts when the server answers "too many connections" (default: 3)
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,
}

impl ServerConfig {
    /// Create an anonymous server configuration on the default port
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: default_port(),
            username: None,
            password: None,
            connect_attempts: default_connect_attempts(),
        }
    }

    /// Attach credentials
    #[must_use]
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Whether the session skips AUTHINFO
    pub fn is_anonymous(&self) -> bool {
        self.username.is_none()
    }
}

/// Fetch mode
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobMode {
    /// Retrieve segments, decode and mark files complete (default)
    #[default]
    Download,
    /// Only STAT each segment and count the missing ones
    Verify,
}

/// Socket timeouts and retry budgets
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Bounded wait for a send to complete (default: 5 seconds)
    #[serde(default = "default_write_timeout", with = "duration_serde")]
    pub write: Duration,

    /// Bounded wait for data to arrive (default: 10 seconds)
    #[serde(default = "default_read_timeout", with = "duration_serde")]
    pub read: Duration,

    /// Bounded wait for the TCP handshake (default: 10 seconds)
    #[serde(default = "default_connect_timeout", with = "duration_serde")]
    pub connect: Duration,

    /// Sleep between attempts after a 400 greeting (default: 10 seconds)
    #[serde(default = "default_busy_backoff", with = "duration_serde")]
    pub busy_backoff: Duration,

    /// Consecutive receive timeouts tolerated while streaming a body (default: 3)
    #[serde(default = "default_read_retries")]
    pub read_retries: u32,

    /// Connection attempts used when resetting a broken session (default: 3)
    #[serde(default = "default_reset_attempts")]
    pub reset_attempts: u32,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            write: default_write_timeout(),
            read: default_read_timeout(),
            connect: default_connect_timeout(),
            busy_backoff: default_busy_backoff(),
            read_retries: default_read_retries(),
            reset_attempts: default_reset_attempts(),
        }
    }
}

/// Retry behavior configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 2)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 5 seconds)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 30 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_port() -> u16 {
    119
}

fn default_connect_attempts() -> u32 {
    3
}

fn default_write_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_read_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_busy_backoff() -> Duration {
    Duration::from_secs(10)
}

fn default_read_retries() -> u32 {
    3
}

fn default_reset_attempts() -> u32 {
    3
}

fn default_max_attempts() -> u32 {
    2
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(5)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_true() -> bool {
    true
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
