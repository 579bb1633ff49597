//! Configuration management for the Docker MCP Server
//!
//! Handles socket discovery, logging options, and engine timeouts.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use tracing::Level;

use crate::error::{ConfigError, DockerMcpError, Result};

/// Output format for log records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = DockerMcpError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(ConfigError::InvalidLogFormat {
                format: other.to_string(),
            }
            .into()),
        }
    }
}

/// Configuration for the Docker MCP Server
#[derive(Debug, Clone)]
pub struct Config {
    /// Unix socket of the Docker daemon
    pub docker_socket: PathBuf,

    /// Log record format
    pub log_format: LogFormat,

    /// Minimum level written to the log
    pub log_level: Level,

    /// Log file; `None` sends logs to stderr
    pub log_file: Option<PathBuf>,

    /// Timeout for Docker Engine API requests, in seconds
    pub engine_timeout_secs: u64,

    /// How long a `logs` call with `follow` keeps reading
    pub follow_window: Duration,
}

impl Config {
    /// Create a configuration with detected socket and default paths
    pub fn new() -> Self {
        Self {
            docker_socket: detect_docker_socket(),
            log_format: LogFormat::Text,
            log_level: Level::INFO,
            log_file: Some(default_log_path()),
            engine_timeout_secs: defaults::ENGINE_TIMEOUT_SECS,
            follow_window: Duration::from_secs(defaults::FOLLOW_WINDOW_SECS),
        }
    }

    /// Docker host URL for the configured socket
    pub fn docker_host(&self) -> String {
        format!("unix://{}", self.docker_socket.display())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a log level name as accepted on the command line
pub fn parse_log_level(level: &str) -> Result<Level> {
    match level {
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        other => Err(ConfigError::InvalidLogLevel {
            level: other.to_string(),
        }
        .into()),
    }
}

/// Default log file location: `~/.docker-mcp/docker-mcp.log`
pub fn default_log_path() -> PathBuf {
    match dirs::home_dir() {
        Some(home) => home.join(".docker-mcp").join("docker-mcp.log"),
        None => std::env::temp_dir().join("docker-mcp.log"),
    }
}

/// Locate the Docker daemon socket on this machine
pub fn detect_docker_socket() -> PathBuf {
    if let Ok(host) = std::env::var("DOCKER_HOST") {
        if let Some(path) = host.strip_prefix("unix://") {
            return PathBuf::from(path);
        }
    }

    let home = dirs::home_dir();
    detect_docker_socket_in(home.as_deref(), |p| p.exists())
}

/// Socket discovery over the well-known locations.
///
/// Later candidates win: a Rancher Desktop or Colima socket takes precedence
/// over the system one when present.
pub fn detect_docker_socket_in(home: Option<&Path>, exists: impl Fn(&Path) -> bool) -> PathBuf {
    let mut socket = PathBuf::from(defaults::DOCKER_SOCKET);

    if let Some(home) = home {
        for candidate in [".rd/docker.sock", ".colima/docker.sock"] {
            let path = home.join(candidate);
            if exists(&path) {
                socket = path;
            }
        }
    }

    socket
}

/// Default values shared by the CLI and the tool handlers
pub mod defaults {
    /// System Docker socket
    pub const DOCKER_SOCKET: &str = "/var/run/docker.sock";

    /// Engine request timeout in seconds
    pub const ENGINE_TIMEOUT_SECS: u64 = 120;

    /// Follow window for `logs` in seconds
    pub const FOLLOW_WINDOW_SECS: u64 = 10;

    /// Grace period before a stopped container is killed
    pub const STOP_TIMEOUT_SECS: i64 = 10;

    /// Lines returned by `logs` when no tail is given
    pub const LOG_TAIL_LINES: u64 = 100;

    /// Search results returned when no limit is given
    pub const SEARCH_LIMIT: u64 = 25;

    /// Largest accepted search limit
    pub const SEARCH_LIMIT_MAX: u64 = 100;

    /// Dockerfile name used when a build does not name one
    pub const DOCKERFILE: &str = "Dockerfile";

    /// Retries for the `on-failure` restart policy
    pub const ON_FAILURE_MAX_RETRIES: i64 = 3;
}
