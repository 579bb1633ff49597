//! Docker MCP Server - Rust Implementation
//!
//! A Model Context Protocol (MCP) server for the Docker engine.
//! Provides tools for listing, running, building and inspecting containers
//! and images through the local Docker daemon.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

use docker_mcp::config::{defaults, parse_log_level, Config, LogFormat};
use docker_mcp::docker::client::DockerClient;
use docker_mcp::error::{ConfigError, Result};
use docker_mcp::mcp::server::McpServer;

/// Docker MCP Server
#[derive(Parser)]
#[command(name = "docker-mcp")]
#[command(author, version, about = "Docker MCP Server - A Model Context Protocol server for the Docker engine")]
struct Cli {
    /// Docker daemon socket (detected when omitted)
    #[arg(long, env = "DOCKER_MCP_SOCKET")]
    docker_socket: Option<PathBuf>,

    /// Log format: text or json
    #[arg(long, env = "DOCKER_MCP_LOG_FORMAT", default_value = "text")]
    log_format: String,

    /// Log level: debug, info, warn or error
    #[arg(long, env = "DOCKER_MCP_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Log file, `-` for stderr [default: ~/.docker-mcp/docker-mcp.log]
    #[arg(long, env = "DOCKER_MCP_LOG_FILE")]
    log_file: Option<PathBuf>,

    /// Docker API request timeout in seconds
    #[arg(long, env = "DOCKER_MCP_TIMEOUT", default_value_t = defaults::ENGINE_TIMEOUT_SECS)]
    timeout: u64,

    /// Seconds a followed `logs` call keeps reading
    #[arg(long, env = "DOCKER_MCP_FOLLOW_WINDOW", default_value_t = defaults::FOLLOW_WINDOW_SECS)]
    follow_window: u64,
}

impl Cli {
    fn into_config(self) -> Result<Config> {
        let mut config = Config::new();

        if let Some(socket) = self.docker_socket {
            config.docker_socket = socket;
        }
        config.log_format = self.log_format.parse::<LogFormat>()?;
        config.log_level = parse_log_level(&self.log_level)?;
        match self.log_file {
            Some(path) if path.as_os_str() == "-" => config.log_file = None,
            Some(path) => config.log_file = Some(path),
            None => {}
        }
        config.engine_timeout_secs = self.timeout;
        config.follow_window = Duration::from_secs(self.follow_window);

        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Cli::parse().into_config()?;

    init_logging(&config);

    tracing::info!(
        socket = %config.docker_socket.display(),
        log_format = ?config.log_format,
        log_level = %config.log_level,
        log_file = ?config.log_file,
        "Starting docker-mcp {}",
        env!("CARGO_PKG_VERSION")
    );

    run_server(config).await
}

async fn run_server(config: Config) -> Result<()> {
    let client = DockerClient::connect(&config).await?;

    // The daemon may come up later; every tool call reports its own failure.
    if let Err(e) = client.ping().await {
        tracing::warn!("Docker daemon not reachable yet: {}", e);
    }

    let mut server = McpServer::new(Arc::new(client));
    server.run_stdio().await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Install the global subscriber. Never writes to stdout.
fn init_logging(config: &Config) {
    let filter = EnvFilter::from_default_env().add_directive(LevelFilter::from_level(config.log_level).into());

    let (writer, file_error) = match &config.log_file {
        Some(path) => match open_log_file(path) {
            Ok(file) => (BoxMakeWriter::new(Mutex::new(file)), None),
            Err(e) => (BoxMakeWriter::new(std::io::stderr), Some(e)),
        },
        None => (BoxMakeWriter::new(std::io::stderr), None),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false);

    match config.log_format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }

    if let Some(e) = file_error {
        tracing::warn!("Logging to stderr: {}", e);
    }
}

fn open_log_file(path: &Path) -> std::result::Result<std::fs::File, ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| ConfigError::LogDirCreationFailed {
            path: dir.display().to_string(),
            message: e.to_string(),
        })?;
    }

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| ConfigError::LogFileOpenFailed {
            path: path.display().to_string(),
            message: e.to_string(),
        })
}
