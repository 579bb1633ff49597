//! Error types for the Docker MCP Server
//!
//! This module defines the error hierarchy for all operations in the server.

use thiserror::Error;

/// Main error type for the Docker MCP Server
#[derive(Error, Debug)]
pub enum DockerMcpError {
    /// Docker Engine API errors, tagged with the operation that failed
    #[error("{context}: {source}")]
    Docker {
        context: String,
        source: bollard::errors::Error,
    },

    /// Failures the engine reports in-band (error events in a stream)
    #[error("{context}: {message}")]
    Engine { context: String, message: String },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// MCP protocol errors
    #[error("MCP protocol error: {0}")]
    Mcp(#[from] McpError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid log level: {level}")]
    InvalidLogLevel { level: String },

    #[error("Invalid log format: {format}")]
    InvalidLogFormat { format: String },

    #[error("Failed to create log directory {path}: {message}")]
    LogDirCreationFailed { path: String, message: String },

    #[error("Failed to open log file {path}: {message}")]
    LogFileOpenFailed { path: String, message: String },
}

/// Validation errors for tool arguments
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    /// Rendered as `<field> is required`, the wording tool callers see.
    #[error("{field} is required")]
    MissingField { field: String },

    #[error("invalid {name}: {message}")]
    InvalidParameter { name: String, message: String },

    #[error("dockerfile {name} not found in context")]
    DockerfileNotFound { name: String },
}

/// MCP protocol errors
#[derive(Error, Debug)]
pub enum McpError {
    #[error("Unknown tool: {name}")]
    UnknownTool { name: String },

    #[error("invalid arguments: {message}")]
    InvalidArguments { message: String },

    #[error("Transport error: {message}")]
    TransportError { message: String },
}

/// Result type alias for Docker MCP operations
pub type Result<T> = std::result::Result<T, DockerMcpError>;

impl DockerMcpError {
    /// Wrap a Docker client error with the failed operation, e.g. `failed to start container`
    pub fn docker(context: impl Into<String>, source: bollard::errors::Error) -> Self {
        DockerMcpError::Docker {
            context: context.into(),
            source,
        }
    }

    /// Build an error for a failure reported inside an engine stream
    pub fn engine(context: impl Into<String>, message: impl Into<String>) -> Self {
        DockerMcpError::Engine {
            context: context.into(),
            message: message.into(),
        }
    }
}

impl ValidationError {
    /// Shorthand for a missing required argument
    pub fn missing(field: impl Into<String>) -> Self {
        ValidationError::MissingField {
            field: field.into(),
        }
    }

    /// Shorthand for an argument with an unacceptable value
    pub fn invalid(name: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationError::InvalidParameter {
            name: name.into(),
            message: message.into(),
        }
    }
}
