//! Docker MCP Server Library
//!
//! A Model Context Protocol (MCP) server for Docker.
//! Provides tools for managing containers and images through the Docker Engine API.

pub mod config;
pub mod docker;
pub mod error;
pub mod mcp;

pub use config::Config;
pub use error::{DockerMcpError, Result};
