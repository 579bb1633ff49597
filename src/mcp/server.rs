//! MCP Server implementation
//!
//! Implements the Model Context Protocol server for stdio transport.

use std::sync::Arc;

use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

use crate::docker::engine::ContainerEngine;
use crate::error::{McpError, Result};
use crate::mcp::tools::{ProgressReporter, ToolHandler};
use crate::mcp::types::*;

/// MCP Server info
const SERVER_NAME: &str = "docker-mcp";
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// MCP Server for the Docker engine
pub struct McpServer {
    /// Tool handler
    tool_handler: ToolHandler,

    /// Whether the client sent `notifications/initialized`
    initialized: bool,
}

impl McpServer {
    /// Create a new MCP server
    pub fn new(engine: Arc<dyn ContainerEngine>) -> Self {
        Self {
            tool_handler: ToolHandler::new(engine),
            initialized: false,
        }
    }

    /// Whether the initialization handshake completed
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Run the server on stdio until stdin closes
    pub async fn run_stdio(&mut self) -> Result<()> {
        let (tx, rx) = mpsc::unbounded_channel();
        let writer = tokio::spawn(write_messages(tokio::io::stdout(), rx));

        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }

            if let Some(response) = self.handle_message(&line, &tx).await {
                if tx.send(response.into()).is_err() {
                    tracing::warn!("Output channel closed, stopping");
                    break;
                }
            }
        }

        tracing::info!("stdin closed, shutting down");
        drop(tx);

        match writer.await {
            Ok(result) => result,
            Err(e) => Err(McpError::TransportError {
                message: e.to_string(),
            }
            .into()),
        }
    }

    /// Handle one incoming JSON-RPC line.
    ///
    /// Returns the response to send, or `None` for notifications. Progress
    /// notifications raised while a tool runs go to `outgoing` directly.
    pub async fn handle_message(
        &mut self,
        message: &str,
        outgoing: &mpsc::UnboundedSender<OutgoingMessage>,
    ) -> Option<JsonRpcResponse> {
        let value: serde_json::Value = match serde_json::from_str(message) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Unparseable message: {}", e);
                return Some(JsonRpcResponse::error(
                    RequestId::Number(0),
                    JsonRpcError::parse_error(e.to_string()),
                ));
            }
        };

        let request = match parse_request(value) {
            Ok(req) => req,
            Err((id, error)) => {
                tracing::warn!("Invalid request: {}", error.message);
                return Some(JsonRpcResponse::error(id, error));
            }
        };

        let id = match request.id.clone() {
            Some(id) => id,
            None => {
                self.handle_notification(&request);
                return None;
            }
        };

        let response = match request.method.as_str() {
            methods::INITIALIZE => to_response(id, &self.handle_initialize(&request)),
            methods::PING => JsonRpcResponse::success(id, serde_json::json!({})),
            methods::LIST_TOOLS => to_response(
                id,
                &ListToolsResult {
                    tools: self.tool_handler.list_tools(),
                },
            ),
            methods::CALL_TOOL => match self.parse_call_params(&request) {
                Ok(params) => {
                    let progress = params
                        .progress_token()
                        .map(|token| ProgressReporter::new(token, outgoing.clone()));
                    let result = self
                        .tool_handler
                        .call_tool(&params.name, params.arguments, progress)
                        .await;
                    to_response(id, &result)
                }
                Err(error) => JsonRpcResponse::error(id, error),
            },
            _ => {
                tracing::debug!(method = %request.method, "Unknown method");
                JsonRpcResponse::error(id, JsonRpcError::method_not_found(&request.method))
            }
        };

        Some(response)
    }

    fn handle_notification(&mut self, request: &JsonRpcRequest) {
        match request.method.as_str() {
            methods::INITIALIZED => {
                self.initialized = true;
                tracing::debug!("Client initialized");
            }
            methods::CANCELLED => tracing::debug!("Client cancelled a request"),
            other => tracing::debug!(method = other, "Ignoring notification"),
        }
    }

    /// Handle initialize request
    fn handle_initialize(&self, request: &JsonRpcRequest) -> InitializeResult {
        let params = request
            .params
            .clone()
            .and_then(|p| serde_json::from_value::<InitializeParams>(p).ok());

        if let Some(params) = params {
            tracing::info!(
                client = %params.client_info.name,
                client_version = %params.client_info.version,
                protocol = %params.protocol_version,
                "Client connected"
            );
        }

        InitializeResult {
            protocol_version: MCP_VERSION.to_string(),
            server_info: ServerInfo {
                name: SERVER_NAME.to_string(),
                version: SERVER_VERSION.to_string(),
            },
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability::default()),
            },
        }
    }

    fn parse_call_params(&self, request: &JsonRpcRequest) -> std::result::Result<CallToolParams, JsonRpcError> {
        let params = request
            .params
            .clone()
            .ok_or_else(|| JsonRpcError::invalid_params("Missing tool parameters"))?;

        serde_json::from_value(params)
            .map_err(|e| JsonRpcError::invalid_params(format!("Invalid tool parameters: {}", e)))
    }
}

/// Turn well-formed JSON into a request.
///
/// On failure the error carries the message's `id` when one can be read,
/// so the client can still match the `-32600` reply.
fn parse_request(value: serde_json::Value) -> std::result::Result<JsonRpcRequest, (RequestId, JsonRpcError)> {
    let id = value
        .get("id")
        .and_then(|id| serde_json::from_value::<RequestId>(id.clone()).ok())
        .unwrap_or(RequestId::Number(0));

    let request: JsonRpcRequest = serde_json::from_value(value)
        .map_err(|e| (id.clone(), JsonRpcError::invalid_request(format!("Invalid request: {}", e))))?;

    if request.jsonrpc != JSONRPC_VERSION {
        return Err((
            id,
            JsonRpcError::invalid_request(format!("Unsupported jsonrpc version: {}", request.jsonrpc)),
        ));
    }

    Ok(request)
}

fn to_response<T: Serialize>(id: RequestId, result: &T) -> JsonRpcResponse {
    match serde_json::to_value(result) {
        Ok(value) => JsonRpcResponse::success(id, value),
        Err(e) => JsonRpcResponse::error(id, JsonRpcError::internal_error(e.to_string())),
    }
}

/// Write every outgoing message as one JSON line until all senders are dropped
pub async fn write_messages<W>(mut out: W, mut rx: mpsc::UnboundedReceiver<OutgoingMessage>) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = rx.recv().await {
        let mut line = serde_json::to_string(&message)?;
        line.push('\n');
        out.write_all(line.as_bytes()).await?;
        out.flush().await?;
    }

    Ok(())
}
