//! Uniform response envelope
//!
//! Every tool answers with one text content item holding
//! `{success, data, error, count, timestamp}` as indented JSON.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::mcp::types::CallToolResult;

/// The JSON envelope wrapped around every tool result
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ApiResponse {
    pub success: bool,

    /// Payload; `null` on failure
    pub data: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Element count, present for list payloads only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,

    pub timestamp: DateTime<Utc>,
}

impl ApiResponse {
    /// Envelope for a successful single-object result
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data,
            error: None,
            count: None,
            timestamp: Utc::now(),
        }
    }

    /// Envelope for a successful list result
    pub fn list(data: Value, count: usize) -> Self {
        Self {
            count: Some(count),
            ..Self::ok(data)
        }
    }

    /// Envelope for a failed call
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: Value::Null,
            error: Some(message.into()),
            count: None,
            timestamp: Utc::now(),
        }
    }

    /// Render as the tool result handed back over MCP
    pub fn into_tool_result(self) -> CallToolResult {
        let is_error = !self.success;
        let text = match serde_json::to_string_pretty(&self) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!("Failed to serialize response envelope: {}", e);
                return CallToolResult::error_text(format!("failed to encode response: {}", e));
            }
        };

        if is_error {
            CallToolResult::error_text(text)
        } else {
            CallToolResult::text(text)
        }
    }
}

/// Successful result carrying one serializable value
pub fn success<T: Serialize>(data: &T) -> CallToolResult {
    match serde_json::to_value(data) {
        Ok(value) => ApiResponse::ok(value).into_tool_result(),
        Err(e) => error(format!("failed to encode response: {}", e)),
    }
}

/// Successful result carrying a list; `count` is always set, also for empty lists
pub fn success_list<T: Serialize>(items: &[T]) -> CallToolResult {
    match serde_json::to_value(items) {
        Ok(value) => ApiResponse::list(value, items.len()).into_tool_result(),
        Err(e) => error(format!("failed to encode response: {}", e)),
    }
}

/// Failed result with the given message
pub fn error(message: impl Into<String>) -> CallToolResult {
    ApiResponse::failure(message).into_tool_result()
}
