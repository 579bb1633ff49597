//! MCP Tool definitions and handlers
//!
//! Defines the Docker tools, validates their arguments and wraps every
//! engine result in the response envelope.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::sync::mpsc;

use crate::config::defaults;
use crate::docker::engine::ContainerEngine;
use crate::docker::types::{
    BuildSpec, CommandResponse, ContainerActionResponse, ContainerSpec, InspectResponse, LogsResponse,
    LogsSpec, ProgressEvent, PullProgressResponse,
};
use crate::docker::utils::{ensure_dockerfile, parse_port_map, parse_restart_policy, parse_tail};
use crate::error::{DockerMcpError, McpError, Result, ValidationError};
use crate::mcp::response;
use crate::mcp::types::{
    methods, CallToolResult, JsonRpcNotification, OutgoingMessage, ProgressNotificationParams,
    ProgressToken, Tool,
};

/// Forwards pull progress to the client as `notifications/progress`
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    token: ProgressToken,
    sender: mpsc::UnboundedSender<OutgoingMessage>,
}

impl ProgressReporter {
    pub fn new(token: ProgressToken, sender: mpsc::UnboundedSender<OutgoingMessage>) -> Self {
        Self { token, sender }
    }

    fn report(&self, step: u64, event: &ProgressEvent) {
        let params = ProgressNotificationParams {
            progress_token: self.token.clone(),
            progress: step as f64,
            total: None,
            message: Some(event.describe()),
        };

        let params = match serde_json::to_value(params) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!("Failed to encode progress notification: {}", e);
                return;
            }
        };

        // The writer is gone once the client disconnected; nothing left to tell.
        let _ = self
            .sender
            .send(JsonRpcNotification::new(methods::PROGRESS, Some(params)).into());
    }
}

/// Tool handler
pub struct ToolHandler {
    engine: Arc<dyn ContainerEngine>,
}

impl ToolHandler {
    /// Create a new tool handler
    pub fn new(engine: Arc<dyn ContainerEngine>) -> Self {
        Self { engine }
    }

    /// List all available tools
    pub fn list_tools(&self) -> Vec<Tool> {
        vec![
            tool_def(
                "list_containers",
                "List all running Docker containers with their IDs, names, images and status. Returns array of container objects.",
                list_containers_schema(),
            ),
            tool_def(
                "exec_command",
                "Execute shell command in a specified container. Requires container_id and command parameters. Returns command output.",
                exec_command_schema(),
            ),
            tool_def(
                "pull_image",
                "Pull Docker image from registry. Requires image_name parameter (format: name:tag). Returns streaming progress updates.",
                pull_image_schema(),
            ),
            tool_def(
                "list_images",
                "List all locally stored Docker images. Returns array of image objects with ID, tags, size and creation time.",
                list_images_schema(),
            ),
            tool_def(
                "search",
                "Search for Docker images on Docker Hub. Returns array of image results including name, description, official status, and star count.",
                search_schema(),
            ),
            tool_def(
                "create_container",
                "Create a new Docker container from an image. Requires image_name and container configuration.",
                create_container_schema(),
            ),
            tool_def(
                "start_container",
                "Start one or more stopped containers.",
                container_id_schema("Container ID or name to start"),
            ),
            tool_def(
                "stop_container",
                "Stop a running container.",
                timed_action_schema("Container ID or name to stop"),
            ),
            tool_def(
                "restart_container",
                "Restart a container.",
                timed_action_schema("Container ID or name to restart"),
            ),
            tool_def("remove_container", "Remove one or more containers.", remove_container_schema()),
            tool_def("remove_image", "Remove one or more images.", remove_image_schema()),
            tool_def("logs", "Fetch the logs of a container.", logs_schema()),
            tool_def(
                "inspect_container",
                "Return low-level information on Docker container.",
                container_id_schema("Container ID or name to inspect"),
            ),
            tool_def(
                "inspect_image",
                "Return low-level information on Docker image.",
                json!({
                    "type": "object",
                    "properties": {
                        "image": {
                            "type": "string",
                            "description": "Image ID or name to inspect"
                        }
                    },
                    "required": ["image"]
                }),
            ),
            tool_def("build_image", "Build an image from a Dockerfile.", build_image_schema()),
        ]
    }

    /// Call a tool by name
    ///
    /// `progress` is only consulted by `pull_image`.
    pub async fn call_tool(
        &self,
        name: &str,
        args: Value,
        progress: Option<ProgressReporter>,
    ) -> CallToolResult {
        tracing::debug!(tool = name, "Calling tool");

        // Clients may omit `arguments` entirely for tools without parameters.
        let args = if args.is_null() { Value::Object(Map::new()) } else { args };

        let result = match name {
            "list_containers" => self.handle_list_containers(args).await,
            "exec_command" => self.handle_exec_command(args).await,
            "pull_image" => self.handle_pull_image(args, progress).await,
            "list_images" => self.handle_list_images(args).await,
            "search" => self.handle_search(args).await,
            "create_container" => self.handle_create_container(args).await,
            "start_container" => self.handle_start_container(args).await,
            "stop_container" => self.handle_stop_container(args).await,
            "restart_container" => self.handle_restart_container(args).await,
            "remove_container" => self.handle_remove_container(args).await,
            "remove_image" => self.handle_remove_image(args).await,
            "logs" => self.handle_logs(args).await,
            "inspect_container" => self.handle_inspect_container(args).await,
            "inspect_image" => self.handle_inspect_image(args).await,
            "build_image" => self.handle_build_image(args).await,
            _ => Err(McpError::UnknownTool {
                name: name.to_string(),
            }
            .into()),
        };

        match result {
            Ok(r) => r,
            Err(e) => {
                let message = error_message(&e);
                tracing::warn!(tool = name, "Tool call failed: {}", message);
                response::error(message)
            }
        }
    }

    // ==================== Tool Handlers ====================

    async fn handle_list_containers(&self, args: Value) -> Result<CallToolResult> {
        #[derive(Deserialize, Default)]
        #[serde(default)]
        struct Args {
            all: bool,
        }

        let args: Args = parse_args(args)?;
        let containers = self.engine.list_containers(args.all).await?;
        Ok(response::success_list(&containers))
    }

    async fn handle_exec_command(&self, args: Value) -> Result<CallToolResult> {
        #[derive(Deserialize, Default)]
        #[serde(default)]
        struct Args {
            container_id: String,
            command: String,
        }

        let args: Args = parse_args(args)?;
        require("container_id", &args.container_id)?;
        require("command", &args.command)?;

        let exec = self.engine.exec_command(&args.container_id, &args.command).await?;

        Ok(response::success(&CommandResponse {
            container_id: args.container_id,
            command: args.command,
            output: exec.output,
            exit_code: exec.exit_code,
        }))
    }

    async fn handle_pull_image(
        &self,
        args: Value,
        progress: Option<ProgressReporter>,
    ) -> Result<CallToolResult> {
        #[derive(Deserialize, Default)]
        #[serde(default)]
        struct Args {
            image_name: String,
        }

        let args: Args = parse_args(args)?;
        require("image_name", &args.image_name)?;

        let step = AtomicU64::new(0);
        let image_name = args.image_name.as_str();
        let sink = |event: &ProgressEvent| {
            tracing::debug!(image = image_name, "{}", event.describe());
            if let Some(reporter) = &progress {
                reporter.report(step.fetch_add(1, Ordering::Relaxed) + 1, event);
            }
        };

        self.engine.pull_image(image_name, &sink).await?;
        tracing::info!(image = image_name, "Image pulled");

        Ok(response::success(&PullProgressResponse {
            image_name: args.image_name.clone(),
            status: "success".to_string(),
            complete: true,
        }))
    }

    async fn handle_list_images(&self, args: Value) -> Result<CallToolResult> {
        #[derive(Deserialize, Default)]
        #[serde(default)]
        struct Args {
            all: bool,
        }

        let args: Args = parse_args(args)?;
        let images = self.engine.list_images(args.all).await?;

        tracing::debug!("Listed {} images", images.len());

        Ok(response::success_list(&images))
    }

    async fn handle_search(&self, args: Value) -> Result<CallToolResult> {
        #[derive(Deserialize, Default)]
        #[serde(default)]
        struct Args {
            term: String,
            limit: Option<f64>,
        }

        let args: Args = parse_args(args)?;
        require("search term", &args.term)?;

        let limit = match args.limit {
            None => defaults::SEARCH_LIMIT,
            Some(l) if (1.0..=defaults::SEARCH_LIMIT_MAX as f64).contains(&l) => l as u64,
            Some(l) => {
                return Err(ValidationError::invalid(
                    "limit",
                    format!("{} (expected 1 to {})", l, defaults::SEARCH_LIMIT_MAX),
                )
                .into())
            }
        };

        let results = self.engine.search_images(&args.term, limit).await?;
        Ok(response::success_list(&results))
    }

    async fn handle_create_container(&self, args: Value) -> Result<CallToolResult> {
        #[derive(Deserialize, Default)]
        #[serde(default)]
        struct Args {
            image: String,
            name: String,
            command: Option<Vec<String>>,
            env: Option<Vec<String>>,
            ports: Option<Map<String, Value>>,
            volumes: Option<Vec<String>>,
            working_dir: Option<String>,
            network_mode: Option<String>,
            restart_policy: Option<String>,
            auto_remove: bool,
        }

        let args: Args = parse_args(args)?;
        require("image", &args.image)?;
        require("name", &args.name)?;

        let restart_policy = match args.restart_policy.as_deref() {
            None | Some("") => None,
            Some(policy) => Some(parse_restart_policy(policy)?),
        };

        let spec = ContainerSpec {
            name: args.name,
            image: args.image,
            command: args.command.filter(|c| !c.is_empty()),
            env: args.env.filter(|e| !e.is_empty()),
            ports: args.ports.as_ref().map(parse_port_map).unwrap_or_default(),
            volumes: args.volumes.filter(|v| !v.is_empty()),
            working_dir: args.working_dir.filter(|w| !w.is_empty()),
            network_mode: args.network_mode.filter(|n| !n.is_empty()),
            restart_policy,
            auto_remove: args.auto_remove,
        };

        let created = self.engine.create_container(&spec).await?;
        tracing::info!(id = %created.id, name = %created.name, "Container created");
        Ok(response::success(&created))
    }

    async fn handle_start_container(&self, args: Value) -> Result<CallToolResult> {
        let args: ContainerIdArgs = parse_args(args)?;
        require("container_id", &args.container_id)?;

        self.engine.start_container(&args.container_id).await?;
        Ok(response::success(&ContainerActionResponse::success(args.container_id, "start")))
    }

    async fn handle_stop_container(&self, args: Value) -> Result<CallToolResult> {
        let args: TimedActionArgs = parse_args(args)?;
        require("container_id", &args.container_id)?;

        self.engine
            .stop_container(&args.container_id, args.timeout_secs())
            .await?;
        Ok(response::success(&ContainerActionResponse::success(args.container_id, "stop")))
    }

    async fn handle_restart_container(&self, args: Value) -> Result<CallToolResult> {
        let args: TimedActionArgs = parse_args(args)?;
        require("container_id", &args.container_id)?;

        self.engine
            .restart_container(&args.container_id, args.timeout_secs())
            .await?;
        Ok(response::success(&ContainerActionResponse::success(args.container_id, "restart")))
    }

    async fn handle_remove_container(&self, args: Value) -> Result<CallToolResult> {
        #[derive(Deserialize, Default)]
        #[serde(default)]
        struct Args {
            container_id: String,
            force: bool,
            volumes: bool,
        }

        let args: Args = parse_args(args)?;
        require("container_id", &args.container_id)?;

        self.engine
            .remove_container(&args.container_id, args.force, args.volumes)
            .await?;
        Ok(response::success(&ContainerActionResponse::success(args.container_id, "remove")))
    }

    async fn handle_remove_image(&self, args: Value) -> Result<CallToolResult> {
        #[derive(Deserialize, Default)]
        #[serde(default)]
        struct Args {
            image: String,
            force: bool,
        }

        let args: Args = parse_args(args)?;
        require("image", &args.image)?;

        let removed = self.engine.remove_image(&args.image, args.force).await?;
        Ok(response::success(&removed))
    }

    async fn handle_logs(&self, args: Value) -> Result<CallToolResult> {
        #[derive(Deserialize, Default)]
        #[serde(default)]
        struct Args {
            container_id: String,
            follow: bool,
            timestamps: bool,
            tail: Option<Value>,
        }

        let args: Args = parse_args(args)?;
        require("container_id", &args.container_id)?;

        let spec = LogsSpec {
            follow: args.follow,
            timestamps: args.timestamps,
            tail: parse_tail(args.tail.as_ref())?,
        };

        let logs = self.engine.container_logs(&args.container_id, spec).await?;
        Ok(response::success(&LogsResponse {
            container_id: args.container_id,
            logs,
        }))
    }

    async fn handle_inspect_container(&self, args: Value) -> Result<CallToolResult> {
        let args: ContainerIdArgs = parse_args(args)?;
        require("container_id", &args.container_id)?;

        let details = self.engine.inspect_container(&args.container_id).await?;
        Ok(response::success(&InspectResponse {
            id: args.container_id,
            kind: "container".to_string(),
            details,
        }))
    }

    async fn handle_inspect_image(&self, args: Value) -> Result<CallToolResult> {
        #[derive(Deserialize, Default)]
        #[serde(default)]
        struct Args {
            image: String,
        }

        let args: Args = parse_args(args)?;
        require("image", &args.image)?;

        let details = self.engine.inspect_image(&args.image).await?;
        Ok(response::success(&InspectResponse {
            id: args.image,
            kind: "image".to_string(),
            details,
        }))
    }

    async fn handle_build_image(&self, args: Value) -> Result<CallToolResult> {
        #[derive(Deserialize, Default)]
        #[serde(default)]
        struct Args {
            context_path: String,
            dockerfile: Option<String>,
            tag: String,
            no_cache: bool,
            pull: bool,
        }

        let args: Args = parse_args(args)?;
        require("context_path", &args.context_path)?;
        require("tag", &args.tag)?;

        let dockerfile = args
            .dockerfile
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| defaults::DOCKERFILE.to_string());
        let context_path = PathBuf::from(&args.context_path);
        ensure_dockerfile(&context_path, &dockerfile)?;

        let spec = BuildSpec {
            context_path,
            dockerfile,
            tag: args.tag,
            no_cache: args.no_cache,
            pull: args.pull,
        };

        let built = self.engine.build_image(&spec).await?;
        if built.success {
            tracing::info!(tag = %spec.tag, "Image built");
        } else {
            tracing::warn!(tag = %spec.tag, "Image build failed: {}", built.error.as_deref().unwrap_or(""));
        }
        Ok(response::success(&built))
    }
}

/// Arguments of tools that only take a container reference
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ContainerIdArgs {
    container_id: String,
}

/// Arguments of stop and restart
#[derive(Deserialize, Default)]
#[serde(default)]
struct TimedActionArgs {
    container_id: String,
    timeout: Option<f64>,
}

impl TimedActionArgs {
    fn timeout_secs(&self) -> i64 {
        self.timeout
            .map(|t| t as i64)
            .unwrap_or(defaults::STOP_TIMEOUT_SECS)
    }
}

fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T> {
    serde_json::from_value(args).map_err(|e| {
        McpError::InvalidArguments {
            message: e.to_string(),
        }
        .into()
    })
}

fn require(field: &str, value: &str) -> std::result::Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::missing(field));
    }
    Ok(())
}

/// Text placed in the envelope's `error` field
fn error_message(err: &DockerMcpError) -> String {
    match err {
        DockerMcpError::Validation(e) => e.to_string(),
        DockerMcpError::Mcp(e) => e.to_string(),
        other => other.to_string(),
    }
}

// ==================== Tool Schemas ====================

fn tool_def(name: &str, description: &str, schema: Value) -> Tool {
    Tool {
        name: name.to_string(),
        description: Some(description.to_string()),
        input_schema: schema,
    }
}

fn list_containers_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "all": {
                "type": "boolean",
                "description": "Show all containers (default shows just running)",
                "default": false
            }
        }
    })
}

fn exec_command_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "container_id": {
                "type": "string",
                "description": "Container ID (string)"
            },
            "command": {
                "type": "string",
                "description": "Command to execute (string)"
            }
        },
        "required": ["container_id", "command"]
    })
}

fn pull_image_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "image_name": {
                "type": "string",
                "description": "Image name with tag (string)"
            }
        },
        "required": ["image_name"]
    })
}

fn list_images_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "all": {
                "type": "boolean",
                "description": "Show all images (default hides intermediate images)",
                "default": false
            }
        }
    })
}

fn search_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "term": {
                "type": "string",
                "description": "Search term (string)"
            },
            "limit": {
                "type": "number",
                "description": "Maximum number of results to return (optional, default: 25)",
                "default": defaults::SEARCH_LIMIT,
                "minimum": 1,
                "maximum": defaults::SEARCH_LIMIT_MAX
            }
        },
        "required": ["term"]
    })
}

fn create_container_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "image": {
                "type": "string",
                "description": "Image name to create container from"
            },
            "name": {
                "type": "string",
                "description": "Name for the container"
            },
            "command": {
                "type": "array",
                "items": {"type": "string"},
                "description": "Command to run in the container"
            },
            "env": {
                "type": "array",
                "items": {"type": "string"},
                "description": "Environment variables (format: KEY=VALUE)"
            },
            "ports": {
                "type": "object",
                "description": "Port mappings (format: {\"host_port:container_port/protocol\": {}})"
            },
            "volumes": {
                "type": "array",
                "items": {"type": "string"},
                "description": "Volume mappings (format: host_path:container_path)"
            },
            "working_dir": {
                "type": "string",
                "description": "Working directory inside the container"
            },
            "network_mode": {
                "type": "string",
                "description": "Network mode (bridge, host, none, container:<name|id>)"
            },
            "restart_policy": {
                "type": "string",
                "enum": ["no", "always", "on-failure", "unless-stopped"],
                "description": "Restart policy (no, always, on-failure, unless-stopped)"
            },
            "auto_remove": {
                "type": "boolean",
                "description": "Automatically remove the container when it exits",
                "default": false
            }
        },
        "required": ["image", "name"]
    })
}

fn container_id_schema(description: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "container_id": {
                "type": "string",
                "description": description
            }
        },
        "required": ["container_id"]
    })
}

fn timed_action_schema(description: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "container_id": {
                "type": "string",
                "description": description
            },
            "timeout": {
                "type": "number",
                "description": "Seconds to wait before killing the container",
                "default": defaults::STOP_TIMEOUT_SECS
            }
        },
        "required": ["container_id"]
    })
}

fn remove_container_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "container_id": {
                "type": "string",
                "description": "Container ID or name to remove"
            },
            "force": {
                "type": "boolean",
                "description": "Force the removal of a running container",
                "default": false
            },
            "volumes": {
                "type": "boolean",
                "description": "Remove anonymous volumes associated with the container",
                "default": false
            }
        },
        "required": ["container_id"]
    })
}

fn remove_image_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "image": {
                "type": "string",
                "description": "Image ID or name to remove"
            },
            "force": {
                "type": "boolean",
                "description": "Force removal of the image",
                "default": false
            }
        },
        "required": ["image"]
    })
}

fn logs_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "container_id": {
                "type": "string",
                "description": "Container ID or name to get logs from"
            },
            "follow": {
                "type": "boolean",
                "description": "Follow log output",
                "default": false
            },
            "timestamps": {
                "type": "boolean",
                "description": "Show timestamps",
                "default": false
            },
            "tail": {
                "type": ["number", "string"],
                "description": "Number of lines to show from the end of the logs (negative or \"all\" for everything)",
                "default": defaults::LOG_TAIL_LINES
            }
        },
        "required": ["container_id"]
    })
}

fn build_image_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "context_path": {
                "type": "string",
                "description": "Path to the build context"
            },
            "dockerfile": {
                "type": "string",
                "description": "Name of the Dockerfile",
                "default": defaults::DOCKERFILE
            },
            "tag": {
                "type": "string",
                "description": "Name and optionally a tag in the 'name:tag' format"
            },
            "no_cache": {
                "type": "boolean",
                "description": "Do not use cache when building the image",
                "default": false
            },
            "pull": {
                "type": "boolean",
                "description": "Always attempt to pull a newer version of the image",
                "default": false
            }
        },
        "required": ["context_path", "tag"]
    })
}
