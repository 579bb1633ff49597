//! Integration tests for Docker MCP Server
//!
//! These tests verify the MCP protocol handling and tool invocations.
//! Note: These tests run against an in-memory engine - they don't talk to a
//! Docker daemon.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use docker_mcp::docker::engine::{ContainerEngine, ProgressSink};
use docker_mcp::docker::types::*;
use docker_mcp::error::{DockerMcpError, Result};
use docker_mcp::mcp::server::McpServer;
use docker_mcp::mcp::tools::{ProgressReporter, ToolHandler};
use docker_mcp::mcp::types::{JsonRpcResponse, OutgoingMessage, RequestId};

/// In-memory engine recording every call it receives
#[derive(Default)]
struct FakeEngine {
    calls: Mutex<Vec<String>>,
    created: Mutex<Option<ContainerSpec>>,
    containers: Vec<ContainerInfo>,
    failing: bool,
}

impl FakeEngine {
    fn with_containers() -> Self {
        Self {
            containers: vec![ContainerInfo {
                id: "c0ffee".to_string(),
                names: vec!["/web".to_string()],
                image: "nginx:latest".to_string(),
                status: "Up 2 minutes".to_string(),
                state: "running".to_string(),
                created: 1_700_000_000,
                ports: vec![Port {
                    ip: Some("0.0.0.0".to_string()),
                    private_port: 80,
                    public_port: Some(8080),
                    protocol: "tcp".to_string(),
                }],
            }],
            ..Default::default()
        }
    }

    fn failing() -> Self {
        Self {
            failing: true,
            ..Default::default()
        }
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn check(&self, context: &str) -> Result<()> {
        if self.failing {
            return Err(DockerMcpError::engine(context, "daemon unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl ContainerEngine for FakeEngine {
    async fn list_containers(&self, all: bool) -> Result<Vec<ContainerInfo>> {
        self.check("failed to list containers")?;
        self.record(format!("list_containers all={}", all));
        Ok(self.containers.clone())
    }

    async fn exec_command(&self, container_id: &str, command: &str) -> Result<ExecOutput> {
        self.check("failed to create exec")?;
        self.record(format!("exec {} {}", container_id, command));
        Ok(ExecOutput {
            output: "hello\n".to_string(),
            exit_code: Some(0),
        })
    }

    async fn pull_image(&self, image_name: &str, on_progress: ProgressSink<'_>) -> Result<()> {
        self.check("failed to pull image")?;
        self.record(format!("pull {}", image_name));
        for status in ["Pulling fs layer", "Downloading", "Pull complete"] {
            on_progress(&ProgressEvent {
                status: status.to_string(),
                id: "a1b2".to_string(),
                ..Default::default()
            });
        }
        Ok(())
    }

    async fn list_images(&self, all: bool) -> Result<Vec<ImageInfo>> {
        self.check("failed to list images")?;
        self.record(format!("list_images all={}", all));
        Ok(Vec::new())
    }

    async fn search_images(&self, term: &str, limit: u64) -> Result<Vec<SearchResult>> {
        self.check("failed to search images")?;
        self.record(format!("search {} limit={}", term, limit));
        Ok(vec![SearchResult {
            name: term.to_string(),
            description: "official build".to_string(),
            official: true,
            automated: false,
            stars: 42,
        }])
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<ContainerCreatedResponse> {
        self.check("failed to create container")?;
        *self.created.lock().unwrap() = Some(spec.clone());
        Ok(ContainerCreatedResponse {
            id: "new123".to_string(),
            name: spec.name.clone(),
            warnings: Vec::new(),
        })
    }

    async fn start_container(&self, container_id: &str) -> Result<()> {
        self.check("failed to start container")?;
        self.record(format!("start {}", container_id));
        Ok(())
    }

    async fn stop_container(&self, container_id: &str, timeout_secs: i64) -> Result<()> {
        self.check("failed to stop container")?;
        self.record(format!("stop {} t={}", container_id, timeout_secs));
        Ok(())
    }

    async fn restart_container(&self, container_id: &str, timeout_secs: i64) -> Result<()> {
        self.check("failed to restart container")?;
        self.record(format!("restart {} t={}", container_id, timeout_secs));
        Ok(())
    }

    async fn remove_container(&self, container_id: &str, force: bool, volumes: bool) -> Result<()> {
        self.check("failed to remove container")?;
        self.record(format!("remove {} force={} volumes={}", container_id, force, volumes));
        Ok(())
    }

    async fn remove_image(&self, image: &str, force: bool) -> Result<ImageRemovedResponse> {
        self.check("failed to remove image")?;
        self.record(format!("remove_image {} force={}", image, force));
        Ok(ImageRemovedResponse {
            removed: true,
            image_id: image.to_string(),
            untagged_ids: vec![format!("{}:latest", image)],
            deleted_ids: vec!["sha256:abc".to_string()],
        })
    }

    async fn container_logs(&self, container_id: &str, spec: LogsSpec) -> Result<String> {
        self.check("failed to get container logs")?;
        self.record(format!(
            "logs {} follow={} timestamps={} tail={}",
            container_id,
            spec.follow,
            spec.timestamps,
            spec.tail.as_query()
        ));
        Ok("line one\nline two\n".to_string())
    }

    async fn inspect_container(&self, container_id: &str) -> Result<Value> {
        self.check("failed to inspect container")?;
        Ok(json!({"Id": container_id, "State": {"Running": true}}))
    }

    async fn inspect_image(&self, image: &str) -> Result<Value> {
        self.check("failed to inspect image")?;
        Ok(json!({"Id": "sha256:abc", "RepoTags": [image]}))
    }

    async fn build_image(&self, spec: &BuildSpec) -> Result<BuildImageResponse> {
        self.check("failed to build image")?;
        self.record(format!(
            "build {} -f {} nocache={} pull={}",
            spec.tag, spec.dockerfile, spec.no_cache, spec.pull
        ));
        Ok(BuildImageResponse {
            success: true,
            image_id: Some("3f4e5d6c7b8a".to_string()),
            tags: vec![spec.tag.clone()],
            error: None,
            output: "Successfully built 3f4e5d6c7b8a\n".to_string(),
        })
    }
}

/// Call a tool and decode the envelope
async fn call(handler: &ToolHandler, name: &str, args: Value) -> (bool, Value) {
    let result = handler.call_tool(name, args, None).await;
    let body: Value = serde_json::from_str(result.first_text().expect("text content"))
        .expect("Failed to parse envelope");
    (result.is_error, body)
}

fn handler_with(engine: Arc<FakeEngine>) -> ToolHandler {
    ToolHandler::new(engine)
}

/// Helper to create a JSON-RPC request line
fn make_request(id: i64, method: &str, params: Option<Value>) -> String {
    let mut request = json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
    });
    if let Some(p) = params {
        request["params"] = p;
    }
    request.to_string()
}

fn to_json(response: JsonRpcResponse) -> Value {
    serde_json::to_value(response).unwrap()
}

mod mcp_protocol_tests {
    use super::*;

    fn server() -> (McpServer, mpsc::UnboundedSender<OutgoingMessage>, mpsc::UnboundedReceiver<OutgoingMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (McpServer::new(Arc::new(FakeEngine::with_containers())), tx, rx)
    }

    #[tokio::test]
    async fn test_initialize() {
        let (mut server, tx, _rx) = server();
        let request = make_request(1, "initialize", Some(json!({
            "protocolVersion": "2024-11-05",
            "clientInfo": {"name": "test-client", "version": "1.0.0"},
            "capabilities": {}
        })));

        let response = to_json(server.handle_message(&request, &tx).await.unwrap());
        assert_eq!(response["id"], 1);
        assert_eq!(response["result"]["protocolVersion"], "2024-11-05");
        assert_eq!(response["result"]["serverInfo"]["name"], "docker-mcp");
        assert!(response["result"]["capabilities"]["tools"].is_object());
    }

    #[tokio::test]
    async fn test_initialized_notification_gets_no_response() {
        let (mut server, tx, _rx) = server();
        let note = r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#;

        assert!(server.handle_message(note, &tx).await.is_none());
        assert!(server.is_initialized());
    }

    #[tokio::test]
    async fn test_unknown_notification_ignored() {
        let (mut server, tx, _rx) = server();
        let note = r#"{"jsonrpc":"2.0","method":"notifications/whatever"}"#;
        assert!(server.handle_message(note, &tx).await.is_none());
    }

    #[tokio::test]
    async fn test_ping() {
        let (mut server, tx, _rx) = server();
        let response = to_json(server.handle_message(&make_request(7, "ping", None), &tx).await.unwrap());
        assert_eq!(response["id"], 7);
        assert_eq!(response["result"], json!({}));
    }

    #[tokio::test]
    async fn test_list_tools() {
        let (mut server, tx, _rx) = server();
        let response = to_json(
            server
                .handle_message(&make_request(2, "tools/list", None), &tx)
                .await
                .unwrap(),
        );

        let tools = response["result"]["tools"].as_array().unwrap();
        let names: Vec<&str> = tools.iter().map(|t| t["name"].as_str().unwrap()).collect();
        assert_eq!(
            names,
            vec![
                "list_containers",
                "exec_command",
                "pull_image",
                "list_images",
                "search",
                "create_container",
                "start_container",
                "stop_container",
                "restart_container",
                "remove_container",
                "remove_image",
                "logs",
                "inspect_container",
                "inspect_image",
                "build_image",
            ]
        );
        for tool in tools {
            assert_eq!(tool["inputSchema"]["type"], "object");
        }
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let (mut server, tx, _rx) = server();
        let response = to_json(
            server
                .handle_message(&make_request(3, "resources/list", None), &tx)
                .await
                .unwrap(),
        );
        assert_eq!(response["error"]["code"], -32601);
        assert!(response.get("result").is_none());
    }

    #[tokio::test]
    async fn test_parse_error_uses_id_zero() {
        let (mut server, tx, _rx) = server();
        let response = to_json(server.handle_message("{not json", &tx).await.unwrap());
        assert_eq!(response["id"], 0);
        assert_eq!(response["error"]["code"], -32700);
    }

    #[tokio::test]
    async fn test_request_without_method_is_invalid() {
        let (mut server, tx, _rx) = server();
        let line = r#"{"jsonrpc":"2.0","id":5}"#;
        let response = to_json(server.handle_message(line, &tx).await.unwrap());
        assert_eq!(response["id"], 5);
        assert_eq!(response["error"]["code"], -32600);
    }

    #[tokio::test]
    async fn test_request_without_jsonrpc_is_invalid() {
        let (mut server, tx, _rx) = server();
        let line = r#"{"id":6,"method":"ping"}"#;
        let response = to_json(server.handle_message(line, &tx).await.unwrap());
        assert_eq!(response["id"], 6);
        assert_eq!(response["error"]["code"], -32600);
        assert!(response.get("result").is_none());
    }

    #[tokio::test]
    async fn test_batch_array_is_invalid() {
        let (mut server, tx, _rx) = server();
        let response = to_json(server.handle_message("[1,2]", &tx).await.unwrap());
        assert_eq!(response["id"], 0);
        assert_eq!(response["error"]["code"], -32600);
    }

    #[tokio::test]
    async fn test_string_request_id_echoed() {
        let (mut server, tx, _rx) = server();
        let line = r#"{"jsonrpc":"2.0","id":"abc","method":"ping"}"#;
        let response = server.handle_message(line, &tx).await.unwrap();
        assert_eq!(response.id, RequestId::String("abc".to_string()));
    }

    #[tokio::test]
    async fn test_call_tool_without_params() {
        let (mut server, tx, _rx) = server();
        let response = to_json(
            server
                .handle_message(&make_request(4, "tools/call", None), &tx)
                .await
                .unwrap(),
        );
        assert_eq!(response["error"]["code"], -32602);
    }

    #[tokio::test]
    async fn test_call_tool_returns_envelope() {
        let (mut server, tx, _rx) = server();
        let request = make_request(5, "tools/call", Some(json!({
            "name": "list_containers",
            "arguments": {"all": true}
        })));

        let response = to_json(server.handle_message(&request, &tx).await.unwrap());
        let text = response["result"]["content"][0]["text"].as_str().unwrap();
        let envelope: Value = serde_json::from_str(text).unwrap();

        assert_eq!(response["result"]["content"][0]["type"], "text");
        assert_eq!(envelope["success"], true);
        assert_eq!(envelope["count"], 1);
        assert_eq!(envelope["data"][0]["names"][0], "/web");
        assert_eq!(envelope["data"][0]["ports"][0]["type"], "tcp");
    }

    #[tokio::test]
    async fn test_unknown_tool_is_error_envelope() {
        let (mut server, tx, _rx) = server();
        let request = make_request(6, "tools/call", Some(json!({"name": "prune_everything"})));

        let response = to_json(server.handle_message(&request, &tx).await.unwrap());
        assert!(response.get("error").is_none());
        assert_eq!(response["result"]["isError"], true);

        let text = response["result"]["content"][0]["text"].as_str().unwrap();
        let envelope: Value = serde_json::from_str(text).unwrap();
        assert_eq!(envelope["error"], "Unknown tool: prune_everything");
        assert!(envelope["data"].is_null());
    }
}

mod tool_call_tests {
    use super::*;

    #[tokio::test]
    async fn test_list_containers_defaults_to_running() {
        let engine = Arc::new(FakeEngine::with_containers());
        let (is_error, body) = call(&handler_with(engine.clone()), "list_containers", json!({})).await;

        assert!(!is_error);
        assert_eq!(body["count"], 1);
        assert_eq!(engine.calls(), vec!["list_containers all=false"]);
    }

    #[tokio::test]
    async fn test_empty_list_still_counted() {
        let engine = Arc::new(FakeEngine::default());
        let (_, body) = call(&handler_with(engine), "list_images", Value::Null).await;

        assert_eq!(body["success"], true);
        assert_eq!(body["count"], 0);
        assert_eq!(body["data"], json!([]));
    }

    #[tokio::test]
    async fn test_exec_command() {
        let engine = Arc::new(FakeEngine::default());
        let (_, body) = call(
            &handler_with(engine.clone()),
            "exec_command",
            json!({"container_id": "web", "command": "echo hello"}),
        )
        .await;

        assert_eq!(body["data"]["output"], "hello\n");
        assert_eq!(body["data"]["exit_code"], 0);
        assert_eq!(body["data"]["command"], "echo hello");
        assert!(body.get("count").is_none());
        assert_eq!(engine.calls(), vec!["exec web echo hello"]);
    }

    #[tokio::test]
    async fn test_exec_command_requires_container_id() {
        let engine = Arc::new(FakeEngine::default());
        let (is_error, body) = call(&handler_with(engine.clone()), "exec_command", json!({"command": "ls"})).await;

        assert!(is_error);
        assert_eq!(body["error"], "container_id is required");
        assert!(engine.calls().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_argument_types() {
        let engine = Arc::new(FakeEngine::default());
        let (is_error, body) = call(&handler_with(engine), "start_container", json!({"container_id": 12})).await;

        assert!(is_error);
        assert!(body["error"].as_str().unwrap().starts_with("invalid arguments: "));
    }

    #[tokio::test]
    async fn test_search_requires_term() {
        let engine = Arc::new(FakeEngine::default());
        let (is_error, body) = call(&handler_with(engine), "search", json!({"term": ""})).await;

        assert!(is_error);
        assert_eq!(body["error"], "search term is required");
    }

    #[tokio::test]
    async fn test_search_limit_default_and_bounds() {
        let engine = Arc::new(FakeEngine::default());
        let handler = handler_with(engine.clone());

        let (_, body) = call(&handler, "search", json!({"term": "redis"})).await;
        assert_eq!(body["count"], 1);
        assert_eq!(body["data"][0]["stars"], 42);

        let (_, _) = call(&handler, "search", json!({"term": "redis", "limit": 5})).await;
        assert_eq!(engine.calls(), vec!["search redis limit=25", "search redis limit=5"]);

        let (is_error, body) = call(&handler, "search", json!({"term": "redis", "limit": 0})).await;
        assert!(is_error);
        assert!(body["error"].as_str().unwrap().starts_with("invalid limit"));

        let (is_error, _) = call(&handler, "search", json!({"term": "redis", "limit": 101})).await;
        assert!(is_error);
    }

    #[tokio::test]
    async fn test_create_container_builds_spec() {
        let engine = Arc::new(FakeEngine::default());
        let (is_error, body) = call(
            &handler_with(engine.clone()),
            "create_container",
            json!({
                "image": "nginx:latest",
                "name": "web",
                "env": ["MODE=prod"],
                "ports": {"8080:80/tcp": {}, "9443:443": {}, "bogus": {}},
                "restart_policy": "on-failure",
                "auto_remove": true
            }),
        )
        .await;

        assert!(!is_error);
        assert_eq!(body["data"]["id"], "new123");
        assert_eq!(body["data"]["name"], "web");

        let spec = engine.created.lock().unwrap().clone().unwrap();
        assert_eq!(spec.image, "nginx:latest");
        assert_eq!(spec.env, Some(vec!["MODE=prod".to_string()]));
        assert_eq!(spec.ports.len(), 2);
        assert!(spec.ports.iter().any(|p| p.port_key() == "443/tcp" && p.host_port == "9443"));
        assert_eq!(spec.restart_policy, Some(RestartPolicyKind::OnFailure { max_retries: 3 }));
        assert!(spec.auto_remove);
        assert!(spec.command.is_none());
    }

    #[tokio::test]
    async fn test_create_container_requires_name() {
        let engine = Arc::new(FakeEngine::default());
        let (is_error, body) = call(&handler_with(engine), "create_container", json!({"image": "nginx"})).await;

        assert!(is_error);
        assert_eq!(body["error"], "name is required");
    }

    #[tokio::test]
    async fn test_create_container_rejects_unknown_restart_policy() {
        let engine = Arc::new(FakeEngine::default());
        let (is_error, body) = call(
            &handler_with(engine.clone()),
            "create_container",
            json!({"image": "nginx", "name": "web", "restart_policy": "sometimes"}),
        )
        .await;

        assert!(is_error);
        assert!(body["error"].as_str().unwrap().contains("restart_policy"));
        assert!(engine.created.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_container_lifecycle_actions() {
        let engine = Arc::new(FakeEngine::default());
        let handler = handler_with(engine.clone());

        let (_, body) = call(&handler, "start_container", json!({"container_id": "web"})).await;
        assert_eq!(body["data"], json!({"id": "web", "action": "start", "status": "success"}));

        let (_, body) = call(&handler, "stop_container", json!({"container_id": "web"})).await;
        assert_eq!(body["data"]["action"], "stop");

        let (_, body) = call(&handler, "restart_container", json!({"container_id": "web", "timeout": 3})).await;
        assert_eq!(body["data"]["action"], "restart");

        let (_, body) = call(&handler, "remove_container", json!({"container_id": "web", "force": true})).await;
        assert_eq!(body["data"]["action"], "remove");

        assert_eq!(
            engine.calls(),
            vec![
                "start web",
                "stop web t=10",
                "restart web t=3",
                "remove web force=true volumes=false",
            ]
        );
    }

    #[tokio::test]
    async fn test_remove_image() {
        let engine = Arc::new(FakeEngine::default());
        let (_, body) = call(&handler_with(engine), "remove_image", json!({"image": "alpine"})).await;

        assert_eq!(body["data"]["removed"], true);
        assert_eq!(body["data"]["untagged_ids"][0], "alpine:latest");
        assert_eq!(body["data"]["deleted_ids"][0], "sha256:abc");
    }

    #[tokio::test]
    async fn test_logs_tail_variants() {
        let engine = Arc::new(FakeEngine::default());
        let handler = handler_with(engine.clone());

        let (_, body) = call(&handler, "logs", json!({"container_id": "web"})).await;
        assert_eq!(body["data"]["logs"], "line one\nline two\n");
        assert_eq!(body["data"]["container_id"], "web");

        call(&handler, "logs", json!({"container_id": "web", "tail": -1, "timestamps": true})).await;
        call(&handler, "logs", json!({"container_id": "web", "tail": "20", "follow": true})).await;

        assert_eq!(
            engine.calls(),
            vec![
                "logs web follow=false timestamps=false tail=100",
                "logs web follow=false timestamps=true tail=all",
                "logs web follow=true timestamps=false tail=20",
            ]
        );

        let (is_error, _) = call(&handler, "logs", json!({"container_id": "web", "tail": "lots"})).await;
        assert!(is_error);
    }

    #[tokio::test]
    async fn test_inspect() {
        let engine = Arc::new(FakeEngine::default());
        let handler = handler_with(engine);

        let (_, body) = call(&handler, "inspect_container", json!({"container_id": "web"})).await;
        assert_eq!(body["data"]["type"], "container");
        assert_eq!(body["data"]["details"]["State"]["Running"], true);

        let (_, body) = call(&handler, "inspect_image", json!({"image": "alpine:3"})).await;
        assert_eq!(body["data"]["type"], "image");
        assert_eq!(body["data"]["id"], "alpine:3");

        let (is_error, body) = call(&handler, "inspect_image", json!({})).await;
        assert!(is_error);
        assert_eq!(body["error"], "image is required");
    }

    #[tokio::test]
    async fn test_engine_failure_is_error_envelope() {
        let engine = Arc::new(FakeEngine::failing());
        let (is_error, body) = call(&handler_with(engine), "list_containers", json!({})).await;

        assert!(is_error);
        assert_eq!(body["success"], false);
        assert!(body["data"].is_null());
        assert_eq!(body["error"], "failed to list containers: daemon unavailable");
    }
}

mod build_image_tests {
    use super::*;

    #[tokio::test]
    async fn test_build_requires_dockerfile_in_context() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(FakeEngine::default());

        let (is_error, body) = call(
            &handler_with(engine.clone()),
            "build_image",
            json!({"context_path": dir.path().to_str().unwrap(), "tag": "app:1"}),
        )
        .await;

        assert!(is_error);
        assert_eq!(body["error"], "dockerfile Dockerfile not found in context");
        assert!(engine.calls().is_empty());
    }

    #[tokio::test]
    async fn test_build_with_custom_dockerfile() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Dockerfile.dev"), "FROM alpine\n").unwrap();
        let engine = Arc::new(FakeEngine::default());

        let (is_error, body) = call(
            &handler_with(engine.clone()),
            "build_image",
            json!({
                "context_path": dir.path().to_str().unwrap(),
                "dockerfile": "Dockerfile.dev",
                "tag": "app:dev",
                "no_cache": true
            }),
        )
        .await;

        assert!(!is_error);
        assert_eq!(body["data"]["success"], true);
        assert_eq!(body["data"]["image_id"], "3f4e5d6c7b8a");
        assert_eq!(engine.calls(), vec!["build app:dev -f Dockerfile.dev nocache=true pull=false"]);
    }

    #[tokio::test]
    async fn test_build_requires_tag() {
        let engine = Arc::new(FakeEngine::default());
        let (is_error, body) = call(&handler_with(engine), "build_image", json!({"context_path": "/tmp"})).await;

        assert!(is_error);
        assert_eq!(body["error"], "tag is required");
    }
}

mod pull_progress_tests {
    use super::*;

    #[tokio::test]
    async fn test_pull_forwards_progress_notifications() {
        let engine = Arc::new(FakeEngine::default());
        let handler = handler_with(engine);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let reporter = ProgressReporter::new(RequestId::String("pull-1".to_string()), tx);

        let result = handler
            .call_tool("pull_image", json!({"image_name": "alpine:3"}), Some(reporter))
            .await;
        assert!(!result.is_error);

        let mut progress = Vec::new();
        while let Ok(OutgoingMessage::Notification(note)) = rx.try_recv() {
            assert_eq!(note.method, "notifications/progress");
            progress.push(note.params.unwrap());
        }

        assert_eq!(progress.len(), 3);
        assert_eq!(progress[0]["progressToken"], "pull-1");
        assert_eq!(progress[0]["progress"], 1.0);
        assert_eq!(progress[2]["progress"], 3.0);
        assert_eq!(progress[2]["message"], "a1b2: Pull complete");
    }

    #[tokio::test]
    async fn test_pull_through_server_with_progress_token() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut server = McpServer::new(Arc::new(FakeEngine::default()));
        let request = make_request(9, "tools/call", Some(json!({
            "name": "pull_image",
            "arguments": {"image_name": "alpine"},
            "_meta": {"progressToken": 17}
        })));

        let response = to_json(server.handle_message(&request, &tx).await.unwrap());
        let text = response["result"]["content"][0]["text"].as_str().unwrap();
        let envelope: Value = serde_json::from_str(text).unwrap();
        assert_eq!(envelope["data"], json!({"image_name": "alpine", "status": "success", "complete": true}));

        let mut count = 0;
        while let Ok(message) = rx.try_recv() {
            let line = serde_json::to_value(&message).unwrap();
            assert_eq!(line["params"]["progressToken"], 17);
            count += 1;
        }
        assert_eq!(count, 3);
    }

    #[tokio::test]
    async fn test_pull_without_token_sends_nothing() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut server = McpServer::new(Arc::new(FakeEngine::default()));
        let request = make_request(10, "tools/call", Some(json!({
            "name": "pull_image",
            "arguments": {"image_name": "alpine"}
        })));

        server.handle_message(&request, &tx).await.unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_pull_failure() {
        let engine = Arc::new(FakeEngine::failing());
        let (is_error, body) = call(&handler_with(engine), "pull_image", json!({"image_name": "alpine"})).await;

        assert!(is_error);
        assert_eq!(body["error"], "failed to pull image: daemon unavailable");
    }
}
