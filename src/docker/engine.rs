//! Container engine abstraction
//!
//! The tool handlers talk to the engine only through this trait, so they can
//! run against the Docker daemon or an in-memory stand-in.

use async_trait::async_trait;
use serde_json::Value;

use crate::docker::types::*;
use crate::error::Result;

/// Receives decoded image pull events as they arrive
pub type ProgressSink<'a> = &'a (dyn Fn(&ProgressEvent) + Send + Sync);

#[async_trait]
pub trait ContainerEngine: Send + Sync {
    async fn list_containers(&self, all: bool) -> Result<Vec<ContainerInfo>>;

    /// Run `sh -c <command>` in the container and collect stdout and stderr
    async fn exec_command(&self, container_id: &str, command: &str) -> Result<ExecOutput>;

    /// Pull an image, handing every progress event to `on_progress`
    async fn pull_image(&self, image_name: &str, on_progress: ProgressSink<'_>) -> Result<()>;

    async fn list_images(&self, all: bool) -> Result<Vec<ImageInfo>>;

    async fn search_images(&self, term: &str, limit: u64) -> Result<Vec<SearchResult>>;

    async fn create_container(&self, spec: &ContainerSpec) -> Result<ContainerCreatedResponse>;

    async fn start_container(&self, container_id: &str) -> Result<()>;

    async fn stop_container(&self, container_id: &str, timeout_secs: i64) -> Result<()>;

    async fn restart_container(&self, container_id: &str, timeout_secs: i64) -> Result<()>;

    async fn remove_container(&self, container_id: &str, force: bool, volumes: bool) -> Result<()>;

    async fn remove_image(&self, image: &str, force: bool) -> Result<ImageRemovedResponse>;

    async fn container_logs(&self, container_id: &str, spec: LogsSpec) -> Result<String>;

    async fn inspect_container(&self, container_id: &str) -> Result<Value>;

    async fn inspect_image(&self, image: &str) -> Result<Value>;

    async fn build_image(&self, spec: &BuildSpec) -> Result<BuildImageResponse>;
}
