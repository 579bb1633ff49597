//! Docker Engine API client
//!
//! `ContainerEngine` implementation on top of bollard, talking to the daemon
//! over its unix socket.

use std::collections::HashMap;
use std::pin::pin;
use std::time::Duration;

use async_trait::async_trait;
use bollard::container::{
    Config as ContainerConfig, CreateContainerOptions, InspectContainerOptions,
    ListContainersOptions, LogOutput, LogsOptions, RemoveContainerOptions, RestartContainerOptions,
    StartContainerOptions, StopContainerOptions,
};
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::image::{
    BuildImageOptions, CreateImageOptions, ListImagesOptions, RemoveImageOptions,
    SearchImagesOptions,
};
use bollard::errors::Error as BollardError;
use bollard::models::{
    BuildInfo, ContainerSummary, CreateImageInfo, HostConfig, ImageSearchResponseItem, ImageSummary, PortBinding,
    RestartPolicy, RestartPolicyNameEnum,
};
use bollard::{Docker, API_DEFAULT_VERSION};
use futures_util::{Stream, StreamExt};
use serde_json::Value;
use tokio::time::Instant;

use crate::config::Config;
use crate::docker::engine::{ContainerEngine, ProgressSink};
use crate::docker::types::*;
use crate::docker::utils::{build_context_tar, extract_built_image_id, split_image_reference};
use crate::error::{DockerMcpError, Result};

/// Docker daemon client
pub struct DockerClient {
    docker: Docker,

    /// Read window for followed log streams
    follow_window: Duration,
}

impl DockerClient {
    /// Connect to the daemon socket named in the configuration.
    ///
    /// The API version is negotiated with the daemon when it is reachable;
    /// otherwise the client keeps bollard's default version and requests fail
    /// individually.
    pub async fn connect(config: &Config) -> Result<Self> {
        let docker = Docker::connect_with_unix(
            &config.docker_host(),
            config.engine_timeout_secs,
            API_DEFAULT_VERSION,
        )
        .map_err(|e| DockerMcpError::docker("failed to create Docker client", e))?;

        let docker = match docker.clone().negotiate_version().await {
            Ok(negotiated) => negotiated,
            Err(e) => {
                tracing::warn!(
                    socket = %config.docker_socket.display(),
                    "Docker API version negotiation failed: {}",
                    e
                );
                docker
            }
        };

        Ok(Self {
            docker,
            follow_window: config.follow_window,
        })
    }

    /// Check that the daemon answers
    pub async fn ping(&self) -> Result<()> {
        self.docker
            .ping()
            .await
            .map(|_| ())
            .map_err(|e| DockerMcpError::docker("failed to reach Docker daemon", e))
    }
}

#[async_trait]
impl ContainerEngine for DockerClient {
    async fn list_containers(&self, all: bool) -> Result<Vec<ContainerInfo>> {
        let options = ListContainersOptions::<String> {
            all,
            ..Default::default()
        };

        let containers = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(|e| DockerMcpError::docker("failed to list containers", e))?;

        Ok(containers.into_iter().map(container_info).collect())
    }

    async fn exec_command(&self, container_id: &str, command: &str) -> Result<ExecOutput> {
        let exec = self
            .docker
            .create_exec(
                container_id,
                CreateExecOptions {
                    cmd: Some(vec!["sh", "-c", command]),
                    attach_stdout: Some(true),
                    attach_stderr: Some(true),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| DockerMcpError::docker("failed to create exec", e))?;

        let mut buf = Vec::new();
        match self
            .docker
            .start_exec(&exec.id, None)
            .await
            .map_err(|e| DockerMcpError::docker("failed to attach exec", e))?
        {
            StartExecResults::Attached { mut output, .. } => {
                while let Some(chunk) = output.next().await {
                    let chunk = chunk.map_err(|e| DockerMcpError::docker("failed to read output", e))?;
                    buf.extend_from_slice(&chunk.into_bytes());
                }
            }
            StartExecResults::Detached => {}
        }

        let exit_code = match self.docker.inspect_exec(&exec.id).await {
            Ok(inspect) => inspect.exit_code,
            Err(e) => {
                tracing::debug!("Could not read exit code of exec {}: {}", exec.id, e);
                None
            }
        };

        Ok(ExecOutput {
            output: String::from_utf8_lossy(&buf).into_owned(),
            exit_code,
        })
    }

    async fn pull_image(&self, image_name: &str, on_progress: ProgressSink<'_>) -> Result<()> {
        let (repository, tag) = split_image_reference(image_name);
        let options = CreateImageOptions {
            from_image: repository,
            tag,
            ..Default::default()
        };

        drain_pull(self.docker.create_image(Some(options), None, None), on_progress).await
    }

    async fn list_images(&self, all: bool) -> Result<Vec<ImageInfo>> {
        let options = ListImagesOptions::<String> {
            all,
            ..Default::default()
        };

        let images = self
            .docker
            .list_images(Some(options))
            .await
            .map_err(|e| DockerMcpError::docker("failed to list images", e))?;

        Ok(images.into_iter().map(image_info).collect())
    }

    async fn search_images(&self, term: &str, limit: u64) -> Result<Vec<SearchResult>> {
        let options = SearchImagesOptions {
            term: term.to_string(),
            limit: Some(limit),
            ..Default::default()
        };

        let results = self
            .docker
            .search_images(options)
            .await
            .map_err(|e| DockerMcpError::docker("failed to search images", e))?;

        Ok(results.into_iter().map(search_result).collect())
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<ContainerCreatedResponse> {
        let mut exposed_ports: HashMap<String, HashMap<(), ()>> = HashMap::new();
        let mut port_bindings: HashMap<String, Option<Vec<PortBinding>>> = HashMap::new();
        for mapping in &spec.ports {
            let key = mapping.port_key();
            exposed_ports.insert(key.clone(), HashMap::new());
            port_bindings.insert(
                key,
                Some(vec![PortBinding {
                    host_ip: Some(mapping.host_ip.clone()),
                    host_port: Some(mapping.host_port.clone()),
                }]),
            );
        }

        let host_config = HostConfig {
            port_bindings: (!port_bindings.is_empty()).then_some(port_bindings),
            binds: spec.volumes.clone(),
            network_mode: spec.network_mode.clone(),
            restart_policy: spec.restart_policy.map(restart_policy),
            auto_remove: Some(spec.auto_remove),
            ..Default::default()
        };

        let config = ContainerConfig {
            image: Some(spec.image.clone()),
            cmd: spec.command.clone(),
            env: spec.env.clone(),
            working_dir: spec.working_dir.clone(),
            exposed_ports: (!exposed_ports.is_empty()).then_some(exposed_ports),
            host_config: Some(host_config),
            ..Default::default()
        };

        let options = CreateContainerOptions {
            name: spec.name.clone(),
            platform: None,
        };

        let response = self
            .docker
            .create_container(Some(options), config)
            .await
            .map_err(|e| DockerMcpError::docker("failed to create container", e))?;

        for warning in &response.warnings {
            tracing::warn!(container = %spec.name, "Docker warning: {}", warning);
        }

        Ok(ContainerCreatedResponse {
            id: response.id,
            name: spec.name.clone(),
            warnings: response.warnings,
        })
    }

    async fn start_container(&self, container_id: &str) -> Result<()> {
        self.docker
            .start_container(container_id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| DockerMcpError::docker("failed to start container", e))
    }

    async fn stop_container(&self, container_id: &str, timeout_secs: i64) -> Result<()> {
        self.docker
            .stop_container(container_id, Some(StopContainerOptions { t: timeout_secs }))
            .await
            .map_err(|e| DockerMcpError::docker("failed to stop container", e))
    }

    async fn restart_container(&self, container_id: &str, timeout_secs: i64) -> Result<()> {
        self.docker
            .restart_container(
                container_id,
                Some(RestartContainerOptions {
                    t: timeout_secs as isize,
                }),
            )
            .await
            .map_err(|e| DockerMcpError::docker("failed to restart container", e))
    }

    async fn remove_container(&self, container_id: &str, force: bool, volumes: bool) -> Result<()> {
        self.docker
            .remove_container(
                container_id,
                Some(RemoveContainerOptions {
                    force,
                    v: volumes,
                    ..Default::default()
                }),
            )
            .await
            .map_err(|e| DockerMcpError::docker("failed to remove container", e))
    }

    async fn remove_image(&self, image: &str, force: bool) -> Result<ImageRemovedResponse> {
        let items = self
            .docker
            .remove_image(
                image,
                Some(RemoveImageOptions {
                    force,
                    ..Default::default()
                }),
                None,
            )
            .await
            .map_err(|e| DockerMcpError::docker("failed to remove image", e))?;

        let mut result = ImageRemovedResponse {
            removed: !items.is_empty(),
            image_id: image.to_string(),
            ..Default::default()
        };
        for item in items {
            if let Some(untagged) = item.untagged.filter(|s| !s.is_empty()) {
                result.untagged_ids.push(untagged);
            }
            if let Some(deleted) = item.deleted.filter(|s| !s.is_empty()) {
                result.deleted_ids.push(deleted);
            }
        }

        Ok(result)
    }

    async fn container_logs(&self, container_id: &str, spec: LogsSpec) -> Result<String> {
        let options = LogsOptions::<String> {
            stdout: true,
            stderr: true,
            follow: spec.follow,
            timestamps: spec.timestamps,
            tail: spec.tail.as_query(),
            ..Default::default()
        };

        let deadline = spec.follow.then(|| Instant::now() + self.follow_window);
        tracing::debug!(container = %container_id, follow = spec.follow, "Reading logs");

        collect_logs(self.docker.logs(container_id, Some(options)), deadline).await
    }

    async fn inspect_container(&self, container_id: &str) -> Result<Value> {
        let details = self
            .docker
            .inspect_container(container_id, None::<InspectContainerOptions>)
            .await
            .map_err(|e| DockerMcpError::docker("failed to inspect container", e))?;

        Ok(serde_json::to_value(details)?)
    }

    async fn inspect_image(&self, image: &str) -> Result<Value> {
        let details = self
            .docker
            .inspect_image(image)
            .await
            .map_err(|e| DockerMcpError::docker("failed to inspect image", e))?;

        Ok(serde_json::to_value(details)?)
    }

    async fn build_image(&self, spec: &BuildSpec) -> Result<BuildImageResponse> {
        let context_path = spec.context_path.clone();
        let context = tokio::task::spawn_blocking(move || build_context_tar(&context_path))
            .await
            .map_err(|e| DockerMcpError::engine("failed to create build context", e.to_string()))??;

        tracing::debug!(
            tag = %spec.tag,
            "Sending build context ({} bytes)",
            context.len()
        );

        let options = BuildImageOptions {
            dockerfile: spec.dockerfile.clone(),
            t: spec.tag.clone(),
            nocache: spec.no_cache,
            pull: spec.pull,
            rm: true,
            ..Default::default()
        };

        collect_build(
            self.docker.build_image(options, None, Some(context.into())),
            &spec.tag,
        )
        .await
    }
}

/// Forward pull events to `on_progress` until the stream ends.
///
/// An `error` field in any event aborts the pull.
async fn drain_pull<S>(stream: S, on_progress: ProgressSink<'_>) -> Result<()>
where
    S: Stream<Item = std::result::Result<CreateImageInfo, BollardError>>,
{
    let mut stream = pin!(stream);
    while let Some(item) = stream.next().await {
        let info = item.map_err(|e| DockerMcpError::docker("failed to pull image", e))?;

        if let Some(message) = info.error {
            return Err(DockerMcpError::engine("failed to pull image", message));
        }

        let event = ProgressEvent {
            status: info.status.unwrap_or_default(),
            id: info.id.unwrap_or_default(),
            progress_detail: info
                .progress_detail
                .map(|d| ProgressDetail {
                    current: d.current.unwrap_or(0),
                    total: d.total.unwrap_or(0),
                })
                .unwrap_or_default(),
        };
        on_progress(&event);
    }

    Ok(())
}

/// Concatenate log chunks until the stream ends or `deadline` passes
async fn collect_logs<S>(stream: S, deadline: Option<Instant>) -> Result<String>
where
    S: Stream<Item = std::result::Result<LogOutput, BollardError>>,
{
    let mut stream = pin!(stream);
    let mut buf = Vec::new();
    loop {
        let next = match deadline {
            Some(deadline) => match tokio::time::timeout_at(deadline, stream.next()).await {
                Ok(next) => next,
                Err(_) => {
                    tracing::debug!("Follow window elapsed");
                    break;
                }
            },
            None => stream.next().await,
        };

        match next {
            Some(Ok(chunk)) => buf.extend_from_slice(&chunk.into_bytes()),
            Some(Err(e)) => return Err(DockerMcpError::docker("failed to get container logs", e)),
            None => break,
        }
    }

    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Fold the build stream into a result.
///
/// The image id comes from the `aux` record, or from the `Successfully built`
/// line when the daemon sends none. An `error` event ends the build.
async fn collect_build<S>(stream: S, tag: &str) -> Result<BuildImageResponse>
where
    S: Stream<Item = std::result::Result<BuildInfo, BollardError>>,
{
    let mut stream = pin!(stream);
    let mut output = String::new();
    let mut image_id = None;

    while let Some(item) = stream.next().await {
        let info = item.map_err(|e| DockerMcpError::docker("failed to build image", e))?;

        if let Some(line) = info.stream {
            output.push_str(&line);
        }
        if let Some(id) = info.aux.and_then(|aux| aux.id) {
            image_id = Some(id);
        }
        if let Some(message) = info.error {
            return Ok(BuildImageResponse {
                success: false,
                error: Some(message),
                output,
                ..Default::default()
            });
        }
    }

    match image_id.or_else(|| extract_built_image_id(&output)) {
        Some(id) => Ok(BuildImageResponse {
            success: true,
            image_id: Some(id),
            tags: vec![tag.to_string()],
            error: None,
            output,
        }),
        None => Ok(BuildImageResponse {
            success: false,
            error: Some("build failed, check build output".to_string()),
            output,
            ..Default::default()
        }),
    }
}

fn container_info(c: ContainerSummary) -> ContainerInfo {
    let ports = c
        .ports
        .unwrap_or_default()
        .into_iter()
        .map(|p| Port {
            ip: p.ip.filter(|ip| !ip.is_empty()),
            private_port: p.private_port,
            public_port: p.public_port,
            protocol: p.typ.map(|t| t.to_string()).unwrap_or_default(),
        })
        .collect();

    ContainerInfo {
        id: c.id.unwrap_or_default(),
        names: c.names.unwrap_or_default(),
        image: c.image.unwrap_or_default(),
        status: c.status.unwrap_or_default(),
        state: c.state.unwrap_or_default(),
        created: c.created.unwrap_or_default(),
        ports,
    }
}

fn image_info(img: ImageSummary) -> ImageInfo {
    ImageInfo {
        id: img.id,
        tags: img.repo_tags,
        size: img.size,
        created: img.created,
        containers: img.containers,
    }
}

fn search_result(item: ImageSearchResponseItem) -> SearchResult {
    SearchResult {
        name: item.name.unwrap_or_default(),
        description: item.description.unwrap_or_default(),
        official: item.is_official.unwrap_or(false),
        automated: item.is_automated.unwrap_or(false),
        stars: item.star_count.unwrap_or(0),
    }
}

fn restart_policy(kind: RestartPolicyKind) -> RestartPolicy {
    let (name, maximum_retry_count) = match kind {
        RestartPolicyKind::No => (RestartPolicyNameEnum::NO, None),
        RestartPolicyKind::Always => (RestartPolicyNameEnum::ALWAYS, None),
        RestartPolicyKind::UnlessStopped => (RestartPolicyNameEnum::UNLESS_STOPPED, None),
        RestartPolicyKind::OnFailure { max_retries } => {
            (RestartPolicyNameEnum::ON_FAILURE, Some(max_retries))
        }
    };

    RestartPolicy {
        name: Some(name),
        maximum_retry_count,
    }
}
