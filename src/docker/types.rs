//! Docker tool data types
//!
//! These types are the JSON payloads returned inside the response envelope,
//! plus the request-side shapes handed to the container engine.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Summary of a container as returned by `list_containers`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContainerInfo {
    pub id: String,
    pub names: Vec<String>,
    pub image: String,
    pub status: String,
    pub state: String,
    /// Creation time, seconds since the epoch
    pub created: i64,
    pub ports: Vec<Port>,
}

/// A container port mapping
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Port {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,

    pub private_port: u16,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_port: Option<u16>,

    /// Protocol (`tcp`, `udp`, `sctp`)
    #[serde(rename = "type")]
    pub protocol: String,
}

/// Summary of a local image as returned by `list_images`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageInfo {
    pub id: String,
    pub tags: Vec<String>,
    /// Size in bytes
    pub size: i64,
    pub created: i64,
    /// Number of containers using this image, `-1` when the daemon did not count
    pub containers: i64,
}

/// A registry search hit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchResult {
    pub name: String,
    pub description: String,
    pub official: bool,
    pub automated: bool,
    pub stars: i64,
}

/// Restart policy accepted by `create_container`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartPolicyKind {
    No,
    Always,
    UnlessStopped,
    /// Restart on non-zero exit, up to the given number of times
    OnFailure { max_retries: i64 },
}

/// A host-to-container port binding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortMapping {
    pub host_ip: String,
    pub host_port: String,
    pub container_port: String,
    pub protocol: String,
}

impl PortMapping {
    /// Docker's port key, e.g. `80/tcp`
    pub fn port_key(&self) -> String {
        format!("{}/{}", self.container_port, self.protocol)
    }
}

/// Everything needed to create a container
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub command: Option<Vec<String>>,
    pub env: Option<Vec<String>>,
    pub ports: Vec<PortMapping>,
    pub volumes: Option<Vec<String>>,
    pub working_dir: Option<String>,
    pub network_mode: Option<String>,
    pub restart_policy: Option<RestartPolicyKind>,
    pub auto_remove: bool,
}

/// Options for an image build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSpec {
    pub context_path: std::path::PathBuf,
    pub dockerfile: String,
    pub tag: String,
    pub no_cache: bool,
    pub pull: bool,
}

/// How many log lines to return
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTail {
    All,
    Lines(u64),
}

impl LogTail {
    /// Value for the engine's `tail` query parameter
    pub fn as_query(&self) -> String {
        match self {
            LogTail::All => "all".to_string(),
            LogTail::Lines(n) => n.to_string(),
        }
    }
}

/// Options for a logs request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogsSpec {
    pub follow: bool,
    pub timestamps: bool,
    pub tail: LogTail,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContainerCreatedResponse {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Result of a start/stop/restart/remove action
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContainerActionResponse {
    pub id: String,
    pub action: String,
    pub status: String,
}

impl ContainerActionResponse {
    pub fn success(id: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            action: action.into(),
            status: "success".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ImageRemovedResponse {
    pub removed: bool,
    pub image_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub untagged_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deleted_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogsResponse {
    pub container_id: String,
    pub logs: String,
}

/// Outcome of an image build.
///
/// A failed build is still a completed tool call: `success` here reports the
/// build itself, not the envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct BuildImageResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub output: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommandResponse {
    pub container_id: String,
    pub command: String,
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i64>,
}

/// Raw engine output of an exec, before it is tied to a request
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExecOutput {
    pub output: String,
    pub exit_code: Option<i64>,
}

/// Low-level inspection of a container or image
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InspectResponse {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub details: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PullProgressResponse {
    pub image_name: String,
    pub status: String,
    pub complete: bool,
}

/// One decoded event of an image pull stream
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ProgressEvent {
    #[serde(default)]
    pub status: String,
    #[serde(default, rename = "progressDetail")]
    pub progress_detail: ProgressDetail,
    #[serde(default)]
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ProgressDetail {
    #[serde(default)]
    pub current: i64,
    #[serde(default)]
    pub total: i64,
}

impl ProgressEvent {
    /// Human-readable line, e.g. `a1b2c3: Downloading`
    pub fn describe(&self) -> String {
        if self.id.is_empty() {
            self.status.clone()
        } else {
            format!("{}: {}", self.id, self.status)
        }
    }
}
