//! Docker argument utilities
//!
//! Parsing of port keys, restart policies and log tails, plus build-context
//! packaging and build-output scanning.

use std::path::Path;

use serde_json::{Map, Value};

use crate::config::defaults;
use crate::docker::types::{LogTail, PortMapping, RestartPolicyKind};
use crate::error::{DockerMcpError, Result, ValidationError};

/// Host address bound for every published port
pub const PUBLISH_HOST_IP: &str = "0.0.0.0";

/// Marker the classic builder prints after a successful build
const BUILT_MARKER: &str = "Successfully built ";

/// Parse one `host_port:container_port[/protocol]` key
///
/// Returns `None` for keys that do not have exactly one `:` or whose
/// container side is empty.
pub fn parse_port_key(key: &str) -> Option<PortMapping> {
    let (host_port, container) = key.split_once(':')?;
    if container.contains(':') {
        return None;
    }

    let (container_port, protocol) = match container.split_once('/') {
        Some((port, proto)) => (port, proto),
        None => (container, "tcp"),
    };

    if container_port.is_empty() || protocol.is_empty() {
        return None;
    }
    if container_port.parse::<u16>().is_err() {
        return None;
    }

    Some(PortMapping {
        host_ip: PUBLISH_HOST_IP.to_string(),
        host_port: host_port.to_string(),
        container_port: container_port.to_string(),
        protocol: protocol.to_lowercase(),
    })
}

/// Parse the `ports` object of `create_container`. Malformed keys are skipped.
pub fn parse_port_map(ports: &Map<String, Value>) -> Vec<PortMapping> {
    ports
        .keys()
        .filter_map(|key| {
            let mapping = parse_port_key(key);
            if mapping.is_none() {
                tracing::debug!("Skipping malformed port mapping: {}", key);
            }
            mapping
        })
        .collect()
}

/// Parse a restart policy name
pub fn parse_restart_policy(name: &str) -> std::result::Result<RestartPolicyKind, ValidationError> {
    match name {
        "no" => Ok(RestartPolicyKind::No),
        "always" => Ok(RestartPolicyKind::Always),
        "unless-stopped" => Ok(RestartPolicyKind::UnlessStopped),
        "on-failure" => Ok(RestartPolicyKind::OnFailure {
            max_retries: defaults::ON_FAILURE_MAX_RETRIES,
        }),
        other => Err(ValidationError::invalid(
            "restart_policy",
            format!("{} (expected no, always, on-failure or unless-stopped)", other),
        )),
    }
}

/// Parse the `tail` argument of `logs`
///
/// Numbers: negative means all lines. Strings: `all` or a line count.
/// Missing or null falls back to the default line count.
pub fn parse_tail(value: Option<&Value>) -> std::result::Result<LogTail, ValidationError> {
    let default = LogTail::Lines(defaults::LOG_TAIL_LINES);

    match value {
        None | Some(Value::Null) => Ok(default),
        Some(Value::Number(n)) => match n.as_f64() {
            Some(f) if f < 0.0 => Ok(LogTail::All),
            Some(f) => Ok(LogTail::Lines(f as u64)),
            None => Ok(default),
        },
        Some(Value::String(s)) => {
            let s = s.trim();
            if s.is_empty() {
                Ok(default)
            } else if s.eq_ignore_ascii_case("all") {
                Ok(LogTail::All)
            } else {
                s.parse::<i64>()
                    .map(|n| if n < 0 { LogTail::All } else { LogTail::Lines(n as u64) })
                    .map_err(|_| ValidationError::invalid("tail", format!("{} is not a line count", s)))
            }
        }
        Some(other) => Err(ValidationError::invalid(
            "tail",
            format!("expected a number or \"all\", got {}", other),
        )),
    }
}

/// Split an image reference into repository and tag for a pull.
///
/// The engine pulls every tag when the tag is empty, so a reference without a
/// tag or digest gets `latest`. Digest references keep the digest in the
/// repository part and use an empty tag.
pub fn split_image_reference(reference: &str) -> (String, String) {
    if reference.contains('@') {
        return (reference.to_string(), String::new());
    }

    let name_start = reference.rfind('/').map(|i| i + 1).unwrap_or(0);
    match reference[name_start..].rfind(':') {
        Some(i) => {
            let split = name_start + i;
            (reference[..split].to_string(), reference[split + 1..].to_string())
        }
        None => (reference.to_string(), "latest".to_string()),
    }
}

/// Find the image id in classic builder output (`Successfully built <id>`)
pub fn extract_built_image_id(output: &str) -> Option<String> {
    let start = output.find(BUILT_MARKER)? + BUILT_MARKER.len();
    let id = output[start..]
        .split_whitespace()
        .next()
        .unwrap_or("")
        .trim();

    if id.is_empty() {
        None
    } else {
        Some(id.to_string())
    }
}

/// Verify the Dockerfile exists inside the build context
pub fn ensure_dockerfile(context_path: &Path, dockerfile: &str) -> std::result::Result<(), ValidationError> {
    if !context_path.join(dockerfile).is_file() {
        return Err(ValidationError::DockerfileNotFound {
            name: dockerfile.to_string(),
        });
    }
    Ok(())
}

/// Pack a build context directory into an uncompressed tar archive
pub fn build_context_tar(context_path: &Path) -> Result<Vec<u8>> {
    let mut builder = tar::Builder::new(Vec::new());
    builder.follow_symlinks(false);

    builder
        .append_dir_all(".", context_path)
        .map_err(|e| DockerMcpError::engine("failed to create build context", e.to_string()))?;

    builder
        .into_inner()
        .map_err(|e| DockerMcpError::engine("failed to create build context", e.to_string()))
}
