//! Data models for Dockhand
//!
//! This module defines all request/response types exchanged over the API.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Container Models
// ============================================================================

/// Container as shown in listings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerSummary {
    pub id: String,
    pub names: Vec<String>,
    pub image: String,
    pub state: String,
    pub status: String,
    pub created: Option<DateTime<Utc>>,
}

impl ContainerSummary {
    /// Display name without the leading slash Docker adds
    pub fn display_name(&self) -> &str {
        self.names
            .first()
            .map(|n| n.trim_start_matches('/'))
            .unwrap_or(&self.id)
    }
}

/// Container inspection result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerDetails {
    pub id: String,
    pub name: String,
    pub image: String,
    pub platform: String,
    pub state: String,
    pub running: bool,
    pub created: Option<String>,
}

/// Resource usage of a container, from one stats sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerStats {
    pub container_id: String,
    pub cpu_percent: f64,
    pub memory_usage_bytes: u64,
    pub memory_limit_bytes: u64,
    pub memory_percent: f64,
    pub network_rx_bytes: u64,
    pub network_tx_bytes: u64,
}

/// Port published by a new container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMapping {
    /// Host port; the engine picks one when absent
    #[serde(default)]
    pub host_port: Option<u16>,
    pub container_port: u16,
    #[serde(default = "default_protocol")]
    pub protocol: String,
}

impl PortMapping {
    /// Key used by the engine, e.g. `80/tcp`
    pub fn key(&self) -> String {
        format!("{}/{}", self.container_port, self.protocol)
    }
}

fn default_protocol() -> String {
    "tcp".to_string()
}

/// Bind mount or named volume for a new container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeMount {
    pub source: String,
    pub target: String,
    #[serde(default = "default_mode")]
    pub mode: String,
}

impl VolumeMount {
    /// `source:target:mode` bind string
    pub fn bind(&self) -> String {
        format!("{}:{}:{}", self.source, self.target, self.mode)
    }
}

fn default_mode() -> String {
    "rw".to_string()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RestartPolicy {
    #[default]
    No,
    Always,
    UnlessStopped,
    OnFailure,
}

impl RestartPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RestartPolicy::No => "no",
            RestartPolicy::Always => "always",
            RestartPolicy::UnlessStopped => "unless-stopped",
            RestartPolicy::OnFailure => "on-failure",
        }
    }
}

fn default_true() -> bool {
    true
}

/// Request to create (and by default start) a container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateContainerRequest {
    /// Image reference; the tag defaults to `latest`
    pub image: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_true")]
    pub pull_if_missing: bool,
    #[serde(default = "default_true")]
    pub start: bool,
    #[serde(default)]
    pub ports: Vec<PortMapping>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub volumes: Vec<VolumeMount>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub command: Vec<String>,
    #[serde(default)]
    pub entrypoint: Vec<String>,
    #[serde(default)]
    pub working_dir: Option<String>,
    #[serde(default)]
    pub tty: bool,
    #[serde(default)]
    pub network_mode: Option<String>,
    /// Number of CPUs, fractions allowed
    #[serde(default)]
    pub cpu_limit: Option<f64>,
    #[serde(default)]
    pub memory_limit_mb: Option<u64>,
    #[serde(default)]
    pub restart_policy: RestartPolicy,
    /// Only used with `on-failure`
    #[serde(default)]
    pub max_retry_count: Option<i64>,
}

impl CreateContainerRequest {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            name: None,
            pull_if_missing: true,
            start: true,
            ports: Vec::new(),
            env: BTreeMap::new(),
            volumes: Vec::new(),
            labels: BTreeMap::new(),
            command: Vec::new(),
            entrypoint: Vec::new(),
            working_dir: None,
            tty: false,
            network_mode: None,
            cpu_limit: None,
            memory_limit_mb: None,
            restart_policy: RestartPolicy::No,
            max_retry_count: None,
        }
    }

    /// All problems with the request, empty when it can be sent
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.image.trim().is_empty() {
            errors.push("Image is required".to_string());
        }

        if let Some(name) = self.name.as_deref().filter(|n| !n.is_empty()) {
            if !valid_container_name(name) {
                errors.push(
                    "Invalid container name. Must start with alphanumeric and contain only [a-zA-Z0-9_.-]"
                        .to_string(),
                );
            }
        }

        let mut host_ports = HashSet::new();
        for port in &self.ports {
            if port.container_port == 0 {
                errors.push("Invalid container port: 0".to_string());
            }
            match port.host_port {
                Some(0) => errors.push("Invalid host port: 0".to_string()),
                Some(host) => {
                    let key = format!("{}/{}", host, port.protocol);
                    if !host_ports.insert(key.clone()) {
                        errors.push(format!("Duplicate host port mapping: {}", key));
                    }
                }
                None => {}
            }
        }

        if self.volumes.iter().any(|v| v.target.trim().is_empty()) {
            errors.push("Container path is required for all volume mappings".to_string());
        }

        if self.env.keys().any(|k| k.trim().is_empty()) {
            errors.push("Environment variable key is required".to_string());
        }

        if matches!(self.cpu_limit, Some(cpus) if !(cpus >= 0.0 && cpus.is_finite())) {
            errors.push("CPU limit cannot be negative".to_string());
        }

        errors
    }
}

fn valid_container_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphanumeric())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

/// Result of a container creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateContainerResponse {
    pub id: String,
    #[serde(default)]
    pub warnings: Vec<String>,
    pub started: bool,
    /// Set when the container was created but did not start
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_error: Option<String>,
}

/// Last log lines of a container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerLogs {
    pub container_id: String,
    pub lines: Vec<String>,
}

/// Request to run a one-shot command inside a container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecCommandRequest {
    /// Shell command line, run with `/bin/sh -c`
    pub command: String,

    /// Maximum time to wait for the command, in seconds
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

/// Result of a one-shot command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecCommandResponse {
    pub execution_id: Uuid,
    pub container_id: String,
    pub command: String,
    pub output: String,
    pub duration_ms: u64,
}

// ============================================================================
// Image / Volume / Network Models
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSummary {
    pub id: String,
    pub tags: Vec<String>,
    pub size_bytes: i64,
    pub created: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeSummary {
    pub name: String,
    pub driver: String,
    pub mountpoint: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSummary {
    pub id: String,
    pub name: String,
    pub driver: String,
    pub scope: String,
}

fn default_driver() -> String {
    "bridge".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateNetworkRequest {
    pub name: String,
    #[serde(default = "default_driver")]
    pub driver: String,
    #[serde(default)]
    pub internal: bool,
    #[serde(default)]
    pub attachable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateNetworkResponse {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Container attached to a network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkEndpoint {
    pub container_id: String,
    pub name: String,
    pub ipv4_address: Option<String>,
    pub mac_address: Option<String>,
}

/// Network inspection result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkDetails {
    pub id: String,
    pub name: String,
    pub driver: String,
    pub scope: String,
    pub internal: bool,
    pub attachable: bool,
    pub created: Option<String>,
    pub containers: Vec<NetworkEndpoint>,
    pub labels: BTreeMap<String, String>,
}

// ============================================================================
// System Models
// ============================================================================

/// Dashboard overview of the Docker engine
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemSummary {
    pub server_version: Option<String>,
    pub operating_system: Option<String>,
    pub architecture: Option<String>,
    pub cpus: Option<i64>,
    pub memory_bytes: Option<i64>,
    pub containers: i64,
    pub containers_running: i64,
    pub containers_paused: i64,
    pub containers_stopped: i64,
    pub images: i64,
    pub volumes: usize,
    pub networks: usize,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_seconds: u64,
    pub active_terminals: u64,
    pub docker_version: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

// ============================================================================
// Error Models
// ============================================================================

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(default)]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Convert a Unix timestamp in seconds, as reported by Docker
pub fn timestamp(secs: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0).single()
}
