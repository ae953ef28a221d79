//! Docker Engine implementation of the runtime gateway

use std::collections::HashMap;
use std::io;
use std::time::Duration;

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, ListContainersOptions, LogsOptions,
    RemoveContainerOptions, RestartContainerOptions, StartContainerOptions, StatsOptions,
    StopContainerOptions,
};
use bollard::errors::Error as DockerError;
use bollard::exec::{CreateExecOptions, ResizeExecOptions, StartExecOptions, StartExecResults};
use bollard::image::{CreateImageOptions, ListImagesOptions, RemoveImageOptions};
use bollard::models::{HostConfig, PortBinding, RestartPolicy, RestartPolicyNameEnum};
use bollard::network::{CreateNetworkOptions, InspectNetworkOptions, ListNetworksOptions};
use bollard::volume::{ListVolumesOptions, RemoveVolumeOptions};
use bollard::{Docker, API_DEFAULT_VERSION};
use futures::StreamExt;
use tokio_util::io::StreamReader;
use tracing::{debug, info, warn};

use crate::metrics;
use crate::models::{
    timestamp, ContainerDetails, ContainerStats, ContainerSummary, CreateContainerRequest,
    CreateContainerResponse, CreateNetworkRequest, CreateNetworkResponse, ImageSummary,
    NetworkDetails, NetworkEndpoint, NetworkSummary, SystemSummary, VolumeSummary,
};

use super::{ExecSpec, ExecStream, GatewayError, RuntimeGateway, StatsSample};

/// Docker Engine API client
#[derive(Clone)]
pub struct DockerGateway {
    docker: Docker,
}

/// Map a bollard error onto the gateway taxonomy
fn map_docker_error(err: DockerError) -> GatewayError {
    match err {
        DockerError::DockerResponseServerError {
            status_code: 404,
            message,
        } => GatewayError::NotFound(message),
        DockerError::DockerResponseServerError {
            status_code,
            message,
        } => GatewayError::Api {
            status: status_code,
            message,
        },
        DockerError::RequestTimeoutError => GatewayError::Timeout,
        other => GatewayError::Unavailable(other.to_string()),
    }
}

/// Map the error and count the call
fn track<T>(operation: &'static str, result: Result<T, DockerError>) -> Result<T, GatewayError> {
    metrics::record_docker_operation(operation, result.is_ok());
    result.map_err(|e| {
        debug!(operation, error = %e, "Docker call failed");
        map_docker_error(e)
    })
}

/// Start options for an exec whose stdio stays attached
fn attached_start_options() -> StartExecOptions {
    StartExecOptions {
        detach: false,
        output_capacity: None,
    }
}

/// Split an image reference into repository and tag, defaulting to `latest`.
/// Digest references keep their digest and get no tag.
fn split_image(image: &str) -> (&str, Option<&str>) {
    let image = image.trim();
    if image.contains('@') {
        return (image, None);
    }
    match image.rfind(':') {
        // a colon before the last slash belongs to a registry port
        Some(colon) if !image[colon..].contains('/') => (&image[..colon], Some(&image[colon + 1..])),
        _ => (image, Some("latest")),
    }
}

fn image_reference(repository: &str, tag: Option<&str>) -> String {
    match tag {
        Some(tag) => format!("{}:{}", repository, tag),
        None => repository.to_string(),
    }
}

/// Engine container config for a creation request
fn container_config(request: &CreateContainerRequest, image: String) -> Config<String> {
    let non_empty = |values: &[String]| (!values.is_empty()).then(|| values.to_vec());

    let exposed_ports: HashMap<String, HashMap<(), ()>> = request
        .ports
        .iter()
        .map(|p| (p.key(), HashMap::new()))
        .collect();

    let mut port_bindings = HashMap::new();
    for port in &request.ports {
        port_bindings.insert(
            port.key(),
            Some(vec![PortBinding {
                host_ip: Some(String::new()),
                host_port: Some(port.host_port.map(|p| p.to_string()).unwrap_or_default()),
            }]),
        );
    }

    let binds: Vec<String> = request
        .volumes
        .iter()
        .filter(|v| !v.target.trim().is_empty())
        .map(|v| v.bind())
        .collect();

    let restart_name = match request.restart_policy.as_str().parse::<RestartPolicyNameEnum>() {
        Ok(name) => name,
        Err(_) => RestartPolicyNameEnum::NO,
    };
    let on_failure = restart_name == RestartPolicyNameEnum::ON_FAILURE;

    let host_config = HostConfig {
        port_bindings: (!port_bindings.is_empty()).then_some(port_bindings),
        binds: (!binds.is_empty()).then_some(binds),
        nano_cpus: request
            .cpu_limit
            .filter(|cpus| *cpus > 0.0)
            .map(|cpus| (cpus * 1_000_000_000.0) as i64),
        memory: request
            .memory_limit_mb
            .filter(|mb| *mb > 0)
            .map(|mb| i64::try_from(mb.saturating_mul(1024 * 1024)).unwrap_or(i64::MAX)),
        restart_policy: Some(RestartPolicy {
            name: Some(restart_name),
            maximum_retry_count: Some(if on_failure {
                request.max_retry_count.unwrap_or(0)
            } else {
                0
            }),
        }),
        network_mode: request.network_mode.clone().filter(|m| !m.trim().is_empty()),
        ..Default::default()
    };

    Config {
        image: Some(image),
        tty: Some(request.tty),
        attach_stdout: Some(true),
        attach_stderr: Some(true),
        env: (!request.env.is_empty())
            .then(|| request.env.iter().map(|(k, v)| format!("{}={}", k, v)).collect()),
        labels: (!request.labels.is_empty())
            .then(|| request.labels.clone().into_iter().collect()),
        exposed_ports: (!exposed_ports.is_empty()).then_some(exposed_ports),
        cmd: non_empty(request.command.as_slice()),
        entrypoint: non_empty(request.entrypoint.as_slice()),
        working_dir: request.working_dir.clone().filter(|d| !d.trim().is_empty()),
        host_config: Some(host_config),
        ..Default::default()
    }
}

impl DockerGateway {
    /// Create a client for the given engine address.
    ///
    /// `unix://` sockets and `tcp://`/`http://` endpoints are supported; with no
    /// address the platform defaults are used. No request is made here.
    pub fn connect(host: Option<&str>, timeout: Duration) -> Result<Self, GatewayError> {
        let secs = timeout.as_secs().max(1);
        let docker = match host {
            #[cfg(unix)]
            Some(host) if host.starts_with("unix://") => {
                Docker::connect_with_unix(host, secs, API_DEFAULT_VERSION)
            }
            Some(host) if host.starts_with("tcp://") || host.starts_with("http://") => {
                Docker::connect_with_http(host, secs, API_DEFAULT_VERSION)
            }
            Some(host) => {
                return Err(GatewayError::Unavailable(format!(
                    "Unsupported Docker host: {}",
                    host
                )))
            }
            None => Docker::connect_with_local_defaults().map(|d| d.with_timeout(timeout)),
        }
        .map_err(map_docker_error)?;

        info!(host = host.unwrap_or("local defaults"), "Docker client configured");
        Ok(Self { docker })
    }

    pub fn from_client(docker: Docker) -> Self {
        Self { docker }
    }

    /// Engine version, if the engine answers
    pub async fn engine_version(&self) -> Result<String, GatewayError> {
        let version = track("version", self.docker.version().await)?;
        Ok(version.version.unwrap_or_else(|| "unknown".to_string()))
    }

    // ------------------------------------------------------------------
    // System
    // ------------------------------------------------------------------

    pub async fn system_summary(&self) -> Result<SystemSummary, GatewayError> {
        let info = track("info", self.docker.info().await)?;
        let volumes = self.list_volumes().await?;
        let networks = self.list_networks().await?;

        Ok(SystemSummary {
            server_version: info.server_version,
            operating_system: info.operating_system,
            architecture: info.architecture,
            cpus: info.ncpu,
            memory_bytes: info.mem_total,
            containers: info.containers.unwrap_or(0),
            containers_running: info.containers_running.unwrap_or(0),
            containers_paused: info.containers_paused.unwrap_or(0),
            containers_stopped: info.containers_stopped.unwrap_or(0),
            images: info.images.unwrap_or(0),
            volumes: volumes.len(),
            networks: networks.len(),
        })
    }

    // ------------------------------------------------------------------
    // Containers
    // ------------------------------------------------------------------

    pub async fn list_containers(&self, all: bool) -> Result<Vec<ContainerSummary>, GatewayError> {
        let options = ListContainersOptions::<String> {
            all,
            ..Default::default()
        };
        let containers = track("list_containers", self.docker.list_containers(Some(options)).await)?;

        Ok(containers
            .into_iter()
            .map(|c| ContainerSummary {
                id: c.id.unwrap_or_default(),
                names: c.names.unwrap_or_default(),
                image: c.image.unwrap_or_default(),
                state: c.state.unwrap_or_default(),
                status: c.status.unwrap_or_default(),
                created: c.created.and_then(timestamp),
            })
            .collect())
    }

    pub async fn inspect_container(&self, id: &str) -> Result<ContainerDetails, GatewayError> {
        let inspect = track(
            "inspect_container",
            self.docker
                .inspect_container(id, None::<InspectContainerOptions>)
                .await,
        )?;

        let state = inspect.state.as_ref();
        Ok(ContainerDetails {
            id: inspect.id.clone().unwrap_or_else(|| id.to_string()),
            name: inspect
                .name
                .as_deref()
                .map(|n| n.trim_start_matches('/').to_string())
                .unwrap_or_default(),
            image: inspect
                .config
                .as_ref()
                .and_then(|c| c.image.clone())
                .or_else(|| inspect.image.clone())
                .unwrap_or_default(),
            platform: inspect.platform.clone().unwrap_or_else(|| "linux".to_string()),
            state: state
                .and_then(|s| s.status.as_ref())
                .map(|s| s.to_string())
                .unwrap_or_default(),
            running: state.and_then(|s| s.running).unwrap_or(false),
            created: inspect.created.clone(),
        })
    }

    /// Full engine inspect document, as JSON
    pub async fn inspect_container_raw(&self, id: &str) -> Result<serde_json::Value, GatewayError> {
        let inspect = track(
            "inspect_container",
            self.docker
                .inspect_container(id, None::<InspectContainerOptions>)
                .await,
        )?;
        serde_json::to_value(inspect).map_err(|e| GatewayError::Decode(e.to_string()))
    }

    /// One stats sample, without streaming
    pub async fn container_stats(&self, id: &str) -> Result<ContainerStats, GatewayError> {
        let options = StatsOptions {
            stream: false,
            one_shot: false,
        };
        let mut stream = self.docker.stats(id, Some(options));
        match stream.next().await {
            Some(sample) => {
                let sample = track("container_stats", sample)?;
                Ok(StatsSample::from(&sample).summarize(id))
            }
            None => Err(GatewayError::Decode(format!("no stats returned for {}", id))),
        }
    }

    /// Pull `repository:tag` unless it is already present
    async fn ensure_image(&self, repository: &str, tag: Option<&str>) -> Result<(), GatewayError> {
        let reference = image_reference(repository, tag);
        match self.docker.inspect_image(&reference).await {
            Ok(_) => return Ok(()),
            Err(e) => match map_docker_error(e) {
                GatewayError::NotFound(_) => {}
                other => return Err(other),
            },
        }

        info!(image = %reference, "Pulling image");
        let options = CreateImageOptions {
            from_image: repository,
            tag: tag.unwrap_or_default(),
            ..Default::default()
        };
        let mut pull = self.docker.create_image(Some(options), None, None);
        while let Some(progress) = pull.next().await {
            let progress = track("pull_image", progress)?;
            if let Some(status) = progress.status {
                debug!(image = %reference, status = %status, progress = ?progress.progress, "Pull progress");
            }
        }
        Ok(())
    }

    /// Create a container, pulling its image first when asked, then start it
    /// when asked. A failed start still returns the new container ID.
    pub async fn create_container(
        &self,
        request: &CreateContainerRequest,
    ) -> Result<CreateContainerResponse, GatewayError> {
        let (repository, tag) = split_image(&request.image);
        if request.pull_if_missing {
            self.ensure_image(repository, tag).await?;
        }

        let config = container_config(request, image_reference(repository, tag));
        let options = request
            .name
            .as_deref()
            .filter(|n| !n.is_empty())
            .map(|name| CreateContainerOptions {
                name: name.to_string(),
                platform: None,
            });
        let created = track(
            "create_container",
            self.docker.create_container(options, config).await,
        )?;
        info!(container_id = %created.id, image = %request.image, "Container created");

        let mut response = CreateContainerResponse {
            id: created.id,
            warnings: created.warnings,
            started: false,
            start_error: None,
        };
        if request.start {
            match self.start_container(&response.id).await {
                Ok(()) => response.started = true,
                Err(e) => {
                    warn!(container_id = %response.id, error = %e, "Container created but failed to start");
                    response.start_error = Some(e.to_string());
                }
            }
        }
        Ok(response)
    }

    pub async fn start_container(&self, id: &str) -> Result<(), GatewayError> {
        track(
            "start_container",
            self.docker
                .start_container(id, None::<StartContainerOptions<String>>)
                .await,
        )
    }

    pub async fn stop_container(&self, id: &str) -> Result<(), GatewayError> {
        track(
            "stop_container",
            self.docker.stop_container(id, None::<StopContainerOptions>).await,
        )
    }

    pub async fn restart_container(&self, id: &str) -> Result<(), GatewayError> {
        track(
            "restart_container",
            self.docker
                .restart_container(id, None::<RestartContainerOptions>)
                .await,
        )
    }

    pub async fn pause_container(&self, id: &str) -> Result<(), GatewayError> {
        track("pause_container", self.docker.pause_container(id).await)
    }

    pub async fn unpause_container(&self, id: &str) -> Result<(), GatewayError> {
        track("unpause_container", self.docker.unpause_container(id).await)
    }

    pub async fn remove_container(&self, id: &str, force: bool) -> Result<(), GatewayError> {
        let options = RemoveContainerOptions {
            force,
            ..Default::default()
        };
        track(
            "remove_container",
            self.docker.remove_container(id, Some(options)).await,
        )
    }

    /// Last `tail` lines of stdout and stderr
    pub async fn container_logs(&self, id: &str, tail: usize) -> Result<Vec<String>, GatewayError> {
        let options = LogsOptions::<String> {
            stdout: true,
            stderr: true,
            tail: tail.to_string(),
            ..Default::default()
        };

        let mut stream = self.docker.logs(id, Some(options));
        let mut text = String::new();
        while let Some(frame) = stream.next().await {
            let frame = track("container_logs", frame)?;
            text.push_str(&String::from_utf8_lossy(&frame.into_bytes()));
        }

        Ok(text.lines().map(str::to_string).collect())
    }

    // ------------------------------------------------------------------
    // Images, volumes, networks
    // ------------------------------------------------------------------

    pub async fn list_images(&self) -> Result<Vec<ImageSummary>, GatewayError> {
        let options = ListImagesOptions::<String> {
            all: false,
            ..Default::default()
        };
        let images = track("list_images", self.docker.list_images(Some(options)).await)?;

        Ok(images
            .into_iter()
            .map(|i| ImageSummary {
                id: i.id,
                tags: i.repo_tags,
                size_bytes: i.size,
                created: timestamp(i.created),
            })
            .collect())
    }

    pub async fn remove_image(&self, id: &str, force: bool) -> Result<(), GatewayError> {
        let options = RemoveImageOptions {
            force,
            noprune: false,
        };
        track(
            "remove_image",
            self.docker.remove_image(id, Some(options), None).await,
        )
        .map(|_| ())
    }

    pub async fn list_volumes(&self) -> Result<Vec<VolumeSummary>, GatewayError> {
        let response = track(
            "list_volumes",
            self.docker
                .list_volumes(None::<ListVolumesOptions<String>>)
                .await,
        )?;

        Ok(response
            .volumes
            .unwrap_or_default()
            .into_iter()
            .map(|v| VolumeSummary {
                name: v.name,
                driver: v.driver,
                mountpoint: v.mountpoint,
            })
            .collect())
    }

    pub async fn remove_volume(&self, name: &str) -> Result<(), GatewayError> {
        track(
            "remove_volume",
            self.docker
                .remove_volume(name, None::<RemoveVolumeOptions>)
                .await,
        )
    }

    pub async fn list_networks(&self) -> Result<Vec<NetworkSummary>, GatewayError> {
        let networks = track(
            "list_networks",
            self.docker
                .list_networks(None::<ListNetworksOptions<String>>)
                .await,
        )?;

        Ok(networks
            .into_iter()
            .map(|n| NetworkSummary {
                id: n.id.unwrap_or_default(),
                name: n.name.unwrap_or_default(),
                driver: n.driver.unwrap_or_default(),
                scope: n.scope.unwrap_or_default(),
            })
            .collect())
    }

    pub async fn create_network(&self, request: &CreateNetworkRequest) -> Result<CreateNetworkResponse, GatewayError> {
        let options = CreateNetworkOptions {
            name: request.name.as_str(),
            driver: request.driver.as_str(),
            check_duplicate: true,
            internal: request.internal,
            attachable: request.attachable,
            ..Default::default()
        };
        let created = track("create_network", self.docker.create_network(options).await)?;
        let id = created
            .id
            .ok_or_else(|| GatewayError::Decode("network created without an ID".to_string()))?;
        info!(network_id = %id, name = %request.name, "Network created");

        Ok(CreateNetworkResponse {
            id,
            warning: created.warning.filter(|w| !w.is_empty()),
        })
    }

    pub async fn inspect_network(&self, id: &str) -> Result<NetworkDetails, GatewayError> {
        let network = track(
            "inspect_network",
            self.docker
                .inspect_network(id, None::<InspectNetworkOptions<String>>)
                .await,
        )?;

        let mut containers: Vec<NetworkEndpoint> = network
            .containers
            .unwrap_or_default()
            .into_iter()
            .map(|(container_id, c)| NetworkEndpoint {
                container_id,
                name: c.name.unwrap_or_default(),
                ipv4_address: c.ipv4_address.filter(|a| !a.is_empty()),
                mac_address: c.mac_address.filter(|a| !a.is_empty()),
            })
            .collect();
        containers.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(NetworkDetails {
            id: network.id.unwrap_or_else(|| id.to_string()),
            name: network.name.unwrap_or_default(),
            driver: network.driver.unwrap_or_default(),
            scope: network.scope.unwrap_or_default(),
            internal: network.internal.unwrap_or(false),
            attachable: network.attachable.unwrap_or(false),
            created: network.created,
            containers,
            labels: network.labels.unwrap_or_default().into_iter().collect(),
        })
    }

    pub async fn remove_network(&self, id: &str) -> Result<(), GatewayError> {
        track("remove_network", self.docker.remove_network(id).await)
    }
}

#[async_trait]
impl RuntimeGateway for DockerGateway {
    async fn create_exec(&self, container_id: &str, spec: &ExecSpec) -> Result<String, GatewayError> {
        let options = CreateExecOptions {
            attach_stdin: Some(true),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            tty: Some(spec.tty),
            cmd: Some(spec.command.clone()),
            working_dir: spec.working_dir.clone(),
            user: spec.user.clone(),
            ..Default::default()
        };

        let created = track("create_exec", self.docker.create_exec(container_id, options).await)?;
        Ok(created.id)
    }

    /// The engine applies the tty mode chosen at exec creation, so `_tty`
    /// is not sent again on start.
    async fn attach_exec(&self, exec_id: &str, _tty: bool) -> Result<ExecStream, GatewayError> {
        let options = attached_start_options();
        match track("start_exec", self.docker.start_exec(exec_id, Some(options)).await)? {
            StartExecResults::Attached { output, input } => {
                let frames = output.map(|frame| {
                    frame
                        .map(|f| f.into_bytes())
                        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
                });
                Ok(ExecStream::new(StreamReader::new(frames), input))
            }
            StartExecResults::Detached => {
                warn!(exec_id, "Exec instance started detached");
                Err(GatewayError::Unsupported(
                    "exec instance started detached".to_string(),
                ))
            }
        }
    }

    async fn inspect_platform(&self, container_id: &str) -> Result<String, GatewayError> {
        let inspect = track(
            "inspect_container",
            self.docker
                .inspect_container(container_id, None::<InspectContainerOptions>)
                .await,
        )?;
        Ok(inspect.platform.unwrap_or_else(|| "linux".to_string()))
    }

    async fn resize_exec(&self, exec_id: &str, rows: u16, cols: u16) -> Result<(), GatewayError> {
        let options = ResizeExecOptions {
            height: rows,
            width: cols,
        };
        track("resize_exec", self.docker.resize_exec(exec_id, options).await)
    }
}
