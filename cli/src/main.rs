//! Dockhand CLI - Command-line interface for the Dockhand server
//!
//! Lists and manages containers, images, volumes and networks, and runs
//! one-shot commands inside containers.

use std::collections::BTreeMap;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Dockhand CLI - Manage a Docker engine through the Dockhand API
#[derive(Parser)]
#[command(name = "dockhand")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "CLI for the Dockhand Docker administration service", long_about = None)]
struct Cli {
    /// Dockhand API URL
    #[arg(short, long, default_value = "http://127.0.0.1:8080")]
    api_url: String,

    /// Output format for listings
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Get server health status
    Health,

    /// Show Docker engine overview
    System,

    /// List containers
    Ps {
        /// Include stopped containers
        #[arg(short, long)]
        all: bool,
    },

    /// Show container details
    Inspect {
        id: String,

        /// Print the full engine inspect document
        #[arg(long)]
        raw: bool,
    },

    /// Show CPU, memory and network usage of a container
    Stats { id: String },

    /// Create a container, pulling its image when missing, and start it
    Run {
        image: String,

        /// Container name
        #[arg(long)]
        name: Option<String>,

        /// Publish a port: [HOST:]CONTAINER[/PROTO]
        #[arg(short, long = "publish")]
        publish: Vec<String>,

        /// Environment variable: KEY=VALUE
        #[arg(short, long = "env")]
        env: Vec<String>,

        /// Mount: SOURCE:TARGET[:MODE]
        #[arg(short, long = "volume")]
        volume: Vec<String>,

        /// Restart policy
        #[arg(long, value_enum, default_value_t = RestartArg::No)]
        restart: RestartArg,

        /// Retries for the on-failure restart policy
        #[arg(long)]
        max_retries: Option<i64>,

        /// CPU limit, fractions allowed
        #[arg(long)]
        cpus: Option<f64>,

        /// Memory limit in MB
        #[arg(long)]
        memory: Option<u64>,

        /// Network mode
        #[arg(long)]
        network: Option<String>,

        /// Working directory inside the container
        #[arg(short, long)]
        workdir: Option<String>,

        /// Allocate a pseudo-terminal
        #[arg(short, long)]
        tty: bool,

        /// Fail instead of pulling a missing image
        #[arg(long)]
        no_pull: bool,

        /// Create without starting
        #[arg(long)]
        no_start: bool,

        /// Command and arguments
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },

    /// Start a container
    Start { id: String },

    /// Stop a container
    Stop { id: String },

    /// Restart a container
    Restart { id: String },

    /// Pause a container
    Pause { id: String },

    /// Unpause a container
    Unpause { id: String },

    /// Remove a container
    Rm {
        id: String,

        /// Remove even if running
        #[arg(short, long)]
        force: bool,
    },

    /// Show the last log lines of a container
    Logs {
        id: String,

        /// Number of lines
        #[arg(short, long, default_value = "100")]
        tail: usize,
    },

    /// Run a command inside a container
    Exec {
        id: String,

        /// Command line, run with /bin/sh -c
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,

        /// Maximum time to wait in seconds
        #[arg(long, default_value = "60")]
        timeout: u64,
    },

    /// List images
    Images,

    /// Remove an image
    Rmi {
        id: String,

        /// Remove even if used by stopped containers
        #[arg(short, long)]
        force: bool,
    },

    /// List volumes
    Volumes,

    /// Remove a volume
    Rmv { name: String },

    /// List networks
    Networks,

    /// Remove a network
    Rmn { id: String },

    /// Create a network
    NetworkCreate {
        name: String,

        /// Network driver
        #[arg(short, long, default_value = "bridge")]
        driver: String,

        /// Restrict external access
        #[arg(long)]
        internal: bool,

        /// Allow manual container attachment
        #[arg(long)]
        attachable: bool,
    },

    /// Show network details and attached containers
    NetworkInspect { id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "kebab-case")]
enum RestartArg {
    No,
    Always,
    UnlessStopped,
    OnFailure,
}

/// Error body returned by the server
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
    message: String,
}

#[derive(Debug, Error)]
enum ApiFailure {
    #[error("{action} failed ({status}): {code}: {message}")]
    Server {
        action: String,
        status: u16,
        code: String,
        message: String,
    },

    #[error("{action} failed ({status})")]
    Status { action: String, status: u16 },
}

#[derive(Debug, Serialize)]
struct ExecCommandRequest {
    command: String,
    timeout_seconds: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct ExecCommandResponse {
    execution_id: String,
    container_id: String,
    command: String,
    output: String,
    duration_ms: u64,
}

#[derive(Debug, PartialEq, Eq, Serialize)]
struct PortMapping {
    host_port: Option<u16>,
    container_port: u16,
    protocol: String,
}

#[derive(Debug, PartialEq, Eq, Serialize)]
struct VolumeMount {
    source: String,
    target: String,
    mode: String,
}

#[derive(Debug, Serialize)]
struct CreateContainerRequest {
    image: String,
    name: Option<String>,
    pull_if_missing: bool,
    start: bool,
    ports: Vec<PortMapping>,
    env: BTreeMap<String, String>,
    volumes: Vec<VolumeMount>,
    command: Vec<String>,
    working_dir: Option<String>,
    tty: bool,
    network_mode: Option<String>,
    cpu_limit: Option<f64>,
    memory_limit_mb: Option<u64>,
    restart_policy: RestartArg,
    max_retry_count: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CreateContainerResponse {
    id: String,
    #[serde(default)]
    warnings: Vec<String>,
    started: bool,
    #[serde(default)]
    start_error: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreateNetworkRequest {
    name: String,
    driver: String,
    internal: bool,
    attachable: bool,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
    version: String,
    uptime_seconds: u64,
    active_terminals: u64,
    docker_version: Option<String>,
}

struct Api {
    client: Client,
    base: String,
}

impl Api {
    fn new(base: &str) -> Self {
        Self {
            client: Client::new(),
            base: base.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    fn send(&self, request: RequestBuilder, action: &str) -> Result<Response> {
        let response = request
            .send()
            .with_context(|| format!("Failed to reach Dockhand at {}", self.base))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let failure = match response.json::<ErrorBody>() {
            Ok(body) => ApiFailure::Server {
                action: action.to_string(),
                status: status.as_u16(),
                code: body.error,
                message: body.message,
            },
            Err(_) => ApiFailure::Status {
                action: action.to_string(),
                status: status.as_u16(),
            },
        };
        Err(failure.into())
    }

    fn get<T: DeserializeOwned>(&self, path: &str, action: &str) -> Result<T> {
        self.send(self.client.get(self.url(path)), action)?
            .json()
            .context("Failed to parse response")
    }

    fn post_json<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B, action: &str) -> Result<T> {
        self.send(self.client.post(self.url(path)).json(body), action)?
            .json()
            .context("Failed to parse response")
    }

    fn post(&self, path: &str, action: &str) -> Result<()> {
        self.send(self.client.post(self.url(path)), action).map(|_| ())
    }

    fn delete(&self, path: &str, action: &str) -> Result<()> {
        self.send(self.client.delete(self.url(path)), action).map(|_| ())
    }
}

/// `[HOST:]CONTAINER[/PROTO]`
fn parse_port(spec: &str) -> Result<PortMapping> {
    let (ports, protocol) = match spec.split_once('/') {
        Some((ports, protocol)) => (ports, protocol.to_lowercase()),
        None => (spec, "tcp".to_string()),
    };
    let (host, container) = match ports.rsplit_once(':') {
        Some((host, container)) => (Some(host), container),
        None => (None, ports),
    };

    let container_port = container
        .parse::<u16>()
        .ok()
        .filter(|p| *p > 0)
        .with_context(|| format!("Invalid container port in '{}'", spec))?;
    let host_port = match host.filter(|h| !h.is_empty()) {
        Some(host) => Some(
            host.parse::<u16>()
                .ok()
                .filter(|p| *p > 0)
                .with_context(|| format!("Invalid host port in '{}'", spec))?,
        ),
        None => None,
    };
    if protocol != "tcp" && protocol != "udp" && protocol != "sctp" {
        bail!("Invalid protocol in '{}'", spec);
    }

    Ok(PortMapping {
        host_port,
        container_port,
        protocol,
    })
}

/// `KEY=VALUE`
fn parse_env(spec: &str) -> Result<(String, String)> {
    match spec.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.to_string(), value.to_string())),
        _ => bail!("Invalid environment variable '{}', expected KEY=VALUE", spec),
    }
}

/// `SOURCE:TARGET[:MODE]`
fn parse_volume(spec: &str) -> Result<VolumeMount> {
    let parts: Vec<&str> = spec.split(':').collect();
    let (source, target, mode) = match parts.as_slice() {
        [source, target] => (*source, *target, "rw"),
        [source, target, mode] => (*source, *target, *mode),
        _ => bail!("Invalid volume '{}', expected SOURCE:TARGET[:MODE]", spec),
    };
    if source.is_empty() || target.is_empty() {
        bail!("Invalid volume '{}', expected SOURCE:TARGET[:MODE]", spec);
    }
    Ok(VolumeMount {
        source: source.to_string(),
        target: target.to_string(),
        mode: mode.to_string(),
    })
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn str_field<'a>(value: &'a Value, key: &str) -> &'a str {
    value[key].as_str().unwrap_or("-")
}

fn short_id(id: &str) -> &str {
    let id = id.trim_start_matches("sha256:");
    &id[..id.len().min(12)]
}

fn human_bytes(bytes: i64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes.max(0) as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes.max(0), UNITS[0])
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}

fn colored_state(state: &str) -> colored::ColoredString {
    match state {
        "running" => state.green(),
        "paused" | "restarting" => state.yellow(),
        "exited" | "dead" => state.red(),
        _ => state.normal(),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let api = Api::new(&cli.api_url);
    let json = cli.output == OutputFormat::Json;

    match cli.command {
        Commands::Health => {
            let health: HealthResponse = api.get("/health", "Health check")?;

            println!("{}", "Dockhand Status".bright_cyan().bold());
            println!("{}", "=".repeat(40).bright_blue());
            println!(
                "{} {}",
                "Status:".cyan(),
                if health.status == "healthy" {
                    health.status.green()
                } else {
                    health.status.yellow()
                }
            );
            println!("{} {}", "Version:".cyan(), health.version);
            println!("{} {}s", "Uptime:".cyan(), health.uptime_seconds);
            println!("{} {}", "Active Terminals:".cyan(), health.active_terminals);
            println!(
                "{} {}",
                "Docker:".cyan(),
                health.docker_version.as_deref().unwrap_or("unreachable")
            );
        }

        Commands::System => {
            let system: Value = api.get("/api/v1/system", "System overview")?;
            if json {
                return print_json(&system);
            }

            println!("{}", "Docker Engine".bright_cyan().bold());
            println!("{}", "=".repeat(40).bright_blue());
            println!("{} {}", "Version:".cyan(), str_field(&system, "server_version"));
            println!(
                "{} {} ({})",
                "OS:".cyan(),
                str_field(&system, "operating_system"),
                str_field(&system, "architecture")
            );
            println!("{} {}", "CPUs:".cyan(), system["cpus"]);
            println!(
                "{} {}",
                "Memory:".cyan(),
                human_bytes(system["memory_bytes"].as_i64().unwrap_or(0))
            );
            println!(
                "{} {} ({} running, {} paused, {} stopped)",
                "Containers:".cyan(),
                system["containers"],
                system["containers_running"].to_string().green(),
                system["containers_paused"].to_string().yellow(),
                system["containers_stopped"].to_string().red()
            );
            println!("{} {}", "Images:".cyan(), system["images"]);
            println!("{} {}", "Volumes:".cyan(), system["volumes"]);
            println!("{} {}", "Networks:".cyan(), system["networks"]);
        }

        Commands::Ps { all } => {
            let path = format!("/api/v1/containers?all={}", all);
            let containers: Vec<Value> = api.get(&path, "Container listing")?;
            if json {
                return print_json(&containers);
            }

            println!(
                "{:<14} {:<24} {:<30} {:<12} {}",
                "CONTAINER ID".bold(),
                "NAME".bold(),
                "IMAGE".bold(),
                "STATE".bold(),
                "STATUS".bold()
            );
            for c in &containers {
                let name = c["names"][0].as_str().unwrap_or("").trim_start_matches('/');
                println!(
                    "{:<14} {:<24} {:<30} {:<12} {}",
                    short_id(str_field(c, "id")),
                    name,
                    str_field(c, "image"),
                    colored_state(str_field(c, "state")),
                    str_field(c, "status")
                );
            }
        }

        Commands::Inspect { id, raw } => {
            let path = if raw {
                format!("/api/v1/containers/{}/inspect", id)
            } else {
                format!("/api/v1/containers/{}", id)
            };
            let details: Value = api.get(&path, "Inspect")?;
            print_json(&details)?;
        }

        Commands::Stats { id } => {
            let stats: Value = api.get(&format!("/api/v1/containers/{}/stats", id), "Stats")?;
            if json {
                return print_json(&stats);
            }

            let bytes = |key: &str| human_bytes(stats[key].as_i64().unwrap_or(0));
            println!("{} {}", "Container:".cyan(), id);
            println!("{} {:.2}%", "CPU:".cyan(), stats["cpu_percent"].as_f64().unwrap_or(0.0));
            println!(
                "{} {:.2}% ({} / {})",
                "Memory:".cyan(),
                stats["memory_percent"].as_f64().unwrap_or(0.0),
                bytes("memory_usage_bytes"),
                bytes("memory_limit_bytes")
            );
            println!(
                "{} {} rx / {} tx",
                "Network:".cyan(),
                bytes("network_rx_bytes"),
                bytes("network_tx_bytes")
            );
        }

        Commands::Run {
            image,
            name,
            publish,
            env,
            volume,
            restart,
            max_retries,
            cpus,
            memory,
            network,
            workdir,
            tty,
            no_pull,
            no_start,
            command,
        } => {
            let request = CreateContainerRequest {
                image,
                name,
                pull_if_missing: !no_pull,
                start: !no_start,
                ports: publish.iter().map(|p| parse_port(p)).collect::<Result<_>>()?,
                env: env.iter().map(|e| parse_env(e)).collect::<Result<_>>()?,
                volumes: volume.iter().map(|v| parse_volume(v)).collect::<Result<_>>()?,
                command,
                working_dir: workdir,
                tty,
                network_mode: network,
                cpu_limit: cpus,
                memory_limit_mb: memory,
                restart_policy: restart,
                max_retry_count: max_retries,
            };

            let created: CreateContainerResponse = api.post_json("/api/v1/containers", &request, "Create")?;
            if json {
                return print_json(&created);
            }

            for warning in &created.warnings {
                eprintln!("{} {}", "Warning:".yellow(), warning);
            }
            match (&created.start_error, created.started) {
                (Some(error), _) => {
                    println!("{} {}", "✓ Created:".green(), short_id(&created.id));
                    println!("{} {}", "✗ Failed to start:".red(), error);
                }
                (None, true) => println!("{} {}", "✓ Started:".green(), short_id(&created.id)),
                (None, false) => println!("{} {}", "✓ Created:".green(), short_id(&created.id)),
            }
        }

        Commands::Start { id } => {
            api.post(&format!("/api/v1/containers/{}/start", id), "Start")?;
            println!("{} {}", "✓ Started:".green(), id);
        }

        Commands::Stop { id } => {
            api.post(&format!("/api/v1/containers/{}/stop", id), "Stop")?;
            println!("{} {}", "✓ Stopped:".green(), id);
        }

        Commands::Restart { id } => {
            api.post(&format!("/api/v1/containers/{}/restart", id), "Restart")?;
            println!("{} {}", "✓ Restarted:".green(), id);
        }

        Commands::Pause { id } => {
            api.post(&format!("/api/v1/containers/{}/pause", id), "Pause")?;
            println!("{} {}", "✓ Paused:".green(), id);
        }

        Commands::Unpause { id } => {
            api.post(&format!("/api/v1/containers/{}/unpause", id), "Unpause")?;
            println!("{} {}", "✓ Unpaused:".green(), id);
        }

        Commands::Rm { id, force } => {
            api.delete(&format!("/api/v1/containers/{}?force={}", id, force), "Remove")?;
            println!("{} {}", "✓ Removed:".green(), id);
        }

        Commands::Logs { id, tail } => {
            let logs: Value = api.get(&format!("/api/v1/containers/{}/logs?tail={}", id, tail), "Logs")?;
            if json {
                return print_json(&logs);
            }
            for line in logs["lines"].as_array().into_iter().flatten() {
                println!("{}", line.as_str().unwrap_or_default());
            }
        }

        Commands::Exec { id, command, timeout } => {
            let request = ExecCommandRequest {
                command: command.join(" "),
                timeout_seconds: timeout,
            };

            let result: ExecCommandResponse = api
                .send(
                    api.client
                        .post(api.url(&format!("/api/v1/containers/{}/exec", id)))
                        .json(&request),
                    "Exec",
                )?
                .json()
                .context("Failed to parse response")?;

            if json {
                return print_json(&result);
            }

            print!("{}", result.output);
            if !result.output.ends_with('\n') && !result.output.is_empty() {
                println!();
            }
            eprintln!("{} {}ms", "Duration:".bright_cyan(), result.duration_ms);
        }

        Commands::Images => {
            let images: Vec<Value> = api.get("/api/v1/images", "Image listing")?;
            if json {
                return print_json(&images);
            }

            println!("{:<14} {:<50} {}", "IMAGE ID".bold(), "TAGS".bold(), "SIZE".bold());
            for image in &images {
                let tags = image["tags"]
                    .as_array()
                    .map(|tags| {
                        tags.iter()
                            .filter_map(Value::as_str)
                            .collect::<Vec<_>>()
                            .join(", ")
                    })
                    .filter(|t| !t.is_empty())
                    .unwrap_or_else(|| "<none>".to_string());
                println!(
                    "{:<14} {:<50} {}",
                    short_id(str_field(image, "id")),
                    tags,
                    human_bytes(image["size_bytes"].as_i64().unwrap_or(0))
                );
            }
        }

        Commands::Rmi { id, force } => {
            api.delete(&format!("/api/v1/images/{}?force={}", id, force), "Image removal")?;
            println!("{} {}", "✓ Removed image:".green(), id);
        }

        Commands::Volumes => {
            let volumes: Vec<Value> = api.get("/api/v1/volumes", "Volume listing")?;
            if json {
                return print_json(&volumes);
            }

            println!("{:<40} {:<10} {}", "NAME".bold(), "DRIVER".bold(), "MOUNTPOINT".bold());
            for v in &volumes {
                println!(
                    "{:<40} {:<10} {}",
                    str_field(v, "name"),
                    str_field(v, "driver"),
                    str_field(v, "mountpoint")
                );
            }
        }

        Commands::Rmv { name } => {
            api.delete(&format!("/api/v1/volumes/{}", name), "Volume removal")?;
            println!("{} {}", "✓ Removed volume:".green(), name);
        }

        Commands::Networks => {
            let networks: Vec<Value> = api.get("/api/v1/networks", "Network listing")?;
            if json {
                return print_json(&networks);
            }

            println!(
                "{:<14} {:<30} {:<10} {}",
                "NETWORK ID".bold(),
                "NAME".bold(),
                "DRIVER".bold(),
                "SCOPE".bold()
            );
            for n in &networks {
                println!(
                    "{:<14} {:<30} {:<10} {}",
                    short_id(str_field(n, "id")),
                    str_field(n, "name"),
                    str_field(n, "driver"),
                    str_field(n, "scope")
                );
            }
        }

        Commands::Rmn { id } => {
            api.delete(&format!("/api/v1/networks/{}", id), "Network removal")?;
            println!("{} {}", "✓ Removed network:".green(), id);
        }

        Commands::NetworkCreate {
            name,
            driver,
            internal,
            attachable,
        } => {
            let request = CreateNetworkRequest {
                name,
                driver,
                internal,
                attachable,
            };
            let created: Value = api.post_json("/api/v1/networks", &request, "Network creation")?;
            if json {
                return print_json(&created);
            }
            println!("{} {}", "✓ Created network:".green(), short_id(str_field(&created, "id")));
        }

        Commands::NetworkInspect { id } => {
            let network: Value = api.get(&format!("/api/v1/networks/{}", id), "Network inspect")?;
            if json {
                return print_json(&network);
            }

            println!("{}", str_field(&network, "name").bright_cyan().bold());
            println!("{}", "=".repeat(40).bright_blue());
            println!("{} {}", "ID:".cyan(), str_field(&network, "id"));
            println!("{} {}", "Driver:".cyan(), str_field(&network, "driver"));
            println!("{} {}", "Scope:".cyan(), str_field(&network, "scope"));
            println!("{} {}", "Internal:".cyan(), network["internal"]);
            println!("{}", "Containers:".cyan());
            for c in network["containers"].as_array().into_iter().flatten() {
                println!(
                    "  {:<24} {:<20} {}",
                    str_field(c, "name"),
                    str_field(c, "ipv4_address"),
                    short_id(str_field(c, "container_id"))
                );
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("sha256:0123456789abcdef0123"), "0123456789ab");
        assert_eq!(short_id("abc"), "abc");
    }

    #[test]
    fn test_human_bytes() {
        assert_eq!(human_bytes(512), "512 B");
        assert_eq!(human_bytes(1536), "1.5 KB");
        assert_eq!(human_bytes(5 * 1024 * 1024 * 1024), "5.0 GB");
    }

    #[test]
    fn test_parse_exec_args() {
        let cli = Cli::parse_from(["dockhand", "exec", "abc123", "ls", "-la", "/tmp"]);
        match cli.command {
            Commands::Exec { id, command, timeout } => {
                assert_eq!(id, "abc123");
                assert_eq!(command.join(" "), "ls -la /tmp");
                assert_eq!(timeout, 60);
            }
            _ => panic!("expected exec"),
        }
    }

    #[test]
    fn test_parse_port() {
        assert_eq!(
            parse_port("8080:80").unwrap(),
            PortMapping {
                host_port: Some(8080),
                container_port: 80,
                protocol: "tcp".into()
            }
        );
        assert_eq!(
            parse_port("53/udp").unwrap(),
            PortMapping {
                host_port: None,
                container_port: 53,
                protocol: "udp".into()
            }
        );
        assert!(parse_port("99999:80").is_err());
        assert!(parse_port("80/http").is_err());
    }

    #[test]
    fn test_parse_env_and_volume() {
        assert_eq!(parse_env("A=b=c").unwrap(), ("A".to_string(), "b=c".to_string()));
        assert!(parse_env("=x").is_err());

        assert_eq!(parse_volume("data:/data").unwrap().mode, "rw");
        assert_eq!(parse_volume("/srv:/srv:ro").unwrap().mode, "ro");
        assert!(parse_volume("/only").is_err());
    }

    #[test]
    fn test_parse_run_args() {
        let cli = Cli::parse_from([
            "dockhand", "run", "-p", "8080:80", "-e", "MODE=prod", "--restart", "unless-stopped", "--memory",
            "256", "nginx", "nginx", "-g", "daemon off;",
        ]);
        match cli.command {
            Commands::Run {
                image,
                publish,
                env,
                restart,
                memory,
                command,
                ..
            } => {
                assert_eq!(image, "nginx");
                assert_eq!(publish, vec!["8080:80"]);
                assert_eq!(env, vec!["MODE=prod"]);
                assert_eq!(restart, RestartArg::UnlessStopped);
                assert_eq!(memory, Some(256));
                assert_eq!(command, vec!["nginx", "-g", "daemon off;"]);
            }
            _ => panic!("expected run"),
        }

        assert_eq!(serde_json::to_value(RestartArg::OnFailure).unwrap(), "on-failure");
    }

    #[test]
    fn test_parse_network_commands() {
        let cli = Cli::parse_from(["dockhand", "network-create", "backend", "--internal"]);
        assert!(matches!(
            cli.command,
            Commands::NetworkCreate { ref name, ref driver, internal: true, attachable: false }
                if name == "backend" && driver == "bridge"
        ));

        let cli = Cli::parse_from(["dockhand", "inspect", "abc123", "--raw"]);
        assert!(matches!(cli.command, Commands::Inspect { raw: true, .. }));
    }

    #[test]
    fn test_global_output_flag() {
        let cli = Cli::parse_from(["dockhand", "ps", "--all", "--output", "json"]);
        assert_eq!(cli.output, OutputFormat::Json);
        assert!(matches!(cli.command, Commands::Ps { all: true }));
    }
}
