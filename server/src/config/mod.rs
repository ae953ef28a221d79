//! Configuration module for Dockhand
//!
//! Supports configuration via:
//! - YAML/TOML config files
//! - Environment variables (with DOCKHAND_ prefix)

use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::exec::ExecOptions;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Docker Engine connection settings
    #[serde(default)]
    pub docker: DockerConfig,

    /// Interactive exec session settings
    #[serde(default)]
    pub exec: ExecConfig,

    /// Metrics settings
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Docker Engine connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DockerConfig {
    /// Engine address (unix://, tcp:// or http://). Falls back to DOCKER_HOST.
    #[serde(default)]
    pub host: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_docker_timeout")]
    pub timeout_seconds: u64,
}

/// Exec session defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecConfig {
    /// Shell used when the container platform cannot be inspected
    #[serde(default = "default_shell")]
    pub default_shell: String,

    /// Allocate a pseudo-terminal
    #[serde(default = "default_true")]
    pub tty: bool,

    /// Initial terminal rows
    #[serde(default = "default_rows")]
    pub rows: u16,

    /// Initial terminal columns
    #[serde(default = "default_cols")]
    pub cols: u16,

    /// Working directory inside the container
    #[serde(default)]
    pub working_dir: Option<String>,

    /// User to run the shell as
    #[serde(default)]
    pub user: Option<String>,

    /// Maximum number of output chunks kept per session
    #[serde(default = "default_output_capacity")]
    pub output_capacity: usize,

    /// Read size of the output pump in bytes
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Chunks per observer notification
    #[serde(default = "default_notify_batch")]
    pub notify_batch: usize,

    /// Quiet period after which pending output is announced, in milliseconds
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,

    /// Time allowed for inspect + create + attach, in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable Prometheus metrics endpoint
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Metrics endpoint path
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_docker_timeout() -> u64 {
    120
}

fn default_shell() -> String {
    "/bin/sh".to_string()
}

fn default_rows() -> u16 {
    24
}

fn default_cols() -> u16 {
    80
}

fn default_output_capacity() -> usize {
    5000
}

fn default_chunk_size() -> usize {
    4096
}

fn default_notify_batch() -> usize {
    10
}

fn default_flush_interval_ms() -> u64 {
    25
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            host: None,
            timeout_seconds: default_docker_timeout(),
        }
    }
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            default_shell: default_shell(),
            tty: true,
            rows: default_rows(),
            cols: default_cols(),
            working_dir: None,
            user: None,
            output_capacity: default_output_capacity(),
            chunk_size: default_chunk_size(),
            notify_batch: default_notify_batch(),
            flush_interval_ms: default_flush_interval_ms(),
            connect_timeout_seconds: default_connect_timeout(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: default_metrics_path(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            docker: DockerConfig::default(),
            exec: ExecConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl ExecConfig {
    /// Session options derived from this configuration
    pub fn session_options(&self) -> ExecOptions {
        ExecOptions {
            default_shell: self.default_shell.clone(),
            tty: self.tty,
            rows: self.rows,
            cols: self.cols,
            working_dir: self.working_dir.clone(),
            user: self.user.clone(),
            output_capacity: self.output_capacity,
            chunk_size: self.chunk_size,
            notify_batch: self.notify_batch,
            flush_interval: Duration::from_millis(self.flush_interval_ms),
            connect_timeout: Duration::from_secs(self.connect_timeout_seconds),
        }
    }
}

impl AppConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> Result<Self> {
        // Try to load .env file if present
        let _ = dotenvy::dotenv();

        let config = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config/dockhand").required(false))
            .add_source(config::File::with_name("/etc/dockhand/config").required(false))
            .add_source(
                config::Environment::with_prefix("DOCKHAND")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let app_config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        app_config.validate()?;

        Ok(app_config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            anyhow::bail!("Port cannot be 0");
        }

        if self.docker.timeout_seconds == 0 {
            anyhow::bail!("Docker timeout cannot be 0");
        }

        if self.exec.output_capacity == 0 {
            anyhow::bail!("Exec output capacity cannot be 0");
        }

        if self.exec.chunk_size == 0 {
            anyhow::bail!("Exec chunk size cannot be 0");
        }

        if self.exec.notify_batch == 0 {
            anyhow::bail!("Exec notify batch cannot be 0");
        }

        if self.exec.connect_timeout_seconds == 0 {
            anyhow::bail!("Exec connect timeout cannot be 0");
        }

        if self.exec.default_shell.trim().is_empty() {
            anyhow::bail!("Default shell cannot be empty");
        }

        Ok(())
    }

    /// Effective Docker address: configured host, then DOCKER_HOST
    pub fn docker_host(&self) -> Option<String> {
        self.docker
            .host
            .clone()
            .or_else(|| std::env::var("DOCKER_HOST").ok())
            .filter(|h| !h.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.exec.default_shell, "/bin/sh");
        assert_eq!(config.exec.output_capacity, 5000);
        assert_eq!((config.exec.rows, config.exec.cols), (24, 80));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        let config = AppConfig {
            port: 0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.exec.output_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_session_options() {
        let mut config = ExecConfig::default();
        config.connect_timeout_seconds = 5;
        config.user = Some("app".into());

        let options = config.session_options();
        assert_eq!(options.connect_timeout, Duration::from_secs(5));
        assert_eq!(options.user.as_deref(), Some("app"));
        assert_eq!(options.flush_interval, Duration::from_millis(25));
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "port = 9090\n[exec]\ndefault_shell = \"/bin/bash\"\nrows = 40").unwrap();

        let config: AppConfig = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default()).unwrap())
            .add_source(config::File::from(file.path()))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.port, 9090);
        assert_eq!(config.exec.default_shell, "/bin/bash");
        assert_eq!(config.exec.rows, 40);
        assert_eq!(config.exec.cols, 80);
    }
}
