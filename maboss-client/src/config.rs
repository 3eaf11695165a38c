//! Client configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via MABOSS_CONFIG)
//! 3. Environment variables

use crate::readiness::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default read buffer size (4 KiB).
pub const DEFAULT_READ_BUFFER_SIZE: usize = 4 * 1024;

/// Minimum read buffer size (1 KiB).
pub const MIN_READ_BUFFER_SIZE: usize = 1024;

/// Maximum read buffer size (1 MiB).
pub const MAX_READ_BUFFER_SIZE: usize = 1024 * 1024;

/// Client configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// How a local server is started.
    pub server: ServerConfig,
    /// How long to wait for a local server to become ready.
    pub startup: StartupConfig,
    /// Socket settings.
    pub io: IoConfig,
}

impl ClientConfig {
    /// Loads configuration from file, then applies environment variable overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("MABOSS_CONFIG") {
            config = Self::from_file(&path)?;
        }

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        let config: ClientConfig = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        Ok(config)
    }

    /// Loads configuration from environment variables only.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Saves configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = serde_yaml::to_string(self)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        Ok(())
    }

    /// Applies environment variable overrides to the configuration.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from any key lookup. Unparseable values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        self.server.apply_overrides(&lookup);
        self.startup.apply_overrides(&lookup);
        self.io.apply_overrides(&lookup);
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.startup.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "startup.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.server.service_name.is_empty() || self.server.service_name.contains('/') {
            return Err(ConfigError::ValidationError(format!(
                "invalid service name '{}'",
                self.server.service_name
            )));
        }
        if self.server.host.is_empty() {
            return Err(ConfigError::ValidationError(
                "server.host must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Local server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server executable.
    pub binary: PathBuf,
    /// Host name passed to the server with `--host`.
    pub host: String,
    /// Prefix of the socket and pidfile names.
    pub service_name: String,
    /// Directory holding the socket and pidfile.
    pub tmp_dir: PathBuf,
    /// Start the server with `-q`.
    pub quiet: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("MaBoSS-server"),
            host: "localhost".to_string(),
            service_name: "MaBoSS".to_string(),
            tmp_dir: PathBuf::from("/tmp"),
            quiet: true,
        }
    }
}

impl ServerConfig {
    fn apply_overrides(&mut self, lookup: &impl Fn(&str) -> Option<String>) {
        if let Some(binary) = lookup("MABOSS_SERVER") {
            self.binary = PathBuf::from(binary);
        }

        if let Some(dir) = lookup("MABOSS_TMP_DIR") {
            self.tmp_dir = PathBuf::from(dir);
        }

        if let Some(name) = lookup("MABOSS_SERVICE_NAME") {
            self.service_name = name;
        }

        if let Some(host) = lookup("MABOSS_LOCAL_HOST") {
            self.host = host;
        }
    }
}

/// Readiness wait configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StartupConfig {
    /// Number of pidfile checks before giving up.
    pub max_attempts: u32,
    /// Pause after each failed check, in milliseconds.
    pub interval_ms: u64,
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self {
            max_attempts: 20,
            interval_ms: 100,
        }
    }
}

impl StartupConfig {
    fn apply_overrides(&mut self, lookup: &impl Fn(&str) -> Option<String>) {
        if let Some(attempts) = lookup("MABOSS_STARTUP_ATTEMPTS") {
            if let Ok(n) = attempts.parse() {
                self.max_attempts = n;
            }
        }

        if let Some(interval) = lookup("MABOSS_STARTUP_INTERVAL_MS") {
            if let Ok(ms) = interval.parse() {
                self.interval_ms = ms;
            }
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.interval_ms))
    }
}

/// Socket configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IoConfig {
    /// Read buffer size for draining the response.
    pub read_buffer_size: usize,
    /// Read/write timeout in seconds. None blocks indefinitely, which suits
    /// long simulations.
    pub timeout_secs: Option<u64>,
}

impl Default for IoConfig {
    fn default() -> Self {
        Self {
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            timeout_secs: None,
        }
    }
}

impl IoConfig {
    fn apply_overrides(&mut self, lookup: &impl Fn(&str) -> Option<String>) {
        if let Some(size) = lookup("MABOSS_READ_BUFFER_SIZE") {
            if let Ok(n) = size.parse() {
                self.read_buffer_size = n;
            }
        }

        if let Some(timeout) = lookup("MABOSS_IO_TIMEOUT_SECS") {
            if let Ok(secs) = timeout.parse() {
                self.timeout_secs = Some(secs);
            }
        }
    }

    /// Returns the read buffer size clamped to sane bounds.
    pub fn read_buffer_size(&self) -> usize {
        self.read_buffer_size
            .clamp(MIN_READ_BUFFER_SIZE, MAX_READ_BUFFER_SIZE)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{}': {1}", .0.display())]
    IoError(PathBuf, std::io::Error),

    #[error("failed to parse config file '{}': {1}", .0.display())]
    ParseError(PathBuf, String),

    #[error("configuration validation failed: {0}")]
    ValidationError(String),
}
