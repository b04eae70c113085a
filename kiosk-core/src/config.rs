//! Configuration management for kiosk
//!
//! Config files are stored in platform-appropriate locations:
//! - Linux: ~/.config/kiosk/
//! - macOS: ~/Library/Application Support/kiosk/
//! - Windows: %APPDATA%\kiosk\

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::protocol::KioskConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Config directory not found")]
    NoDirFound,
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration (for kiosk-server)
    #[serde(default)]
    pub server: ServerConfig,

    /// Display client configuration (for kiosk-tui)
    #[serde(default)]
    pub client: ClientConfig,
}

/// Server-side configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// HTTP port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bearer token required to issue commands.
    /// If not set, a random token is generated on each start
    pub admin_token: Option<String>,

    /// Commands retained per kiosk before the oldest are evicted
    #[serde(default = "default_max_commands")]
    pub max_commands_per_kiosk: usize,

    /// Registered kiosks
    #[serde(default)]
    pub kiosks: Vec<KioskConfig>,
}

/// Display client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the kiosk server
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Device token; usually given on the command line instead
    pub token: Option<String>,

    /// Command poll interval in seconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Delay before the automatic fullscreen attempt, in milliseconds
    #[serde(default = "default_fullscreen_delay")]
    pub fullscreen_delay_ms: u64,

    /// Health probe interval in seconds
    #[serde(default = "default_health_interval")]
    pub health_interval_secs: u64,

    /// Consecutive failed probes before the client is considered offline
    #[serde(default = "default_offline_after")]
    pub offline_after_failures: u32,

    /// Directory for durable client flags; defaults to the platform state dir
    pub state_dir: Option<PathBuf>,
}

// Default value functions
fn default_listen_addr() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    crate::DEFAULT_PORT
}
fn default_max_commands() -> usize {
    100
}
fn default_server_url() -> String {
    format!("http://127.0.0.1:{}", crate::DEFAULT_PORT)
}
fn default_poll_interval() -> u64 {
    10
}
fn default_fullscreen_delay() -> u64 {
    500
}
fn default_health_interval() -> u64 {
    5
}
fn default_offline_after() -> u32 {
    3
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            port: default_port(),
            admin_token: None,
            max_commands_per_kiosk: default_max_commands(),
            kiosks: Vec::new(),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            token: None,
            poll_interval_secs: default_poll_interval(),
            fullscreen_delay_ms: default_fullscreen_delay(),
            health_interval_secs: default_health_interval(),
            offline_after_failures: default_offline_after(),
            state_dir: None,
        }
    }
}

impl ClientConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn fullscreen_delay(&self) -> Duration {
        Duration::from_millis(self.fullscreen_delay_ms)
    }

    pub fn health_interval(&self) -> Duration {
        Duration::from_secs(self.health_interval_secs.max(1))
    }

    /// Resolve the directory holding durable client flags
    pub fn state_dir(&self) -> Result<PathBuf, ConfigError> {
        if let Some(ref dir) = self.state_dir {
            return Ok(dir.clone());
        }
        dirs::state_dir()
            .or_else(dirs::cache_dir)
            .map(|p| p.join("kiosk"))
            .ok_or(ConfigError::NoDirFound)
    }
}

impl Config {
    /// Get config directory path
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|p| p.join("kiosk"))
            .ok_or(ConfigError::NoDirFound)
    }

    /// Get config file path
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load config from default location
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path()?;

        if !path.exists() {
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load config from specific path
    pub fn load_from(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save config to default location
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path()?)
    }

    /// Save config to specific path
    pub fn save_to(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
