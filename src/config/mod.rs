//! Configuration module
//!
//! Handles loading and saving opwire configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::protocol::{DEFAULT_DATAGRAM_SIZE, DEFAULT_PORT};

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config file not found: {0}")]
    NotFound(PathBuf),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// General settings
    #[serde(default)]
    pub general: GeneralConfig,

    /// Network settings
    #[serde(default)]
    pub network: NetworkConfig,

    /// Demo arena settings
    #[serde(default)]
    pub arena: ArenaConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            network: NetworkConfig::default(),
            arena: ArenaConfig::default(),
        }
    }
}

/// General configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Unique instance identifier (auto-generated if not set)
    pub instance_id: Option<String>,
    /// Human-readable name for this instance
    pub name: String,
    /// Enable verbose logging
    #[serde(default)]
    pub verbose: bool,
    /// Log file path (optional)
    pub log_file: Option<PathBuf>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            instance_id: None,
            name: hostname::get()
                .map(|h| h.to_string_lossy().to_string())
                .unwrap_or_else(|_| "unknown".to_string()),
            verbose: false,
            log_file: None,
        }
    }
}

/// Network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Address to listen on, as `host:port`
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Maximum datagram size; also every peer's send buffer capacity
    #[serde(default = "default_max_datagram_size")]
    pub max_datagram_size: usize,
}

fn default_listen() -> String {
    format!("0.0.0.0:{}", DEFAULT_PORT)
}

fn default_max_datagram_size() -> usize {
    DEFAULT_DATAGRAM_SIZE
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            max_datagram_size: default_max_datagram_size(),
        }
    }
}

/// Demo arena configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArenaConfig {
    /// Game-loop tick interval in milliseconds
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
    /// Idle time after which a peer's session ends, in milliseconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_ms: u64,
    /// Position change per tick per unit of movement input
    #[serde(default = "default_move_speed")]
    pub move_speed: f32,
    /// Playing field half-width; x is clamped to +/- this value
    #[serde(default = "default_bounds_x")]
    pub bounds_x: f32,
    /// Playing field half-height; y is clamped to +/- this value
    #[serde(default = "default_bounds_y")]
    pub bounds_y: f32,
}

fn default_tick_interval() -> u64 {
    15
}

fn default_idle_timeout() -> u64 {
    1000
}

fn default_move_speed() -> f32 {
    0.1
}

fn default_bounds_x() -> f32 {
    2.0
}

fn default_bounds_y() -> f32 {
    4.0
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval(),
            idle_timeout_ms: default_idle_timeout(),
            move_speed: default_move_speed(),
            bounds_x: default_bounds_x(),
            bounds_y: default_bounds_y(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from the default location
    pub fn load_default() -> ConfigResult<Self> {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("opwire/config.toml")),
            Some(PathBuf::from("./opwire.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                return Self::load(path);
            }
        }

        // Return default config if no file found
        Ok(Self::default())
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let contents = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Get the instance ID, generating one if not set
    pub fn instance_id(&self) -> String {
        self.general
            .instance_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
    }
}

/// Generate a sample configuration file
pub fn generate_sample_config() -> String {
    let config = Config {
        general: GeneralConfig {
            instance_id: Some("arena-primary".to_string()),
            name: "Arena Server".to_string(),
            verbose: false,
            log_file: None,
        },
        ..Default::default()
    };

    toml::to_string_pretty(&config).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.network.max_datagram_size, DEFAULT_DATAGRAM_SIZE);
        assert!(config.network.listen.ends_with(&DEFAULT_PORT.to_string()));
        assert_eq!(config.arena.tick_interval_ms, 15);
    }

    #[test]
    fn test_save_and_load() {
        let config = Config::default();
        let file = NamedTempFile::new().unwrap();

        config.save(file.path()).unwrap();

        let loaded = Config::load(file.path()).unwrap();
        assert_eq!(loaded.network.listen, config.network.listen);
        assert_eq!(loaded.arena.move_speed, config.arena.move_speed);
    }

    #[test]
    fn test_sample_config() {
        let sample = generate_sample_config();
        let parsed: Config = toml::from_str(&sample).unwrap();
        assert_eq!(parsed.general.name, "Arena Server");
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let parsed: Config = toml::from_str("[network]\nlisten = \":9000\"\n").unwrap();
        assert_eq!(parsed.network.listen, ":9000");
        assert_eq!(parsed.network.max_datagram_size, DEFAULT_DATAGRAM_SIZE);
        assert_eq!(parsed.arena.idle_timeout_ms, 1000);
    }

    #[test]
    fn test_instance_id_generated_when_unset() {
        let config = Config::default();
        let id = config.instance_id();
        assert!(!id.is_empty());
    }
}
