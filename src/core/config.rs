//! Configuration module for the camera remote tool
//!
//! Supports loading configuration from a TOML file.
//! Configuration is stored in a standard location:
//! - Windows: %APPDATA%\camera_remote_tool\config.toml
//! - Linux/macOS: ~/.config/camera_remote_tool/config.toml

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Application name used for config directory
const APP_NAME: &str = "camera_remote_tool";

/// Default config file name
const CONFIG_FILE_NAME: &str = "config.toml";

/// Get the standard configuration directory for the application.
pub fn get_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var("APPDATA")
            .ok()
            .map(|appdata| PathBuf::from(appdata).join(APP_NAME))
    }

    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .ok()
            .map(|home| PathBuf::from(home).join(".config").join(APP_NAME))
    }
}

/// Get the standard configuration file path.
pub fn get_config_path() -> Option<PathBuf> {
    get_config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Vendor SDK settings
    pub sdk: SdkConfig,

    /// Device selection settings
    pub device: DeviceConfig,

    /// Capture settings
    pub capture: CaptureConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

/// Vendor SDK settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SdkConfig {
    /// Directory containing the vendor core library and its adapter
    /// modules. The process working directory is pinned here during
    /// initialization and intentionally never restored.
    pub sdk_dir: PathBuf,
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            sdk_dir: PathBuf::from("/opt/crsdk"),
        }
    }
}

/// Device selection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Preferred device id (hex of the raw identifier). When unset, the
    /// first enumerated device is used.
    pub device_id: Option<String>,

    /// Ask the vendor SDK to re-establish dropped connections on its own
    pub auto_reconnect: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            device_id: None,
            auto_reconnect: true,
        }
    }
}

/// Capture settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// How long to wait for the captured-file event before giving up on
    /// the result. The physical actuation is not cancelled by a timeout.
    pub timeout_secs: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Also write logs to a file
    pub log_to_file: bool,

    /// Log file path (used when log_to_file is enabled)
    pub log_file: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_to_file: false,
            log_file: PathBuf::from("camera-remote.log"),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine configuration directory")]
    ConfigDirNotFound,

    #[error("Failed to read config file {0}: {1}")]
    ReadError(PathBuf, String),

    #[error("Failed to parse config file {0}: {1}")]
    ParseError(PathBuf, String),

    #[error("Failed to write config file {0}: {1}")]
    WriteError(PathBuf, String),
}

impl Config {
    /// Load configuration from a specific file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(path.to_path_buf(), e.to_string()))?;

        toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))
    }

    /// Load configuration from the standard location.
    ///
    /// Returns the default configuration if no config file exists.
    pub fn load_default() -> Result<Self, ConfigError> {
        match get_config_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Save configuration to a specific file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| ConfigError::WriteError(path.to_path_buf(), e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::WriteError(path.to_path_buf(), e.to_string()))?;

        fs::write(path, contents)
            .map_err(|e| ConfigError::WriteError(path.to_path_buf(), e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.logging.level, "info");
        assert!(config.device.auto_reconnect);
        assert!(config.device.device_id.is_none());
        assert_eq!(config.capture.timeout_secs, 30);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.logging.level = "debug".to_string();
        config.device.device_id = Some("deadbeef".to_string());
        config.sdk.sdk_dir = PathBuf::from("/tmp/sdk");

        config.save(&path).unwrap();
        let loaded = Config::load(&path).unwrap();

        assert_eq!(loaded.logging.level, "debug");
        assert_eq!(loaded.device.device_id.as_deref(), Some("deadbeef"));
        assert_eq!(loaded.sdk.sdk_dir, PathBuf::from("/tmp/sdk"));
    }

    #[test]
    fn test_load_partial_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        // Only one section present, everything else should default
        fs::write(&path, "[logging]\nlevel = \"trace\"\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.logging.level, "trace");
        assert!(config.device.auto_reconnect);
    }

    #[test]
    fn test_load_invalid_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "not valid toml [[[").unwrap();

        assert!(matches!(
            Config::load(&path),
            Err(ConfigError::ParseError(_, _))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let path = PathBuf::from("/nonexistent/config.toml");
        assert!(matches!(
            Config::load(&path),
            Err(ConfigError::ReadError(_, _))
        ));
    }
}
