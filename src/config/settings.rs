//! Application settings and device profiles

use crate::core::logger::LogFormat;
use crate::core::monitor::MonitorConfig;
use crate::core::simulator::SimulatorConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Could not determine the platform config directory
    #[error("Could not determine config directory")]
    NoConfigDir,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid TOML
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Serialization failed
    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Simulated instrument defaults
    pub simulator: SimulatorConfig,
    /// Sampling and stability settings
    pub monitor: MonitorConfig,
    /// Logging settings
    pub logging: LoggingConfig,
    /// Devices registered at startup
    pub devices: Vec<DeviceProfile>,
}

impl AppConfig {
    /// Load config from the default location; defaults if the file is absent
    pub fn load() -> Result<Self, ConfigError> {
        let path = super::config_file().ok_or(ConfigError::NoConfigDir)?;
        Self::load_from(&path)
    }

    /// Load config from `path`; defaults if the file is absent
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&content)?)
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = super::config_file().ok_or(ConfigError::NoConfigDir)?;
        self.save_to(&path)
    }

    /// Save config to `path`
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Render as pretty TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// History file: `logging.history_path`, else `history.<ext>` in the
    /// platform history directory, which is created if missing
    pub fn history_file(&self) -> Result<PathBuf, ConfigError> {
        if let Some(path) = &self.logging.history_path {
            return Ok(path.clone());
        }
        super::init_directories()?;
        let dir = super::history_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(dir.join(format!(
            "history.{}",
            self.logging.history_format.extension()
        )))
    }

    /// Device profiles, or a single default device when none are configured
    pub fn device_profiles(&self) -> Vec<DeviceProfile> {
        if self.devices.is_empty() {
            vec![DeviceProfile::new("dev1")]
        } else {
            self.devices.clone()
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default tracing level (overridden by `RUST_LOG`)
    pub level: String,
    /// Emit tracing output as JSON
    pub json: bool,
    /// History file; a file in the platform data directory when unset
    pub history_path: Option<PathBuf>,
    /// History file format
    pub history_format: LogFormat,
    /// In-memory history capacity, used when no history file can be opened
    pub max_records: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            history_path: None,
            history_format: LogFormat::Csv,
            max_records: 10000,
        }
    }
}

/// Device profile
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceProfile {
    /// Registry identifier
    pub id: String,
    /// Reading override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_reading: Option<f64>,
    /// Identity override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
}

impl DeviceProfile {
    /// Create a profile using simulator defaults
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            initial_reading: None,
            identity: None,
        }
    }

    /// Simulator configuration for this device, layered over `base`
    pub fn simulator_config(&self, base: &SimulatorConfig) -> SimulatorConfig {
        let mut config = base.clone();
        if let Some(reading) = self.initial_reading {
            config.initial_reading = reading;
        }
        if let Some(identity) = &self.identity {
            config.identity = identity.clone();
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.monitor.stability_threshold, 0.5);
        assert_eq!(config.monitor.outlier_sigma, 3.0);
        assert_eq!(config.monitor.stability_window, 5);
        assert_eq!(config.simulator.drift, 0.5);
        assert_eq!(config.device_profiles(), vec![DeviceProfile::new("dev1")]);
    }

    #[test]
    fn test_partial_file() {
        let config: AppConfig = toml::from_str(
            r#"
            [monitor]
            stability_threshold = 0.2

            [[devices]]
            id = "bath"
            initial_reading = 37.0
            "#,
        )
        .unwrap();
        assert_eq!(config.monitor.stability_threshold, 0.2);
        assert_eq!(config.monitor.interval_ms, 1000);
        let profile = &config.devices[0];
        let sim = profile.simulator_config(&config.simulator);
        assert_eq!(sim.initial_reading, 37.0);
        assert_eq!(sim.identity, config.simulator.identity);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = AppConfig::default();
        config.logging.history_format = LogFormat::JsonLines;
        config.devices.push(DeviceProfile::new("dev2"));
        config.save_to(&path).unwrap();
        assert_eq!(AppConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_history_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.logging.history_path = Some(dir.path().join("runs.csv"));
        assert_eq!(config.history_file().unwrap(), dir.path().join("runs.csv"));

        config.logging.history_path = None;
        config.logging.history_format = LogFormat::JsonLines;
        // platform directories may be unavailable in a sandbox
        if let Ok(path) = config.history_file() {
            assert!(path.ends_with("history/history.jsonl"));
            assert!(path.parent().unwrap().is_dir());
        }
    }
}
