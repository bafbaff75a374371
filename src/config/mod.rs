//! Configuration module
//!
//! Handles application settings and device profiles

mod settings;

pub use settings::{AppConfig, ConfigError, DeviceProfile, LoggingConfig};

use directories::ProjectDirs;
use std::path::PathBuf;

/// Get the application configuration directory
pub fn config_dir() -> Option<PathBuf> {
    ProjectDirs::from("com", "labmon", "Labmon").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the application data directory
pub fn data_dir() -> Option<PathBuf> {
    ProjectDirs::from("com", "labmon", "Labmon").map(|dirs| dirs.data_dir().to_path_buf())
}

/// Get the default history directory
pub fn history_dir() -> Option<PathBuf> {
    data_dir().map(|d| d.join("history"))
}

/// Default configuration file path
pub fn config_file() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

/// Initialize application directories
pub fn init_directories() -> std::io::Result<()> {
    for dir in [config_dir(), data_dir(), history_dir()].into_iter().flatten() {
        std::fs::create_dir_all(&dir)?;
    }
    Ok(())
}
