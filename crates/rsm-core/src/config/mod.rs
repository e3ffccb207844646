//! Configuration management for rsm

mod settings;

pub use settings::RsmConfig;

use crate::error::ConfigError;
use std::path::{Path, PathBuf};

/// Name of the config file looked up inside the work directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Get the default work directory (`~/.rsm`)
pub fn default_work_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".rsm")
}

/// Get the config file path for a work directory
pub fn config_path_in(work_dir: &Path) -> PathBuf {
    work_dir.join(CONFIG_FILE_NAME)
}

/// Load configuration from a file
pub fn load_config<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Invalid(format!("Failed to read config: {}", e)))?;

    let config: T = toml::from_str(&content)?;
    Ok(config)
}

/// Resolve the effective configuration.
///
/// An explicit `config_path` must exist. Otherwise `config.toml` inside the
/// work directory (`work_dir` or the default) is used when present, falling
/// back to defaults. `work_dir` always wins over the file's `work_dir`, and
/// the result is made absolute.
pub fn resolve_config(
    config_path: Option<&Path>,
    work_dir: Option<&Path>,
) -> Result<RsmConfig, ConfigError> {
    let mut config = match config_path {
        Some(path) => load_config::<RsmConfig>(path)?,
        None => {
            let dir = work_dir
                .map(Path::to_path_buf)
                .unwrap_or_else(default_work_dir);
            let path = config_path_in(&dir);
            if path.exists() {
                load_config(&path)?
            } else {
                RsmConfig::default()
            }
        }
    };

    if let Some(dir) = work_dir {
        config.work_dir = dir.to_path_buf();
    }
    config.work_dir = absolute(&config.work_dir);
    config.validate()?;

    Ok(config)
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}
