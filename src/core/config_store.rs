//! Locating, loading and saving the configuration file.

use crate::constants;
use crate::core::error::{MountError, Result};
use crate::models::config::AppConfig;
use crate::util::fs as mk_fs;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// `--config` flag, then `MOUNTKEEPER_CONFIG`, then the system default.
pub fn resolve_path(flag: Option<PathBuf>) -> PathBuf {
    if let Some(path) = flag {
        return path;
    }
    match env::var(constants::CONFIG_ENV) {
        Ok(path) if !path.is_empty() => PathBuf::from(path),
        _ => PathBuf::from(constants::DEFAULT_CONFIG_PATH),
    }
}

/// Missing file means defaults.
pub fn load(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        return Ok(AppConfig::default());
    }
    let content = fs::read_to_string(path)
        .map_err(|e| MountError::ConfigIo(format!("read {}: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| MountError::ConfigIo(format!("parse {}: {}", path.display(), e)))
}

pub fn save(path: &Path, config: &AppConfig) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| MountError::ConfigIo(format!("serialize config: {}", e)))?;
    mk_fs::write_atomic(path, content.as_bytes(), constants::CONFIG_FILE_MODE)
        .map_err(|e| MountError::ConfigIo(format!("write {}: {}", path.display(), e)))?;
    tracing::info!(path = %path.display(), "config saved");
    Ok(())
}
