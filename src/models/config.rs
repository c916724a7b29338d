//! Persisted tool configuration.

use crate::constants;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Flat key/value configuration, one TOML key per setting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_definitions_dir")]
    pub definitions_dir: PathBuf,
    #[serde(default = "default_unit_dir")]
    pub unit_dir: PathBuf,
    #[serde(default = "default_mount_base")]
    pub mount_base: PathBuf,
    #[serde(default = "default_credential_root")]
    pub credential_root: PathBuf,
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
    /// Forward action-log entries to journald.
    #[serde(default)]
    pub journald_audit: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            definitions_dir: default_definitions_dir(),
            unit_dir: default_unit_dir(),
            mount_base: default_mount_base(),
            credential_root: default_credential_root(),
            state_dir: default_state_dir(),
            journald_audit: false,
        }
    }
}

/// Keys accepted by `config set`.
pub const CONFIG_KEYS: &[&str] = &[
    "definitions_dir",
    "unit_dir",
    "mount_base",
    "credential_root",
    "state_dir",
    "journald_audit",
];

impl AppConfig {
    /// Set a single key from its textual value.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), String> {
        match key {
            "journald_audit" => {
                self.journald_audit = value
                    .parse()
                    .map_err(|_| format!("'{}' is not a boolean (true|false)", value))?;
            }
            "definitions_dir" | "unit_dir" | "mount_base" | "credential_root" | "state_dir" => {
                let path = PathBuf::from(value);
                if !path.is_absolute() {
                    return Err(format!("{} must be an absolute path", key));
                }
                match key {
                    "definitions_dir" => self.definitions_dir = path,
                    "unit_dir" => self.unit_dir = path,
                    "mount_base" => self.mount_base = path,
                    "credential_root" => self.credential_root = path,
                    _ => self.state_dir = path,
                }
            }
            other => {
                return Err(format!(
                    "unknown key '{}', must be one of: {}",
                    other,
                    CONFIG_KEYS.join(", ")
                ))
            }
        }
        Ok(())
    }

    /// All settings as `(key, value)` pairs in a fixed order.
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        vec![
            ("definitions_dir", self.definitions_dir.display().to_string()),
            ("unit_dir", self.unit_dir.display().to_string()),
            ("mount_base", self.mount_base.display().to_string()),
            ("credential_root", self.credential_root.display().to_string()),
            ("state_dir", self.state_dir.display().to_string()),
            ("journald_audit", self.journald_audit.to_string()),
        ]
    }

    pub fn action_log_path(&self) -> PathBuf {
        self.state_dir.join("actions.log")
    }

    pub fn action_lock_path(&self) -> PathBuf {
        self.state_dir.join("actions.lock")
    }

    /// Configuration rooted entirely inside `root`, used by tests.
    pub fn under(root: &std::path::Path) -> Self {
        Self {
            definitions_dir: root.join("definitions"),
            unit_dir: root.join("system"),
            mount_base: root.join("mounts"),
            credential_root: root.join("creds"),
            state_dir: root.join("state"),
            journald_audit: false,
        }
    }
}

fn default_definitions_dir() -> PathBuf {
    PathBuf::from(constants::DEFAULT_DEFINITIONS_DIR)
}

fn default_unit_dir() -> PathBuf {
    PathBuf::from(constants::DEFAULT_UNIT_DIR)
}

fn default_mount_base() -> PathBuf {
    PathBuf::from(constants::DEFAULT_MOUNT_BASE)
}

fn default_credential_root() -> PathBuf {
    PathBuf::from(constants::DEFAULT_CREDENTIAL_ROOT)
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(constants::DEFAULT_STATE_DIR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_keys_use_defaults() {
        let cfg: AppConfig = toml::from_str("mount_base = \"/mnt\"\n").unwrap();
        assert_eq!(cfg.mount_base, PathBuf::from("/mnt"));
        assert_eq!(cfg.unit_dir, PathBuf::from(constants::DEFAULT_UNIT_DIR));
        assert!(!cfg.journald_audit);
    }

    #[test]
    fn test_set_path_key() {
        let mut cfg = AppConfig::default();
        cfg.set("definitions_dir", "/srv/units").unwrap();
        assert_eq!(cfg.definitions_dir, PathBuf::from("/srv/units"));
    }

    #[test]
    fn test_set_rejects_relative_path() {
        let mut cfg = AppConfig::default();
        assert!(cfg.set("mount_base", "mnt").is_err());
    }

    #[test]
    fn test_set_bool_key() {
        let mut cfg = AppConfig::default();
        cfg.set("journald_audit", "true").unwrap();
        assert!(cfg.journald_audit);
        assert!(cfg.set("journald_audit", "yes").is_err());
    }

    #[test]
    fn test_set_unknown_key() {
        let mut cfg = AppConfig::default();
        let err = cfg.set("color", "red").unwrap_err();
        assert!(err.contains("unknown key"));
    }

    #[test]
    fn test_entries_cover_all_keys() {
        let keys: Vec<_> = AppConfig::default().entries().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, CONFIG_KEYS);
    }
}
