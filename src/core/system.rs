//! Seams between the lifecycle core and the host system.
//!
//! `InitSystem` is implemented by [`crate::util::systemd::Systemctl`] and
//! `UsageProbe` by [`crate::util::in_use::ProcScanner`]; tests substitute fakes.

use std::path::Path;
use thiserror::Error;

/// A failed init-system call, with the command's own diagnostic output.
#[derive(Debug, Clone, Error)]
#[error("{command}: {detail}")]
pub struct SystemError {
    pub command: String,
    pub detail: String,
}

impl SystemError {
    pub fn new(command: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            detail: detail.into(),
        }
    }
}

pub trait InitSystem {
    fn is_active(&self, unit: &str) -> bool;
    fn is_enabled(&self, unit: &str) -> bool;
    fn start(&self, unit: &str) -> Result<(), SystemError>;
    fn stop(&self, unit: &str) -> Result<(), SystemError>;
    fn enable(&self, unit: &str) -> Result<(), SystemError>;
    fn disable(&self, unit: &str) -> Result<(), SystemError>;
    /// Re-read unit files from disk.
    fn reload(&self) -> Result<(), SystemError>;
    /// Human-readable status output, attached to activation failures.
    fn status_text(&self, unit: &str) -> String;
}

/// A process holding a file, directory, or working directory under a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Holder {
    pub pid: u32,
    pub command: String,
}

impl std::fmt::Display for Holder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (pid {})", self.command, self.pid)
    }
}

pub trait UsageProbe {
    /// Processes with open handles under `path`. Empty when the path is free.
    fn holders(&self, path: &Path) -> std::io::Result<Vec<Holder>>;
}
