//! Error taxonomy for the mount lifecycle core.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MountError {
    #[error("invalid mount name '{0}': only [A-Za-z0-9_.-] allowed")]
    InvalidName(String),

    #[error("unknown mount '{0}': no definition and no installed unit")]
    UnknownMount(String),

    #[error("invalid definition for '{name}': {reason}")]
    InvalidDefinition { name: String, reason: String },

    #[error("definition for '{name}' is still invalid: {reason}")]
    StillInvalid { name: String, reason: String },

    #[error("target directory for '{name}' does not exist: {}", path.display())]
    MissingTarget { name: String, path: PathBuf },

    #[error("{} is in use: {detail}", path.display())]
    ResourceBusy { path: PathBuf, detail: String },

    #[error("unit {0} is not installed")]
    NotInstalled(String),

    #[error("activation of {unit} failed: {detail}")]
    ActivationFailed { unit: String, detail: String },

    #[error("deactivation of {unit} failed: {detail}")]
    DeactivationFailed { unit: String, detail: String },

    #[error("enabling {unit} failed: {detail}")]
    EnableFailed { unit: String, detail: String },

    #[error("disabling {unit} failed: {detail}")]
    DisableFailed { unit: String, detail: String },

    #[error("automount {unit} failed: {detail}")]
    AutomountActivationFailed { unit: String, detail: String },

    #[error("cannot create directory {}: {source}", path.display())]
    DirectoryCreateFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("'{0}' requires root privileges. Run with sudo.")]
    PermissionDenied(String),

    #[error("config error: {0}")]
    ConfigIo(String),

    #[error("{action} {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl MountError {
    pub fn io(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MountError::Io {
            action,
            path: path.into(),
            source,
        }
    }

    /// Validation errors the caller can remediate without aborting the session.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            MountError::InvalidName(_)
                | MountError::InvalidDefinition { .. }
                | MountError::StillInvalid { .. }
                | MountError::MissingTarget { .. }
        )
    }

    /// Short identifier recorded in the action log.
    pub fn kind(&self) -> &'static str {
        match self {
            MountError::InvalidName(_) => "InvalidName",
            MountError::UnknownMount(_) => "UnknownMount",
            MountError::InvalidDefinition { .. } => "InvalidDefinition",
            MountError::StillInvalid { .. } => "StillInvalid",
            MountError::MissingTarget { .. } => "MissingTarget",
            MountError::ResourceBusy { .. } => "ResourceBusy",
            MountError::NotInstalled(_) => "NotInstalled",
            MountError::ActivationFailed { .. } => "ActivationFailed",
            MountError::DeactivationFailed { .. } => "DeactivationFailed",
            MountError::EnableFailed { .. } => "EnableFailed",
            MountError::DisableFailed { .. } => "DisableFailed",
            MountError::AutomountActivationFailed { .. } => "AutomountActivationFailed",
            MountError::DirectoryCreateFailed { .. } => "DirectoryCreateFailed",
            MountError::PermissionDenied(_) => "PermissionDenied",
            MountError::ConfigIo(_) => "ConfigIo",
            MountError::Io { .. } => "Io",
        }
    }
}

pub type Result<T> = std::result::Result<T, MountError>;
