//! Centralized constants for permissions, paths, and limits.

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/mountkeeper/config.toml";

/// Environment variable overriding the configuration file location.
pub const CONFIG_ENV: &str = "MOUNTKEEPER_CONFIG";

/// Environment variable holding the tracing filter.
pub const LOG_ENV: &str = "MOUNTKEEPER_LOG";

/// Default directory holding tracked mount definitions.
pub const DEFAULT_DEFINITIONS_DIR: &str = "/etc/mountkeeper/units";

/// Directory systemd loads administrator units from.
pub const DEFAULT_UNIT_DIR: &str = "/etc/systemd/system";

/// Default base directory for new mount targets.
pub const DEFAULT_MOUNT_BASE: &str = "/custom-mounts";

/// Default directory for credential files.
pub const DEFAULT_CREDENTIAL_ROOT: &str = "/root";

/// Default directory for the action log and its lock.
pub const DEFAULT_STATE_DIR: &str = "/var/lib/mountkeeper";

/// Permission mode for credential files.
pub const CRED_FILE_MODE: u32 = 0o600;

/// Permission mode for a freshly created credential root.
pub const CRED_DIR_MODE: u32 = 0o700;

/// Permission mode for the config file.
pub const CONFIG_FILE_MODE: u32 = 0o644;

/// Permission mode for the action log.
pub const ACTION_LOG_MODE: u32 = 0o640;

/// Permission mode for installed unit files and definitions.
pub const UNIT_FILE_MODE: u32 = 0o644;

/// Permission mode for the state and definitions directories.
pub const STATE_DIR_MODE: u32 = 0o755;

/// Maximum secret size in bytes.
pub const MAX_SECRET_SIZE: usize = 4096;

/// File extension for mount units.
pub const MOUNT_EXTENSION: &str = "mount";

/// File extension for automount units.
pub const AUTOMOUNT_EXTENSION: &str = "automount";

/// Filesystem types that need the network before mounting.
pub const NETWORK_FS_TYPES: &[&str] = &["cifs", "smb3", "nfs", "nfs4", "sshfs", "fuse.sshfs"];

/// Mount targets that definitions may never point at.
pub const RESERVED_TARGETS: &[&str] = &[
    "/", "/bin", "/boot", "/dev", "/etc", "/home", "/lib", "/lib32", "/lib64", "/opt", "/proc",
    "/root", "/run", "/sbin", "/srv", "/sys", "/tmp", "/usr", "/var",
];
