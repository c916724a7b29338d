//! Systemd mount-unit lifecycle manager.
//!
//! Keeps mount definitions in a tracked directory, installs them into the
//! system unit directory, and drives them through systemd: activate,
//! deactivate, enable at boot, on-demand automount.
//!
//! ## Modules
//! - `cli`: Command-line handlers
//! - `core`: Status reconciliation, lifecycle operations, stores, action log
//! - `models`: Definitions, status, configuration, credentials
//! - `util`: Host integration (systemctl, /proc, journald, fs)

pub mod cli;
pub mod constants;
pub mod core;
pub mod models;
pub mod util;
