//! Host integration: filesystem, systemctl, /proc, journald, privileges.

pub mod fs;
pub mod in_use;
pub mod journald;
pub mod path;
pub mod privilege;
pub mod systemd;
