//! Root checks for commands that touch system state.

use crate::core::error::MountError;

pub fn is_root() -> bool {
    nix::unistd::geteuid().is_root()
}

/// Fail with `PermissionDenied` unless running as root.
pub fn require_root(command: &str) -> Result<(), MountError> {
    if !is_root() {
        return Err(MountError::PermissionDenied(command.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_root_matches_euid() {
        assert_eq!(require_root("activate").is_ok(), is_root());
    }
}
