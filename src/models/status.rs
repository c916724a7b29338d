//! Derived mount status.

use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

/// The single primary state of a mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PrimaryState {
    #[serde(rename = "active")]
    Active,
    #[serde(rename = "inactive")]
    Inactive,
    #[serde(rename = "error:invalid-definition")]
    InvalidDefinition,
    #[serde(rename = "error:missing-target")]
    MissingTarget,
}

impl PrimaryState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrimaryState::Active => "active",
            PrimaryState::Inactive => "inactive",
            PrimaryState::InvalidDefinition => "error:invalid-definition",
            PrimaryState::MissingTarget => "error:missing-target",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(
            self,
            PrimaryState::InvalidDefinition | PrimaryState::MissingTarget
        )
    }
}

impl fmt::Display for PrimaryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Orthogonal flags on top of the primary state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Modifier {
    #[serde(rename = "startup-enabled")]
    StartupEnabled,
    #[serde(rename = "on-demand")]
    OnDemand,
}

impl Modifier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Modifier::StartupEnabled => "startup-enabled",
            Modifier::OnDemand => "on-demand",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MountStatus {
    pub state: PrimaryState,
    pub modifiers: BTreeSet<Modifier>,
    /// Mount unit file present in the unit directory.
    pub installed: bool,
    /// Installed content differs from the tracked definition.
    pub drift: bool,
    pub target: Option<PathBuf>,
    /// Validation message when the state is `error:invalid-definition`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue: Option<String>,
}

impl MountStatus {
    pub fn has(&self, modifier: Modifier) -> bool {
        self.modifiers.contains(&modifier)
    }
}

impl fmt::Display for MountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.state)?;
        for m in &self.modifiers {
            write!(f, " +{}", m.as_str())?;
        }
        if !self.installed {
            write!(f, " (not installed)")?;
        } else if self.drift {
            write!(f, " (drift)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(state: PrimaryState) -> MountStatus {
        MountStatus {
            state,
            modifiers: BTreeSet::new(),
            installed: true,
            drift: false,
            target: None,
            issue: None,
        }
    }

    #[test]
    fn test_display_labels() {
        assert_eq!(PrimaryState::MissingTarget.to_string(), "error:missing-target");
        assert_eq!(PrimaryState::Active.to_string(), "active");
    }

    #[test]
    fn test_display_with_modifiers() {
        let mut s = status(PrimaryState::Active);
        s.modifiers.insert(Modifier::OnDemand);
        s.modifiers.insert(Modifier::StartupEnabled);
        assert_eq!(s.to_string(), "active +startup-enabled +on-demand");
    }

    #[test]
    fn test_display_not_installed() {
        let mut s = status(PrimaryState::Inactive);
        s.installed = false;
        assert_eq!(s.to_string(), "inactive (not installed)");
    }

    #[test]
    fn test_serialize_state() {
        let json = serde_json::to_string(&PrimaryState::InvalidDefinition).unwrap();
        assert_eq!(json, "\"error:invalid-definition\"");
    }
}
