//! Status of a mount, derived from its definition, its installed unit,
//! and what the init system reports. Read-only.
//!
//! A mount is known by its definition name. Its installed unit files are
//! named after the escaped `Where` (`/mnt/nas1` is `mnt-nas1.mount`), as
//! systemd requires; a mount with no definition is known by its file stem.

use crate::core::context::MountContext;
use crate::core::error::{MountError, Result};
use crate::core::unit_dir::{content_digest, UnitKind};
use crate::models::definition::{
    automount_unit_name, escape_unit_path, find_where, is_valid_name, mount_unit_name,
    DefinitionIssue, MountDefinition,
};
use crate::models::status::{Modifier, MountStatus, PrimaryState};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// The two sides of a mount as found on disk.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub name: String,
    /// Stem of the installed unit files.
    pub stem: String,
    /// Content of the tracked definition file.
    pub definition: Option<String>,
    /// Content of the installed mount unit.
    pub installed: Option<String>,
}

impl Resolved {
    pub fn unit(&self) -> String {
        mount_unit_name(&self.stem)
    }

    pub fn automount_unit(&self) -> String {
        automount_unit_name(&self.stem)
    }

    /// The content lifecycle operations act on: the tracked definition when
    /// there is one, otherwise the installed unit. Second value is whether
    /// it came from the definition store.
    pub fn source(&self) -> (&str, bool) {
        match (&self.definition, &self.installed) {
            (Some(d), _) => (d.as_str(), true),
            (None, Some(i)) => (i.as_str(), false),
            (None, None) => ("", false),
        }
    }

    /// The first structurally valid side, preferring the definition store.
    pub fn effective(&self) -> std::result::Result<MountDefinition, DefinitionIssue> {
        let from_definition = self
            .definition
            .as_deref()
            .map(|c| MountDefinition::parse(&self.name, c));
        let from_installed = self
            .installed
            .as_deref()
            .map(|c| MountDefinition::parse(&self.name, c));

        match (from_definition, from_installed) {
            (Some(Ok(def)), _) => Ok(def),
            (_, Some(Ok(def))) => Ok(def),
            (Some(Err(issue)), _) => Err(issue),
            (None, Some(Err(issue))) => Err(issue),
            (None, None) => Err(DefinitionIssue::MissingKey("What")),
        }
    }

    /// The definition lifecycle operations will install, validated.
    pub fn source_definition(&self) -> Result<MountDefinition> {
        let (content, _) = self.source();
        MountDefinition::parse(&self.name, content).map_err(|issue| MountError::InvalidDefinition {
            name: self.name.clone(),
            reason: issue.to_string(),
        })
    }

    /// Where the mount is attached, preferring what is installed. Read
    /// without validation so a broken or reserved unit still has one.
    pub fn mount_point(&self) -> Option<PathBuf> {
        self.installed
            .as_deref()
            .and_then(find_where)
            .or_else(|| self.definition.as_deref().and_then(find_where))
    }

    pub fn drift(&self) -> bool {
        match (&self.definition, &self.installed) {
            (Some(d), Some(i)) => content_digest(d) != content_digest(i),
            _ => false,
        }
    }
}

pub fn validate_name(name: &str) -> Result<()> {
    if is_valid_name(name) {
        Ok(())
    } else {
        Err(MountError::InvalidName(name.to_string()))
    }
}

/// Installed stem for `name`: the escaped `Where` of its definition, or
/// the name itself when there is no usable definition.
pub fn unit_stem(name: &str, definition: Option<&str>) -> String {
    definition
        .and_then(find_where)
        .map(|target| escape_unit_path(&target))
        .unwrap_or_else(|| name.to_string())
}

/// Read both sides of `name`. Fails when neither exists.
pub fn resolve(ctx: &MountContext<'_>, name: &str) -> Result<Resolved> {
    validate_name(name)?;
    let definition = ctx.definitions.read(name, UnitKind::Mount)?;
    let stem = unit_stem(name, definition.as_deref());
    let installed = ctx.installed.read(&stem, UnitKind::Mount)?;
    if definition.is_none() && installed.is_none() {
        return Err(MountError::UnknownMount(name.to_string()));
    }
    Ok(Resolved {
        name: name.to_string(),
        stem,
        definition,
        installed,
    })
}

pub fn compute_status(ctx: &MountContext<'_>, name: &str) -> Result<MountStatus> {
    let resolved = resolve(ctx, name)?;
    Ok(status_of(ctx, &resolved))
}

pub fn status_of(ctx: &MountContext<'_>, resolved: &Resolved) -> MountStatus {
    let unit = resolved.unit();
    let automount = resolved.automount_unit();

    let (state, target, issue) = match resolved.effective() {
        Err(issue) => (PrimaryState::InvalidDefinition, None, Some(issue.to_string())),
        Ok(def) if !def.r#where.exists() => (PrimaryState::MissingTarget, Some(def.r#where), None),
        Ok(def) if ctx.init.is_active(&unit) => (PrimaryState::Active, Some(def.r#where), None),
        Ok(def) => (PrimaryState::Inactive, Some(def.r#where), None),
    };

    let mut modifiers = BTreeSet::new();
    if ctx.init.is_enabled(&unit) {
        modifiers.insert(Modifier::StartupEnabled);
    }
    if ctx.installed.exists(&resolved.stem, UnitKind::Automount)
        && (ctx.init.is_active(&automount) || ctx.init.is_enabled(&automount))
    {
        modifiers.insert(Modifier::OnDemand);
    }

    MountStatus {
        state,
        modifiers,
        installed: resolved.installed.is_some(),
        drift: resolved.drift(),
        target,
        issue,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::{FakeInit, FakeProbe};
    use crate::models::config::AppConfig;
    use std::fs;
    use tempfile::TempDir;

    struct Env {
        dir: TempDir,
        config: AppConfig,
        init: FakeInit,
        probe: FakeProbe,
    }

    impl Env {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let config = AppConfig::under(dir.path());
            fs::create_dir_all(&config.definitions_dir).unwrap();
            fs::create_dir_all(&config.unit_dir).unwrap();
            let init = FakeInit::new(&config.unit_dir);
            Self {
                dir,
                config,
                init,
                probe: FakeProbe::default(),
            }
        }

        fn ctx(&self) -> MountContext<'_> {
            MountContext::new(&self.config, &self.init, &self.probe)
        }

        fn target(&self, name: &str) -> PathBuf {
            self.dir.path().join("mounts").join(name)
        }

        fn stem(&self, name: &str) -> String {
            escape_unit_path(&self.target(name))
        }

        fn unit(&self, name: &str, make_target: bool) -> String {
            let target = self.target(name);
            if make_target {
                fs::create_dir_all(&target).unwrap();
            }
            format!(
                "[Mount]\nWhat=//server/{}\nWhere={}\nType=cifs\n",
                name,
                target.display()
            )
        }

        fn define(&self, name: &str, content: &str) {
            fs::write(self.config.definitions_dir.join(format!("{}.mount", name)), content).unwrap();
        }

        fn install(&self, stem: &str, content: &str) {
            fs::write(self.config.unit_dir.join(format!("{}.mount", stem)), content).unwrap();
        }
    }

    #[test]
    fn test_invalid_name() {
        let env = Env::new();
        let err = compute_status(&env.ctx(), "bad/name").unwrap_err();
        assert!(matches!(err, MountError::InvalidName(_)));
    }

    #[test]
    fn test_unknown_mount() {
        let env = Env::new();
        let err = compute_status(&env.ctx(), "ghost").unwrap_err();
        assert!(matches!(err, MountError::UnknownMount(_)));
    }

    #[test]
    fn test_invalid_definition_wins_over_everything() {
        let env = Env::new();
        env.define("broken", "[Mount]\nWhere=/mnt/broken\n");
        env.init.set_active("mnt-broken.mount");
        let status = compute_status(&env.ctx(), "broken").unwrap();
        assert_eq!(status.state, PrimaryState::InvalidDefinition);
        assert!(status.issue.unwrap().contains("What"));
    }

    #[test]
    fn test_missing_target() {
        let env = Env::new();
        env.define("nas2", &env.unit("nas2", false));
        let status = compute_status(&env.ctx(), "nas2").unwrap();
        assert_eq!(status.state, PrimaryState::MissingTarget);
        assert_eq!(status.target, Some(env.target("nas2")));
    }

    #[test]
    fn test_inactive_when_not_installed() {
        let env = Env::new();
        env.define("nas1", &env.unit("nas1", true));
        let status = compute_status(&env.ctx(), "nas1").unwrap();
        assert_eq!(status.state, PrimaryState::Inactive);
        assert!(!status.installed);
        assert!(!status.drift);
    }

    #[test]
    fn test_active_with_modifiers() {
        let env = Env::new();
        let content = env.unit("nas1", true);
        let stem = env.stem("nas1");
        env.define("nas1", &content);
        env.install(&stem, &content);
        fs::write(env.config.unit_dir.join(format!("{}.automount", stem)), "[Automount]\n").unwrap();
        env.init.set_active(&format!("{}.mount", stem));
        env.init.set_enabled(&format!("{}.mount", stem));
        env.init.set_active(&format!("{}.automount", stem));

        let status = compute_status(&env.ctx(), "nas1").unwrap();
        assert_eq!(status.state, PrimaryState::Active);
        assert!(status.has(Modifier::StartupEnabled));
        assert!(status.has(Modifier::OnDemand));
        assert!(status.installed);
    }

    #[test]
    fn test_on_demand_requires_installed_automount() {
        let env = Env::new();
        env.define("nas1", &env.unit("nas1", true));
        env.init.set_active(&format!("{}.automount", env.stem("nas1")));
        let status = compute_status(&env.ctx(), "nas1").unwrap();
        assert!(!status.has(Modifier::OnDemand));
    }

    #[test]
    fn test_system_only_mount_uses_installed_content() {
        let env = Env::new();
        env.install("legacy", &env.unit("legacy", true));
        let status = compute_status(&env.ctx(), "legacy").unwrap();
        assert_eq!(status.state, PrimaryState::Inactive);
        assert!(status.installed);
    }

    #[test]
    fn test_valid_installed_side_covers_broken_definition() {
        let env = Env::new();
        env.define("nas1", "[Mount]\nWhat=\n");
        env.install("nas1", &env.unit("nas1", true));
        let status = compute_status(&env.ctx(), "nas1").unwrap();
        assert_eq!(status.state, PrimaryState::Inactive);
        assert!(status.drift);
    }

    #[test]
    fn test_drift_detected() {
        let env = Env::new();
        let content = env.unit("nas1", true);
        env.define("nas1", &content);
        env.install(&env.stem("nas1"), &content.replace("cifs", "smb3"));
        let status = compute_status(&env.ctx(), "nas1").unwrap();
        assert!(status.drift);
    }

    #[test]
    fn test_installed_unit_named_after_target() {
        let env = Env::new();
        let content = env.unit("nas1", true);
        env.define("nas1", &content);
        env.install("nas1", &content);
        let resolved = resolve(&env.ctx(), "nas1").unwrap();
        assert_eq!(resolved.unit(), format!("{}.mount", env.stem("nas1")));
        assert!(resolved.installed.is_none());

        env.install(&env.stem("nas1"), &content);
        assert!(compute_status(&env.ctx(), "nas1").unwrap().installed);
    }

    #[test]
    fn test_unit_stem_falls_back_to_name() {
        assert_eq!(unit_stem("legacy", None), "legacy");
        assert_eq!(unit_stem("nas1", Some("[Mount]\nWhat=x\n")), "nas1");
        assert_eq!(unit_stem("nas1", Some("[Mount]\nWhere=/mnt/nas1\n")), "mnt-nas1");
    }

    #[test]
    fn test_mount_point_of_broken_unit() {
        let env = Env::new();
        let target = env.target("legacy");
        env.install("legacy", &format!("[Mount]\nWhat=/dev/sdc1\nstray\nWhere={}\n", target.display()));
        env.install("home", "[Mount]\nWhat=/dev/sdd1\nWhere=/home\n");
        let legacy = resolve(&env.ctx(), "legacy").unwrap();
        assert!(legacy.effective().is_err());
        assert_eq!(legacy.mount_point(), Some(target));
        let home = resolve(&env.ctx(), "home").unwrap();
        assert_eq!(home.mount_point(), Some(PathBuf::from("/home")));
    }

    #[test]
    fn test_binary_definition_is_invalid() {
        let env = Env::new();
        fs::write(env.config.definitions_dir.join("bad.mount"), b"\xff\xfe").unwrap();
        let status = compute_status(&env.ctx(), "bad").unwrap();
        assert_eq!(status.state, PrimaryState::InvalidDefinition);
    }

    #[test]
    fn test_valid_definitions_never_invalid() {
        let env = Env::new();
        let cases = [
            ("a", "[Mount]\nWhat=/dev/sda1\nWhere=/data/a\n"),
            ("b", "[Unit]\nDescription=b\n[Mount]\nWhat=srv:/export\nWhere=/data/b\nType=nfs\n"),
            ("c", "[Mount]\nWhere=/data/c\nWhat=tmpfs\nOptions=\n[Install]\nWantedBy=x\n"),
        ];
        for (name, content) in cases {
            env.define(name, content);
            let status = compute_status(&env.ctx(), name).unwrap();
            assert_ne!(status.state, PrimaryState::InvalidDefinition, "{}", name);
        }
    }
}
