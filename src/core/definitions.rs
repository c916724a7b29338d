//! Writes to the tracked definition store.
//!
//! Definitions are always rendered from validated fields, so the store
//! only ever gains well-formed files through this module.

use crate::core::context::MountContext;
use crate::core::error::{MountError, Result};
use crate::core::reconciler::{unit_stem, validate_name};
use crate::core::unit_dir::UnitKind;
use crate::models::definition::{parse_unit, MountDefinition, RawMount};

fn invalid(name: &str, reason: impl ToString) -> MountError {
    MountError::InvalidDefinition {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}

/// Validate and write a new definition. An existing definition of the
/// same name is left alone; change it with [`update`].
pub fn create(ctx: &MountContext<'_>, name: &str, raw: RawMount) -> Result<MountDefinition> {
    validate_name(name)?;
    if ctx.definitions.exists(name, UnitKind::Mount) {
        return Err(invalid(name, "a definition with this name already exists"));
    }
    write(ctx, name, raw)
}

fn write(ctx: &MountContext<'_>, name: &str, raw: RawMount) -> Result<MountDefinition> {
    let def = raw.validate(name).map_err(|issue| invalid(name, issue))?;
    ctx.definitions
        .write_if_changed(name, UnitKind::Mount, &def.render())?;
    tracing::info!(name, "definition written");
    Ok(def)
}

/// Apply the fields set in `patch` to an existing definition.
///
/// A definition too broken to parse is rebuilt from the patch alone.
pub fn update(ctx: &MountContext<'_>, name: &str, patch: RawMount) -> Result<MountDefinition> {
    validate_name(name)?;
    let current = ctx
        .definitions
        .read(name, UnitKind::Mount)?
        .ok_or_else(|| MountError::UnknownMount(name.to_string()))?;
    let base = match parse_unit(&current) {
        Ok(raw) => raw,
        Err(issue) => {
            tracing::warn!(name, %issue, "existing definition unparseable, rebuilding from edit");
            RawMount::default()
        }
    };
    let def = write(ctx, name, base.merge(patch))?;

    let old_stem = unit_stem(name, Some(&current));
    if old_stem != def.unit_stem() && ctx.installed.exists(&old_stem, UnitKind::Mount) {
        tracing::warn!(
            name,
            installed = %old_stem,
            "Where changed while the old unit is installed; deactivate before activating again"
        );
    }
    Ok(def)
}

pub fn load(ctx: &MountContext<'_>, name: &str) -> Result<MountDefinition> {
    validate_name(name)?;
    let content = ctx
        .definitions
        .read(name, UnitKind::Mount)?
        .ok_or_else(|| MountError::UnknownMount(name.to_string()))?;
    MountDefinition::parse(name, &content).map_err(|issue| invalid(name, issue))
}

/// Delete the definition file. Installed units stay where they are.
pub fn remove(ctx: &MountContext<'_>, name: &str) -> Result<()> {
    validate_name(name)?;
    if !ctx.definitions.remove(name, UnitKind::Mount)? {
        return Err(MountError::UnknownMount(name.to_string()));
    }
    tracing::info!(name, "definition removed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::reconciler::compute_status;
    use crate::core::testing::{FakeInit, FakeProbe};
    use crate::models::config::AppConfig;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn raw(what: &str, target: &str) -> RawMount {
        RawMount {
            what: Some(what.into()),
            r#where: Some(target.into()),
            fs_type: Some("cifs".into()),
            options: Some("credentials=/root/.nas1.cred".into()),
            description: None,
        }
    }

    fn setup() -> (TempDir, AppConfig, FakeInit, FakeProbe) {
        let dir = TempDir::new().unwrap();
        let config = AppConfig::under(dir.path());
        let init = FakeInit::new(&config.unit_dir);
        (dir, config, init, FakeProbe::default())
    }

    #[test]
    fn test_create_then_load_keeps_fields() {
        let (_dir, config, init, probe) = setup();
        let ctx = MountContext::new(&config, &init, &probe);
        let created = create(&ctx, "nas1", raw("//192.168.1.10/share", "/custom-mounts/nas1")).unwrap();
        let loaded = load(&ctx, "nas1").unwrap();
        assert_eq!(loaded, created);
        assert_eq!(loaded.what, "//192.168.1.10/share");
        assert_eq!(loaded.r#where, PathBuf::from("/custom-mounts/nas1"));
        assert_eq!(loaded.fs_type, "cifs");
        assert_eq!(loaded.options, "credentials=/root/.nas1.cred");
    }

    #[test]
    fn test_create_refuses_existing_definition() {
        let (_dir, config, init, probe) = setup();
        let ctx = MountContext::new(&config, &init, &probe);
        create(&ctx, "nas1", raw("//srv/a", "/custom-mounts/nas1")).unwrap();
        let err = create(&ctx, "nas1", raw("//srv/b", "/custom-mounts/nas1")).unwrap_err();
        assert!(matches!(err, MountError::InvalidDefinition { .. }));
        assert_eq!(load(&ctx, "nas1").unwrap().what, "//srv/a");
    }

    #[test]
    fn test_create_rejects_reserved_target() {
        let (_dir, config, init, probe) = setup();
        let ctx = MountContext::new(&config, &init, &probe);
        let err = create(&ctx, "home", raw("/dev/sdb1", "/home")).unwrap_err();
        assert!(matches!(err, MountError::InvalidDefinition { .. }));
        assert!(!ctx.definitions.exists("home", UnitKind::Mount));
    }

    #[test]
    fn test_create_rejects_bad_name() {
        let (_dir, config, init, probe) = setup();
        let ctx = MountContext::new(&config, &init, &probe);
        let err = create(&ctx, "a/b", raw("/dev/sdb1", "/mnt/x")).unwrap_err();
        assert!(matches!(err, MountError::InvalidName(_)));
    }

    #[test]
    fn test_update_changes_only_given_fields() {
        let (_dir, config, init, probe) = setup();
        let ctx = MountContext::new(&config, &init, &probe);
        create(&ctx, "nas1", raw("//srv/a", "/custom-mounts/nas1")).unwrap();
        let updated = update(
            &ctx,
            "nas1",
            RawMount {
                what: Some("//srv/b".into()),
                ..RawMount::default()
            },
        )
        .unwrap();
        assert_eq!(updated.what, "//srv/b");
        assert_eq!(updated.r#where, PathBuf::from("/custom-mounts/nas1"));
    }

    #[test]
    fn test_update_repairs_malformed_file() {
        let (_dir, config, init, probe) = setup();
        let ctx = MountContext::new(&config, &init, &probe);
        fs::create_dir_all(&config.definitions_dir).unwrap();
        fs::write(config.definitions_dir.join("nas3.mount"), "garbage\n").unwrap();
        let def = update(&ctx, "nas3", raw("//srv/c", "/custom-mounts/nas3")).unwrap();
        assert_eq!(def.what, "//srv/c");
    }

    #[test]
    fn test_update_unknown() {
        let (_dir, config, init, probe) = setup();
        let ctx = MountContext::new(&config, &init, &probe);
        let err = update(&ctx, "ghost", RawMount::default()).unwrap_err();
        assert!(matches!(err, MountError::UnknownMount(_)));
    }

    #[test]
    fn test_remove_leaves_installed_unit() {
        let (dir, config, init, probe) = setup();
        let ctx = MountContext::new(&config, &init, &probe);
        let target = dir.path().join("t");
        fs::create_dir_all(&target).unwrap();
        let def = create(&ctx, "nas1", raw("//srv/a", target.to_str().unwrap())).unwrap();
        fs::create_dir_all(&config.unit_dir).unwrap();
        let installed = config.unit_dir.join(def.unit_name());
        fs::write(&installed, def.render()).unwrap();
        assert!(compute_status(&ctx, "nas1").unwrap().installed);

        remove(&ctx, "nas1").unwrap();
        assert!(installed.exists());
        assert!(matches!(remove(&ctx, "nas1").unwrap_err(), MountError::UnknownMount(_)));
    }
}
