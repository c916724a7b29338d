//! State transitions for a single mount.
//!
//! Every operation runs its file changes through a [`Transaction`]: at most
//! one init-system reload per operation, and only when a unit file was
//! actually added, changed, or removed. On failure the touched files are
//! put back, and the init system reloaded again if it had seen them.

use crate::core::context::MountContext;
use crate::core::error::{MountError, Result};
use crate::core::reconciler;
use crate::core::system::{InitSystem, SystemError};
use crate::core::unit_dir::{UnitDir, UnitKind};
use crate::models::definition::MountDefinition;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, Default)]
pub struct ActivateOptions {
    pub enable_at_boot: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AutomountOptions {
    /// `TimeoutIdleSec=` for the automount unit.
    pub idle_timeout: Option<u32>,
}

/// What an operation did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outcome {
    pub unit: String,
    pub changed: Vec<PathBuf>,
    pub reloaded: bool,
}

struct SavedFile {
    stem: String,
    kind: UnitKind,
    previous: Option<Vec<u8>>,
}

/// File changes in the unit directory within one logical operation.
struct Transaction<'a> {
    units: &'a UnitDir,
    init: &'a dyn InitSystem,
    saved: Vec<SavedFile>,
    changed: Vec<PathBuf>,
    dirty: bool,
    reloaded: bool,
}

impl<'a> Transaction<'a> {
    fn begin(units: &'a UnitDir, init: &'a dyn InitSystem) -> Self {
        Self {
            units,
            init,
            saved: Vec::new(),
            changed: Vec::new(),
            dirty: false,
            reloaded: false,
        }
    }

    fn write(&mut self, stem: &str, kind: UnitKind, content: &str) -> Result<bool> {
        let previous = self.units.read_bytes(stem, kind)?;
        let changed = self.units.write_if_changed(stem, kind, content)?;
        if changed {
            self.record(stem, kind, previous);
        }
        Ok(changed)
    }

    fn remove(&mut self, stem: &str, kind: UnitKind) -> Result<bool> {
        let previous = self.units.read_bytes(stem, kind)?;
        let removed = self.units.remove(stem, kind)?;
        if removed {
            self.record(stem, kind, previous);
        }
        Ok(removed)
    }

    fn record(&mut self, stem: &str, kind: UnitKind, previous: Option<Vec<u8>>) {
        self.changed.push(self.units.path(stem, kind));
        self.saved.push(SavedFile {
            stem: stem.to_string(),
            kind,
            previous,
        });
        self.dirty = true;
    }

    /// Reload the init system if anything changed since the last reload.
    fn reload(&mut self) -> std::result::Result<(), SystemError> {
        if self.dirty {
            self.init.reload()?;
            self.dirty = false;
            self.reloaded = true;
        }
        Ok(())
    }

    /// Put every touched file back. The init system is reloaded only if it
    /// had already seen the changes.
    fn rollback(self) {
        for saved in self.saved.iter().rev() {
            if let Err(e) = self
                .units
                .restore(&saved.stem, saved.kind, saved.previous.as_deref())
            {
                tracing::warn!(unit = %saved.stem, error = %e, "rollback of unit file failed");
            }
        }
        if self.reloaded {
            if let Err(e) = self.init.reload() {
                tracing::warn!(error = %e, "reload after rollback failed");
            }
        }
    }

    fn finish(self, unit: String) -> Outcome {
        Outcome {
            unit,
            changed: self.changed,
            reloaded: self.reloaded,
        }
    }
}

/// Init-system calls already made by an operation, undone in reverse
/// when a later step fails.
struct Undo<'a> {
    init: &'a dyn InitSystem,
    steps: Vec<Step>,
}

enum Step {
    Stopped(String),
    Disabled(String),
}

impl<'a> Undo<'a> {
    fn new(init: &'a dyn InitSystem) -> Self {
        Self {
            init,
            steps: Vec::new(),
        }
    }

    fn stop(&mut self, unit: &str) -> std::result::Result<(), SystemError> {
        if self.init.is_active(unit) {
            self.init.stop(unit)?;
            self.steps.push(Step::Stopped(unit.to_string()));
        }
        Ok(())
    }

    fn disable(&mut self, unit: &str) -> std::result::Result<(), SystemError> {
        if self.init.is_enabled(unit) {
            self.init.disable(unit)?;
            self.steps.push(Step::Disabled(unit.to_string()));
        }
        Ok(())
    }

    fn revert(self) {
        for step in self.steps.iter().rev() {
            let (unit, result) = match step {
                Step::Stopped(unit) => (unit, self.init.start(unit)),
                Step::Disabled(unit) => (unit, self.init.enable(unit)),
            };
            if let Err(e) = result {
                tracing::warn!(unit = %unit, error = %e, "could not restore unit state");
            }
        }
    }
}

/// Install the definition, reload if needed, and start the mount unit.
pub fn activate(ctx: &MountContext<'_>, name: &str, opts: ActivateOptions) -> Result<Outcome> {
    let resolved = reconciler::resolve(ctx, name)?;
    let def = resolved.source_definition()?;
    if !def.r#where.exists() {
        return Err(MountError::MissingTarget {
            name: name.to_string(),
            path: def.r#where,
        });
    }

    let unit = resolved.unit();
    let was_active = ctx.init.is_active(&unit);
    let was_enabled = ctx.init.is_enabled(&unit);
    let mut tx = Transaction::begin(&ctx.installed, ctx.init);

    let (content, from_store) = resolved.source();
    if from_store {
        if let Err(e) = tx.write(&resolved.stem, UnitKind::Mount, content) {
            tx.rollback();
            return Err(e);
        }
    }

    if let Err(e) = tx.reload() {
        tx.rollback();
        return Err(MountError::ActivationFailed {
            unit,
            detail: e.to_string(),
        });
    }

    if let Err(e) = ctx.init.start(&unit) {
        let status = ctx.init.status_text(&unit);
        tx.rollback();
        return Err(MountError::ActivationFailed {
            unit,
            detail: join_detail(&e.to_string(), &status),
        });
    }

    if opts.enable_at_boot && !was_enabled {
        if let Err(e) = ctx.init.enable(&unit) {
            if !was_active {
                if let Err(stop_err) = ctx.init.stop(&unit) {
                    tracing::warn!(unit = %unit, error = %stop_err, "stop after failed enable");
                }
            }
            tx.rollback();
            return Err(MountError::EnableFailed {
                unit,
                detail: e.to_string(),
            });
        }
    }

    tracing::info!(unit = %unit, reloaded = tx.reloaded, "mount activated");
    Ok(tx.finish(unit))
}

/// Activate, and when the target directory is missing ask `confirm`
/// whether to create it, then try once more.
pub fn activate_with_target_prompt(
    ctx: &MountContext<'_>,
    name: &str,
    opts: ActivateOptions,
    confirm: &mut dyn FnMut(&Path) -> bool,
) -> Result<Outcome> {
    match activate(ctx, name, opts) {
        Err(MountError::MissingTarget { name: missing, path }) => {
            if !confirm(&path) {
                return Err(MountError::MissingTarget {
                    name: missing,
                    path,
                });
            }
            create_target_dir(ctx, name)?;
            activate(ctx, name, opts)
        }
        other => other,
    }
}

/// `mkdir -p` the definition's target.
pub fn create_target_dir(ctx: &MountContext<'_>, name: &str) -> Result<PathBuf> {
    let resolved = reconciler::resolve(ctx, name)?;
    let def = resolved.source_definition()?;
    fs::create_dir_all(&def.r#where).map_err(|source| MountError::DirectoryCreateFailed {
        path: def.r#where.clone(),
        source,
    })?;
    tracing::info!(path = %def.r#where.display(), "created mount target");
    Ok(def.r#where)
}

/// Stop and uninstall a mount, refusing while its target is in use.
///
/// Nothing is stopped before the in-use check passes; if a later step
/// fails, units already stopped or disabled are brought back.
pub fn deactivate(ctx: &MountContext<'_>, name: &str) -> Result<Outcome> {
    let resolved = reconciler::resolve(ctx, name)?;
    let unit = resolved.unit();
    let automount = resolved.automount_unit();

    let Some(target) = resolved.mount_point() else {
        return Err(MountError::DeactivationFailed {
            unit,
            detail: "no absolute Where= in the unit; cannot check whether it is in use".to_string(),
        });
    };
    if target.exists() {
        let holders = ctx
            .probe
            .holders(&target)
            .map_err(|e| MountError::DeactivationFailed {
                unit: unit.clone(),
                detail: format!("in-use probe on {}: {}", target.display(), e),
            })?;
        if !holders.is_empty() {
            let detail = holders
                .iter()
                .map(|h| h.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            return Err(MountError::ResourceBusy {
                path: target,
                detail,
            });
        }
    }

    let mut undo = Undo::new(ctx.init);
    // The automount would re-trigger the mount, so it goes first.
    let stopped = undo
        .stop(&automount)
        .map_err(|e| MountError::DeactivationFailed {
            unit: automount.clone(),
            detail: e.to_string(),
        })
        .and_then(|_| {
            undo.disable(&automount).map_err(|e| MountError::DisableFailed {
                unit: automount.clone(),
                detail: e.to_string(),
            })
        })
        .and_then(|_| {
            undo.stop(&unit).map_err(|e| MountError::DeactivationFailed {
                unit: unit.clone(),
                detail: join_detail(&e.to_string(), &ctx.init.status_text(&unit)),
            })
        })
        .and_then(|_| {
            undo.disable(&unit).map_err(|e| MountError::DisableFailed {
                unit: unit.clone(),
                detail: e.to_string(),
            })
        });
    if let Err(e) = stopped {
        undo.revert();
        return Err(e);
    }

    let mut tx = Transaction::begin(&ctx.installed, ctx.init);
    let removed = tx
        .remove(&resolved.stem, UnitKind::Automount)
        .and_then(|_| tx.remove(&resolved.stem, UnitKind::Mount))
        .and_then(|_| {
            tx.reload().map_err(|e| MountError::DeactivationFailed {
                unit: unit.clone(),
                detail: e.to_string(),
            })
        });
    if let Err(e) = removed {
        tx.rollback();
        undo.revert();
        return Err(e);
    }

    tracing::info!(unit = %unit, "mount deactivated");
    Ok(tx.finish(unit))
}

/// Re-validate a definition after it was edited by hand.
pub fn repair(ctx: &MountContext<'_>, name: &str) -> Result<MountDefinition> {
    let resolved = reconciler::resolve(ctx, name)?;
    resolved
        .source_definition()
        .map_err(|e| match e {
            MountError::InvalidDefinition { name, reason } => MountError::StillInvalid { name, reason },
            other => other,
        })
}

/// Install, enable, and start a companion automount unit.
pub fn create_automount(
    ctx: &MountContext<'_>,
    name: &str,
    opts: AutomountOptions,
) -> Result<Outcome> {
    let resolved = reconciler::resolve(ctx, name)?;
    let def = resolved.source_definition()?;
    let automount = resolved.automount_unit();
    let was_enabled = ctx.init.is_enabled(&automount);
    let was_active = ctx.init.is_active(&automount);

    let mut tx = Transaction::begin(&ctx.installed, ctx.init);
    let (content, from_store) = resolved.source();
    let mount_staged = if from_store {
        tx.write(&resolved.stem, UnitKind::Mount, content)
    } else {
        Ok(false)
    };
    let staged = mount_staged.and_then(|_| {
        tx.write(
            &resolved.stem,
            UnitKind::Automount,
            &def.render_automount(opts.idle_timeout),
        )
    });
    if let Err(e) = staged {
        tx.rollback();
        return Err(e);
    }

    let failed = |detail: String| MountError::AutomountActivationFailed {
        unit: automount.clone(),
        detail,
    };

    if let Err(e) = tx.reload() {
        tx.rollback();
        return Err(failed(e.to_string()));
    }

    let started = ctx
        .init
        .enable(&automount)
        .and_then(|_| ctx.init.start(&automount));
    let detail = match started {
        Err(e) => Some(join_detail(&e.to_string(), &ctx.init.status_text(&automount))),
        Ok(()) if !ctx.init.is_active(&automount) => Some(join_detail(
            "automount did not become active",
            &ctx.init.status_text(&automount),
        )),
        Ok(()) => None,
    };

    if let Some(detail) = detail {
        if !was_active {
            if let Err(e) = ctx.init.stop(&automount) {
                tracing::warn!(unit = %automount, error = %e, "stop during automount rollback");
            }
        }
        if !was_enabled {
            if let Err(e) = ctx.init.disable(&automount) {
                tracing::warn!(unit = %automount, error = %e, "disable during automount rollback");
            }
        }
        tx.rollback();
        return Err(failed(detail));
    }

    tracing::info!(unit = %automount, "automount active");
    Ok(tx.finish(automount))
}

/// Mark the installed mount unit to start at boot. No start/stop.
pub fn enable_at_boot(ctx: &MountContext<'_>, name: &str) -> Result<Outcome> {
    let unit = require_installed(ctx, name)?;
    ctx.init.enable(&unit).map_err(|e| MountError::EnableFailed {
        unit: unit.clone(),
        detail: e.to_string(),
    })?;
    Ok(Outcome {
        unit,
        ..Outcome::default()
    })
}

pub fn disable_at_boot(ctx: &MountContext<'_>, name: &str) -> Result<Outcome> {
    let unit = require_installed(ctx, name)?;
    ctx.init.disable(&unit).map_err(|e| MountError::DisableFailed {
        unit: unit.clone(),
        detail: e.to_string(),
    })?;
    Ok(Outcome {
        unit,
        ..Outcome::default()
    })
}

fn require_installed(ctx: &MountContext<'_>, name: &str) -> Result<String> {
    let resolved = reconciler::resolve(ctx, name)?;
    if resolved.installed.is_some() {
        Ok(resolved.unit())
    } else {
        Err(MountError::NotInstalled(resolved.unit()))
    }
}

fn join_detail(error: &str, status: &str) -> String {
    if status.trim().is_empty() {
        error.to_string()
    } else {
        format!("{}\n{}", error, status.trim_end())
    }
}
