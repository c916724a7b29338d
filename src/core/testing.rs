//! In-memory init system and usage probe for core tests.

use crate::core::system::{Holder, InitSystem, SystemError, UsageProbe};
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

#[derive(Debug, Default)]
pub struct FakeState {
    pub active: BTreeSet<String>,
    pub enabled: BTreeSet<String>,
    pub reloads: usize,
    pub fail_start: BTreeSet<String>,
    pub fail_enable: BTreeSet<String>,
    pub fail_stop: BTreeSet<String>,
    /// Units that start but immediately go inactive again.
    pub flaky: BTreeSet<String>,
    pub calls: Vec<String>,
}

/// Behaves like systemd for the calls the core makes: units must exist
/// in the unit directory to start or enable.
pub struct FakeInit {
    unit_dir: PathBuf,
    pub state: RefCell<FakeState>,
}

impl FakeInit {
    pub fn new(unit_dir: &Path) -> Self {
        Self {
            unit_dir: unit_dir.to_path_buf(),
            state: RefCell::new(FakeState::default()),
        }
    }

    pub fn reloads(&self) -> usize {
        self.state.borrow().reloads
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.borrow().calls.clone()
    }

    pub fn set_active(&self, unit: &str) {
        self.state.borrow_mut().active.insert(unit.to_string());
    }

    pub fn set_enabled(&self, unit: &str) {
        self.state.borrow_mut().enabled.insert(unit.to_string());
    }

    pub fn fail_start(&self, unit: &str) {
        self.state.borrow_mut().fail_start.insert(unit.to_string());
    }

    pub fn fail_enable(&self, unit: &str) {
        self.state.borrow_mut().fail_enable.insert(unit.to_string());
    }

    pub fn fail_stop(&self, unit: &str) {
        self.state.borrow_mut().fail_stop.insert(unit.to_string());
    }

    pub fn flaky(&self, unit: &str) {
        self.state.borrow_mut().flaky.insert(unit.to_string());
    }

    fn record(&self, call: String) {
        self.state.borrow_mut().calls.push(call);
    }

    fn require_file(&self, unit: &str, command: &str) -> Result<(), SystemError> {
        if self.unit_dir.join(unit).is_file() {
            Ok(())
        } else {
            Err(SystemError::new(
                format!("systemctl {} {}", command, unit),
                format!("Unit {} not found.", unit),
            ))
        }
    }
}

impl InitSystem for FakeInit {
    fn is_active(&self, unit: &str) -> bool {
        self.state.borrow().active.contains(unit)
    }

    fn is_enabled(&self, unit: &str) -> bool {
        self.state.borrow().enabled.contains(unit)
    }

    fn start(&self, unit: &str) -> Result<(), SystemError> {
        self.record(format!("start {}", unit));
        self.require_file(unit, "start")?;
        let mut state = self.state.borrow_mut();
        if state.fail_start.contains(unit) {
            return Err(SystemError::new(
                format!("systemctl start {}", unit),
                "Job failed. See \"journalctl -xe\" for details.",
            ));
        }
        if !state.flaky.contains(unit) {
            state.active.insert(unit.to_string());
        }
        Ok(())
    }

    fn stop(&self, unit: &str) -> Result<(), SystemError> {
        self.record(format!("stop {}", unit));
        let mut state = self.state.borrow_mut();
        if state.fail_stop.contains(unit) {
            return Err(SystemError::new(
                format!("systemctl stop {}", unit),
                "target is busy",
            ));
        }
        state.active.remove(unit);
        Ok(())
    }

    fn enable(&self, unit: &str) -> Result<(), SystemError> {
        self.record(format!("enable {}", unit));
        self.require_file(unit, "enable")?;
        let mut state = self.state.borrow_mut();
        if state.fail_enable.contains(unit) {
            return Err(SystemError::new(
                format!("systemctl enable {}", unit),
                "Failed to enable unit",
            ));
        }
        state.enabled.insert(unit.to_string());
        Ok(())
    }

    fn disable(&self, unit: &str) -> Result<(), SystemError> {
        self.record(format!("disable {}", unit));
        self.state.borrow_mut().enabled.remove(unit);
        Ok(())
    }

    fn reload(&self) -> Result<(), SystemError> {
        self.record("daemon-reload".to_string());
        self.state.borrow_mut().reloads += 1;
        Ok(())
    }

    fn status_text(&self, unit: &str) -> String {
        format!("{} - failed (Result: exit-code)", unit)
    }
}

/// Reports every path registered as busy as held by one process.
#[derive(Default)]
pub struct FakeProbe {
    busy: RefCell<Vec<PathBuf>>,
}

impl FakeProbe {
    pub fn mark_busy(&self, path: &Path) {
        self.busy.borrow_mut().push(path.to_path_buf());
    }
}

impl UsageProbe for FakeProbe {
    fn holders(&self, path: &Path) -> std::io::Result<Vec<Holder>> {
        if self.busy.borrow().iter().any(|p| p.starts_with(path)) {
            Ok(vec![Holder {
                pid: 4242,
                command: "bash".to_string(),
            }])
        } else {
            Ok(Vec::new())
        }
    }
}
