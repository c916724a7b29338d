use crate::core::system::{InitSystem, UsageProbe};
use crate::core::unit_dir::UnitDir;
use crate::models::config::AppConfig;

/// Everything the lifecycle core needs, built once from the configuration.
pub struct MountContext<'a> {
    /// Tracked definitions.
    pub definitions: UnitDir,
    /// Units materialized for the init system.
    pub installed: UnitDir,
    pub init: &'a dyn InitSystem,
    pub probe: &'a dyn UsageProbe,
}

impl<'a> MountContext<'a> {
    pub fn new(config: &AppConfig, init: &'a dyn InitSystem, probe: &'a dyn UsageProbe) -> Self {
        Self {
            definitions: UnitDir::new(&config.definitions_dir),
            installed: UnitDir::new(&config.unit_dir),
            init,
            probe,
        }
    }
}
