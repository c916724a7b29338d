//! A directory of unit files keyed by mount name.
//!
//! Backs both the definition store and the installed side in the system
//! unit directory. Writes compare content first so identical rewrites are
//! no-ops and never trigger an init-system reload.

use crate::constants;
use crate::core::error::{MountError, Result};
use crate::models::definition::is_valid_name;
use crate::util::fs as mk_fs;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    Mount,
    Automount,
}

impl UnitKind {
    pub fn extension(&self) -> &'static str {
        match self {
            UnitKind::Mount => constants::MOUNT_EXTENSION,
            UnitKind::Automount => constants::AUTOMOUNT_EXTENSION,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UnitDir {
    dir: PathBuf,
}

impl UnitDir {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self, name: &str, kind: UnitKind) -> PathBuf {
        self.dir.join(format!("{}.{}", name, kind.extension()))
    }

    pub fn exists(&self, name: &str, kind: UnitKind) -> bool {
        self.path(name, kind).is_file()
    }

    /// Sorted names of all `.mount` files whose stem is a valid mount name.
    pub fn names(&self) -> Result<BTreeSet<String>> {
        let mut names = BTreeSet::new();
        if !self.dir.is_dir() {
            return Ok(names);
        }
        let pattern = format!(
            "{}/*.{}",
            glob::Pattern::escape(&self.dir.to_string_lossy()),
            constants::MOUNT_EXTENSION
        );
        let entries = glob::glob(&pattern)
            .map_err(|e| MountError::ConfigIo(format!("bad unit directory pattern {}: {}", pattern, e)))?;
        for entry in entries.flatten() {
            if !entry.is_file() {
                continue;
            }
            let Some(stem) = entry.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if is_valid_name(stem) {
                names.insert(stem.to_string());
            } else {
                tracing::debug!(path = %entry.display(), "skipping unit with unmanageable name");
            }
        }
        Ok(names)
    }

    /// File content as text. Bytes that are not UTF-8 come back as U+FFFD,
    /// which the unit parser reports as malformed.
    pub fn read(&self, name: &str, kind: UnitKind) -> Result<Option<String>> {
        Ok(self
            .read_bytes(name, kind)?
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
    }

    pub fn read_bytes(&self, name: &str, kind: UnitKind) -> Result<Option<Vec<u8>>> {
        let path = self.path(name, kind);
        match fs::read(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(MountError::io("read", path, e)),
        }
    }

    /// Write `content` unless the file already holds exactly that.
    /// Returns whether the file changed.
    pub fn write_if_changed(&self, name: &str, kind: UnitKind, content: &str) -> Result<bool> {
        self.write_bytes_if_changed(name, kind, content.as_bytes())
    }

    fn write_bytes_if_changed(&self, name: &str, kind: UnitKind, content: &[u8]) -> Result<bool> {
        if self.read_bytes(name, kind)?.as_deref() == Some(content) {
            return Ok(false);
        }
        let path = self.path(name, kind);
        mk_fs::write_atomic(&path, content, constants::UNIT_FILE_MODE)
            .map_err(|e| MountError::io("write", &path, e))?;
        tracing::debug!(path = %path.display(), "unit file written");
        Ok(true)
    }

    /// Remove a unit file. Returns whether a file was removed.
    pub fn remove(&self, name: &str, kind: UnitKind) -> Result<bool> {
        let path = self.path(name, kind);
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "unit file removed");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(MountError::io("remove", path, e)),
        }
    }

    /// Put a file back the way it was: rewrite old content or delete.
    pub fn restore(&self, name: &str, kind: UnitKind, previous: Option<&[u8]>) -> Result<()> {
        match previous {
            Some(content) => self.write_bytes_if_changed(name, kind, content).map(|_| ()),
            None => self.remove(name, kind).map(|_| ()),
        }
    }
}

pub fn content_digest(content: &str) -> String {
    format!("{:064x}", Sha256::digest(content.as_bytes()))
}
