//! Mount definitions and the unit-file format they are stored in.
//!
//! A definition file is a systemd `.mount` unit: INI-like sections with
//! `Key=Value` lines. Only the `[Mount]` keys are interpreted; everything
//! is re-rendered from the parsed fields when a definition is written.

use crate::constants;
use crate::util::path;
use std::fmt;
use std::path::{Path, PathBuf};

/// Default `Type=` when a definition omits it.
pub const DEFAULT_FS_TYPE: &str = "auto";

/// Default `Options=` when a definition omits it.
pub const DEFAULT_OPTIONS: &str = "defaults";

/// A validated mount definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountDefinition {
    pub name: String,
    pub what: String,
    pub r#where: PathBuf,
    pub fs_type: String,
    pub options: String,
    pub description: Option<String>,
}

/// The `[Mount]` fields of a unit file before validation.
///
/// Editing works on this form so that an invalid definition can be
/// repaired field by field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawMount {
    pub what: Option<String>,
    pub r#where: Option<String>,
    pub fs_type: Option<String>,
    pub options: Option<String>,
    pub description: Option<String>,
}

/// Why a unit file could not be turned into a usable definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefinitionIssue {
    Malformed { line: usize, message: String },
    MissingKey(&'static str),
    RelativeTarget(String),
    ReservedTarget(String),
}

impl fmt::Display for DefinitionIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefinitionIssue::Malformed { line, message } => write!(f, "line {}: {}", line, message),
            DefinitionIssue::MissingKey(key) => write!(f, "missing {}= in [Mount]", key),
            DefinitionIssue::RelativeTarget(p) => write!(f, "Where={} is not an absolute path", p),
            DefinitionIssue::ReservedTarget(p) => write!(f, "Where={} is a reserved system path", p),
        }
    }
}

/// Check a mount name against `[A-Za-z0-9_.-]+`.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-')
}

/// Whether `target` equals one of the reserved system directories.
pub fn is_reserved_target(target: &Path) -> bool {
    let normalized = path::normalize(target);
    constants::RESERVED_TARGETS
        .iter()
        .any(|r| normalized == Path::new(r))
}

/// Parse the `[Mount]` section of a unit file.
pub fn parse_unit(content: &str) -> Result<RawMount, DefinitionIssue> {
    let mut raw = RawMount::default();
    let mut section: Option<String> = None;

    for (idx, line) in content.lines().enumerate() {
        let line_num = idx + 1;
        if line.contains(char::REPLACEMENT_CHARACTER) {
            return Err(DefinitionIssue::Malformed {
                line: line_num,
                message: "not valid UTF-8".to_string(),
            });
        }
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
            continue;
        }

        if trimmed.starts_with('[') {
            let Some(name) = trimmed.strip_prefix('[').and_then(|s| s.strip_suffix(']')) else {
                return Err(DefinitionIssue::Malformed {
                    line: line_num,
                    message: format!("unterminated section header '{}'", trimmed),
                });
            };
            if name.is_empty() {
                return Err(DefinitionIssue::Malformed {
                    line: line_num,
                    message: "empty section name".to_string(),
                });
            }
            section = Some(name.to_string());
            continue;
        }

        let Some((key, value)) = trimmed.split_once('=') else {
            return Err(DefinitionIssue::Malformed {
                line: line_num,
                message: format!("expected Key=Value, found '{}'", trimmed),
            });
        };
        let key = key.trim();
        let value = value.trim().to_string();

        match section.as_deref() {
            None => {
                return Err(DefinitionIssue::Malformed {
                    line: line_num,
                    message: format!("'{}' outside of any section", key),
                });
            }
            Some("Mount") => match key {
                "What" => raw.what = Some(value),
                "Where" => raw.r#where = Some(value),
                "Type" => raw.fs_type = Some(value),
                "Options" => raw.options = Some(value),
                _ => {}
            },
            Some("Unit") if key == "Description" => raw.description = Some(value),
            Some(_) => {}
        }
    }

    Ok(raw)
}

/// The `Where=` of a unit file, read leniently: lines that would make
/// [`parse_unit`] fail are skipped. Only absolute paths are returned.
pub fn find_where(content: &str) -> Option<PathBuf> {
    let mut in_mount = false;
    let mut found = None;
    for line in content.lines() {
        let trimmed = line.trim();
        if let Some(section) = trimmed.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            in_mount = section == "Mount";
            continue;
        }
        if !in_mount {
            continue;
        }
        if let Some((key, value)) = trimmed.split_once('=') {
            if key.trim() == "Where" && !value.trim().is_empty() {
                found = Some(PathBuf::from(value.trim()));
            }
        }
    }
    found
        .filter(|p| p.is_absolute())
        .map(|p| path::normalize(&p))
}

impl RawMount {
    /// Overlay the fields set in `patch`.
    pub fn merge(self, patch: RawMount) -> RawMount {
        RawMount {
            what: patch.what.or(self.what),
            r#where: patch.r#where.or(self.r#where),
            fs_type: patch.fs_type.or(self.fs_type),
            options: patch.options.or(self.options),
            description: patch.description.or(self.description),
        }
    }

    /// Turn the raw fields into a usable definition, applying defaults.
    pub fn validate(self, name: &str) -> Result<MountDefinition, DefinitionIssue> {
        let what = non_empty(self.what).ok_or(DefinitionIssue::MissingKey("What"))?;
        let target = non_empty(self.r#where).ok_or(DefinitionIssue::MissingKey("Where"))?;
        let target_path = PathBuf::from(&target);
        if !target_path.is_absolute() {
            return Err(DefinitionIssue::RelativeTarget(target));
        }
        if is_reserved_target(&target_path) {
            return Err(DefinitionIssue::ReservedTarget(target));
        }
        Ok(MountDefinition {
            name: name.to_string(),
            what,
            r#where: path::normalize(&target_path),
            fs_type: non_empty(self.fs_type).unwrap_or_else(|| DEFAULT_FS_TYPE.to_string()),
            options: non_empty(self.options).unwrap_or_else(|| DEFAULT_OPTIONS.to_string()),
            description: non_empty(self.description),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl MountDefinition {
    /// Parse and validate a unit file in one step.
    pub fn parse(name: &str, content: &str) -> Result<Self, DefinitionIssue> {
        parse_unit(content)?.validate(name)
    }

    /// Stem systemd requires for this mount's unit files: the escaped `Where`.
    pub fn unit_stem(&self) -> String {
        escape_unit_path(&self.r#where)
    }

    /// `Where=/mnt/nas1` installs as `mnt-nas1.mount`.
    pub fn unit_name(&self) -> String {
        mount_unit_name(&self.unit_stem())
    }

    pub fn is_network(&self) -> bool {
        constants::NETWORK_FS_TYPES.contains(&self.fs_type.as_str())
    }

    /// The `credentials=` path referenced in `Options`, if any.
    pub fn credentials_path(&self) -> Option<PathBuf> {
        self.options
            .split(',')
            .filter_map(|opt| opt.trim().split_once('='))
            .find(|(k, _)| *k == "credentials" || *k == "cred")
            .map(|(_, v)| PathBuf::from(v))
    }

    /// Render the definition as a mount unit file.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("[Unit]\n");
        if let Some(description) = &self.description {
            out.push_str(&format!("Description={}\n", description));
        }
        if self.is_network() {
            out.push_str("Wants=network-online.target\n");
            out.push_str("After=network-online.target\n");
        }
        out.push('\n');
        out.push_str("[Mount]\n");
        out.push_str(&format!("What={}\n", self.what));
        out.push_str(&format!("Where={}\n", self.r#where.display()));
        out.push_str(&format!("Type={}\n", self.fs_type));
        out.push_str(&format!("Options={}\n", self.options));
        out.push('\n');
        out.push_str("[Install]\n");
        let wanted_by = if self.is_network() {
            "remote-fs.target"
        } else {
            "local-fs.target"
        };
        out.push_str(&format!("WantedBy={}\n", wanted_by));
        out
    }

    /// Render the companion automount unit.
    pub fn render_automount(&self, idle_timeout: Option<u32>) -> String {
        let mut out = String::new();
        out.push_str("[Unit]\n");
        out.push_str(&format!("Description=Automount {}\n", self.name));
        out.push('\n');
        out.push_str("[Automount]\n");
        out.push_str(&format!("Where={}\n", self.r#where.display()));
        if let Some(secs) = idle_timeout {
            out.push_str(&format!("TimeoutIdleSec={}\n", secs));
        }
        out.push('\n');
        out.push_str("[Install]\n");
        out.push_str("WantedBy=multi-user.target\n");
        out
    }
}

pub fn mount_unit_name(stem: &str) -> String {
    format!("{}.{}", stem, constants::MOUNT_EXTENSION)
}

pub fn automount_unit_name(stem: &str) -> String {
    format!("{}.{}", stem, constants::AUTOMOUNT_EXTENSION)
}

/// Escape a path the way `systemd-escape --path` does.
///
/// `/custom-mounts/nas1` becomes `custom\x2dmounts-nas1`.
pub fn escape_unit_path(target: &Path) -> String {
    let normalized = path::normalize(target);
    let text = normalized.to_string_lossy();
    let trimmed = text.trim_matches('/');
    if trimmed.is_empty() {
        return "-".to_string();
    }

    let mut out = String::new();
    for (i, b) in trimmed.bytes().enumerate() {
        match b {
            b'/' => out.push('-'),
            b'.' if i == 0 => out.push_str("\\x2e"),
            b if b.is_ascii_alphanumeric() || b == b':' || b == b'_' || b == b'.' => {
                out.push(b as char)
            }
            b => out.push_str(&format!("\\x{:02x}", b)),
        }
    }
    out
}
