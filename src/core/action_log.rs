//! Append-only, hash-chained log of every mutating command.

use crate::constants;
use crate::core::file_lock::FileLock;
use crate::models::config::AppConfig;
use crate::util::fs as mk_fs;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

const HASH_VERSION: u8 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionEntry {
    pub timestamp: DateTime<Utc>,
    pub action: String,
    pub actor: String,
    pub mount: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub result: ActionResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash_version: Option<u8>,
}

/// What happened, before it is stamped and chained.
#[derive(Debug, Clone)]
pub struct Action {
    pub action: String,
    pub mount: String,
    pub detail: Option<String>,
}

impl Action {
    pub fn new(action: impl Into<String>, mount: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            mount: mount.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

pub struct ActionLog {
    path: PathBuf,
    lock: PathBuf,
}

pub fn detect_actor() -> String {
    if let Ok(user) = std::env::var("SUDO_USER") {
        if !user.is_empty() {
            return format!("{}(sudo)", user);
        }
    }
    std::env::var("USER").unwrap_or_else(|_| "unknown".to_string())
}

impl ActionLog {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            path: config.action_log_path(),
            lock: config.action_lock_path(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stamp, chain, and append one entry. Returns the appended entry.
    pub fn record(&self, action: Action, success: bool, error: Option<String>) -> Result<ActionEntry> {
        self.record_as(action, &detect_actor(), success, error)
    }

    pub fn record_as(
        &self,
        action: Action,
        actor: &str,
        success: bool,
        error: Option<String>,
    ) -> Result<ActionEntry> {
        if let Some(parent) = self.path.parent() {
            mk_fs::ensure_dir(parent, constants::STATE_DIR_MODE)
                .with_context(|| format!("create state dir {}", parent.display()))?;
        }
        let _lock = FileLock::exclusive(&self.lock)?;
        let prev_hash = last_line_hash(&self.path).unwrap_or(None);

        let mut entry = ActionEntry {
            timestamp: Utc::now(),
            action: action.action,
            actor: actor.to_string(),
            mount: action.mount,
            detail: action.detail,
            result: ActionResult { success, error },
            prev_hash,
            entry_hash: None,
            hash_version: Some(HASH_VERSION),
        };
        entry.entry_hash = Some(compute_entry_hash(&entry)?);

        let line = serde_json::to_string(&entry).context("serialize action entry")?;
        append_line(&self.path, &line)?;
        Ok(entry)
    }

    /// Entries in file order, the last `limit` when given.
    pub fn read(&self, limit: Option<usize>) -> Result<Vec<ActionEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let file = fs::File::open(&self.path)
            .with_context(|| format!("open action log {}", self.path.display()))?;
        let mut entries = Vec::new();
        let mut malformed = 0usize;

        for line in BufReader::new(file).lines() {
            let line = line.context("read action log line")?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<ActionEntry>(trimmed) {
                Ok(entry) => entries.push(entry),
                Err(_) => malformed += 1,
            }
        }

        if malformed > 0 {
            tracing::warn!(count = malformed, "malformed action log entries skipped");
        }

        if let Some(limit) = limit {
            if entries.len() > limit {
                entries = entries.split_off(entries.len() - limit);
            }
        }
        Ok(entries)
    }

    /// Re-walk the hash chain. Returns (total, problems).
    pub fn verify(&self) -> Result<(usize, Vec<String>)> {
        let entries = self.read(None)?;
        let mut errors = Vec::new();
        let mut prev_entry_hash: Option<String> = None;

        for (i, entry) in entries.iter().enumerate() {
            if i > 0 && entry.prev_hash != prev_entry_hash {
                errors.push(format!(
                    "entry {}: prev_hash mismatch (expected {:?}, got {:?})",
                    i + 1,
                    prev_entry_hash,
                    entry.prev_hash
                ));
            }

            match (&entry.entry_hash, entry.hash_version) {
                (Some(stored), Some(HASH_VERSION)) => match compute_entry_hash(entry) {
                    Ok(computed) if &computed != stored => {
                        errors.push(format!("entry {}: entry_hash mismatch (tampered?)", i + 1));
                    }
                    Ok(_) => {}
                    Err(e) => errors.push(format!("entry {}: cannot compute hash: {}", i + 1, e)),
                },
                _ => errors.push(format!("entry {}: missing entry_hash", i + 1)),
            }

            prev_entry_hash = entry.entry_hash.clone();
        }

        Ok((entries.len(), errors))
    }
}

/// SHA-256 over canonical JSON of the entry without its own hash.
fn compute_entry_hash(entry: &ActionEntry) -> Result<String> {
    let mut value = serde_json::to_value(entry).context("serialize for hash")?;
    if let Some(obj) = value.as_object_mut() {
        obj.remove("entry_hash");
    }
    let canonical = canonicalize_value(&value);
    let canonical_str = serde_json::to_string(&canonical).context("serialize canonical json")?;
    Ok(format!("{:064x}", Sha256::digest(canonical_str.as_bytes())))
}

/// Recursively sort object keys.
fn canonicalize_value(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = serde_json::Map::new();
            for k in keys {
                out.insert(k.clone(), canonicalize_value(&map[k]));
            }
            serde_json::Value::Object(out)
        }
        serde_json::Value::Array(arr) => {
            serde_json::Value::Array(arr.iter().map(canonicalize_value).collect())
        }
        other => other.clone(),
    }
}

fn append_line(path: &Path, line: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open action log {}", path.display()))?;
    writeln!(file, "{}", line).context("write action entry")?;
    mk_fs::set_permissions(path, constants::ACTION_LOG_MODE)
        .context("set action log permissions")?;
    Ok(())
}

fn last_line_hash(path: &Path) -> Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }

    let mut file = fs::File::open(path).with_context(|| format!("open {}", path.display()))?;
    let len = file
        .metadata()
        .with_context(|| format!("stat {}", path.display()))?
        .len();
    if len == 0 {
        return Ok(None);
    }

    const CHUNK: u64 = 8192;
    let mut offset = len;
    let mut buf = Vec::new();

    while offset > 0 {
        let read_size = std::cmp::min(CHUNK, offset);
        offset -= read_size;
        file.seek(SeekFrom::Start(offset))
            .with_context(|| format!("seek {}", path.display()))?;
        let mut tmp = vec![0u8; read_size as usize];
        file.read_exact(&mut tmp)
            .with_context(|| format!("read {}", path.display()))?;
        buf.splice(0..0, tmp);

        // Needs one complete line besides the trailing newline.
        let complete = buf.iter().filter(|b| **b == b'\n').count() > 1;
        if complete || offset == 0 {
            for line in buf.split(|b| *b == b'\n').rev() {
                if line.iter().all(|b| b.is_ascii_whitespace()) {
                    continue;
                }
                if let Ok(entry) = serde_json::from_slice::<ActionEntry>(line) {
                    if let Some(hash) = entry.entry_hash {
                        return Ok(Some(hash));
                    }
                }
                return Ok(Some(format!("{:064x}", Sha256::digest(line))));
            }
            return Ok(None);
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_log() -> (TempDir, ActionLog) {
        let dir = TempDir::new().unwrap();
        let config = AppConfig::under(dir.path());
        let log = ActionLog::new(&config);
        (dir, log)
    }

    #[test]
    fn test_record_and_read() {
        let (_dir, log) = test_log();
        log.record_as(Action::new("activate", "nas1"), "tester", true, None)
            .unwrap();
        let entries = log.read(None).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, "activate");
        assert_eq!(entries[0].mount, "nas1");
        assert!(entries[0].result.success);
        assert!(entries[0].prev_hash.is_none());
        assert_eq!(entries[0].hash_version, Some(2));
    }

    #[test]
    fn test_failure_recorded_with_error() {
        let (_dir, log) = test_log();
        log.record_as(
            Action::new("deactivate", "nas1").with_detail("/custom-mounts/nas1"),
            "tester",
            false,
            Some("resource busy".into()),
        )
        .unwrap();
        let entry = &log.read(None).unwrap()[0];
        assert!(!entry.result.success);
        assert_eq!(entry.result.error.as_deref(), Some("resource busy"));
        assert_eq!(entry.detail.as_deref(), Some("/custom-mounts/nas1"));
    }

    #[test]
    fn test_entries_are_chained() {
        let (_dir, log) = test_log();
        let first = log.record_as(Action::new("create", "a"), "t", true, None).unwrap();
        let second = log.record_as(Action::new("activate", "a"), "t", true, None).unwrap();
        assert_eq!(second.prev_hash, first.entry_hash);
    }

    #[test]
    fn test_read_with_limit() {
        let (_dir, log) = test_log();
        for i in 0..5 {
            log.record_as(Action::new(format!("action_{}", i), "m"), "t", true, None)
                .unwrap();
        }
        let entries = log.read(Some(2)).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].action, "action_4");
    }

    #[test]
    fn test_read_missing_log() {
        let (_dir, log) = test_log();
        assert!(log.read(None).unwrap().is_empty());
    }

    #[test]
    fn test_canonical_json_deterministic() {
        let c1 = canonicalize_value(&serde_json::json!({"b": 1, "a": 2}));
        let c2 = canonicalize_value(&serde_json::json!({"a": 2, "b": 1}));
        let s1 = serde_json::to_string(&c1).unwrap();
        assert_eq!(s1, serde_json::to_string(&c2).unwrap());
        assert_eq!(s1, r#"{"a":2,"b":1}"#);
    }

    #[test]
    fn test_verify_ok() {
        let (_dir, log) = test_log();
        for action in ["create", "activate", "deactivate"] {
            log.record_as(Action::new(action, "nas1"), "t", true, None).unwrap();
        }
        let (total, errors) = log.verify().unwrap();
        assert_eq!(total, 3);
        assert!(errors.is_empty(), "errors: {:?}", errors);
    }

    #[test]
    fn test_verify_detects_tamper() {
        let (_dir, log) = test_log();
        log.record_as(Action::new("create", "nas1"), "t", true, None).unwrap();
        log.record_as(Action::new("activate", "nas1"), "t", true, None).unwrap();

        let content = fs::read_to_string(log.path()).unwrap();
        fs::write(log.path(), content.replace("activate", "deactivate")).unwrap();

        let (total, errors) = log.verify().unwrap();
        assert_eq!(total, 2);
        assert!(!errors.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_log_mode() {
        let (_dir, log) = test_log();
        log.record_as(Action::new("create", "nas1"), "t", true, None).unwrap();
        assert_eq!(mk_fs::mode_of(log.path()), Some(0o640));
    }
}
