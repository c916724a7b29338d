//! In-use probe over `/proc`.
//!
//! A process holds a mount point when its working directory, root, executable
//! or any open descriptor resolves to a path at or below it. Processes that
//! vanish or deny access mid-scan are skipped.

use crate::core::system::{Holder, UsageProbe};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub struct ProcScanner {
    proc_root: PathBuf,
}

impl Default for ProcScanner {
    fn default() -> Self {
        Self::new("/proc")
    }
}

impl ProcScanner {
    pub fn new(proc_root: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: proc_root.into(),
        }
    }

    fn holds(&self, pid_dir: &Path, target: &Path) -> bool {
        let direct = ["cwd", "root", "exe"]
            .iter()
            .filter_map(|link| fs::read_link(pid_dir.join(link)).ok());
        let fds = fs::read_dir(pid_dir.join("fd"))
            .into_iter()
            .flatten()
            .flatten()
            .filter_map(|entry| fs::read_link(entry.path()).ok());
        direct.chain(fds).any(|resolved| under(&resolved, target))
    }
}

/// `/proc` appends " (deleted)" to unlinked targets.
fn under(resolved: &Path, target: &Path) -> bool {
    let text = resolved.to_string_lossy();
    let cleaned = text.strip_suffix(" (deleted)").unwrap_or(&text);
    Path::new(cleaned).starts_with(target)
}

impl UsageProbe for ProcScanner {
    fn holders(&self, path: &Path) -> io::Result<Vec<Holder>> {
        let mut holders = Vec::new();
        for entry in fs::read_dir(&self.proc_root)? {
            let Ok(entry) = entry else { continue };
            let Some(pid) = entry.file_name().to_str().and_then(|s| s.parse::<u32>().ok()) else {
                continue;
            };
            let pid_dir = entry.path();
            if !self.holds(&pid_dir, path) {
                continue;
            }
            let command = fs::read_to_string(pid_dir.join("comm"))
                .map(|c| c.trim().to_string())
                .unwrap_or_else(|_| "?".to_string());
            holders.push(Holder { pid, command });
        }
        holders.sort_by_key(|h| h.pid);
        tracing::debug!(path = %path.display(), count = holders.len(), "in-use scan");
        Ok(holders)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::symlink;
    use tempfile::TempDir;

    fn process(proc_root: &Path, pid: u32, comm: &str, cwd: &str, fds: &[&str]) {
        let dir = proc_root.join(pid.to_string());
        fs::create_dir_all(dir.join("fd")).unwrap();
        fs::write(dir.join("comm"), format!("{}\n", comm)).unwrap();
        symlink(cwd, dir.join("cwd")).unwrap();
        symlink("/", dir.join("root")).unwrap();
        symlink("/usr/bin/true", dir.join("exe")).unwrap();
        for (i, fd) in fds.iter().enumerate() {
            symlink(fd, dir.join("fd").join(i.to_string())).unwrap();
        }
    }

    #[test]
    fn test_finds_cwd_and_fd_holders() {
        let dir = TempDir::new().unwrap();
        let proc_root = dir.path();
        process(proc_root, 10, "bash", "/custom-mounts/nas1/docs", &[]);
        process(proc_root, 20, "vim", "/home/alice", &["/custom-mounts/nas1/a.txt"]);
        process(proc_root, 30, "sshd", "/", &["socket:[1234]", "/dev/null"]);
        fs::create_dir_all(proc_root.join("self")).unwrap();
        fs::write(proc_root.join("meminfo"), "").unwrap();

        let scanner = ProcScanner::new(proc_root);
        let holders = scanner.holders(Path::new("/custom-mounts/nas1")).unwrap();
        assert_eq!(
            holders,
            vec![
                Holder { pid: 10, command: "bash".into() },
                Holder { pid: 20, command: "vim".into() },
            ]
        );
    }

    #[test]
    fn test_prefix_is_component_wise() {
        let dir = TempDir::new().unwrap();
        process(dir.path(), 10, "bash", "/custom-mounts/nas10", &[]);
        let scanner = ProcScanner::new(dir.path());
        assert!(scanner.holders(Path::new("/custom-mounts/nas1")).unwrap().is_empty());
    }

    #[test]
    fn test_deleted_file_still_counts() {
        let dir = TempDir::new().unwrap();
        process(dir.path(), 7, "less", "/", &["/custom-mounts/nas1/x (deleted)"]);
        let scanner = ProcScanner::new(dir.path());
        assert_eq!(scanner.holders(Path::new("/custom-mounts/nas1")).unwrap().len(), 1);
    }

    #[test]
    fn test_missing_proc_root_is_error() {
        let scanner = ProcScanner::new("/nonexistent/proc");
        assert!(scanner.holders(Path::new("/x")).is_err());
    }
}
