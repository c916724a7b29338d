//! Owner-only credential files referenced from mount options.
//!
//! Files live at `<credential_root>/.<name>.cred`. Content is only ever
//! written, never read back for display; [`CredentialStore::meta`] reports
//! existence, mode and kind.

use crate::constants;
use crate::models::credential::{Credential, CredentialKind, CredentialMeta};
use crate::models::definition::is_valid_name;
use crate::util::fs as mk_fs;
use anyhow::{bail, Context, Result};
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use zeroize::Zeroizing;

pub struct CredentialStore {
    root: PathBuf,
}

impl CredentialStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(format!(".{}.cred", name))
    }

    pub fn write_smb(&self, name: &str, username: &str, secret: Zeroizing<String>) -> Result<PathBuf> {
        if username.is_empty() {
            bail!("username must not be empty");
        }
        if username.contains(['\n', '\r']) || secret.contains(['\n', '\r']) {
            bail!("username and password must be single-line");
        }
        self.write(
            name,
            &Credential::Smb {
                username: username.to_string(),
                password: secret,
            },
        )
    }

    pub fn write_nfs(&self, name: &str, options: &str) -> Result<PathBuf> {
        self.write(
            name,
            &Credential::Nfs {
                options: options.to_string(),
            },
        )
    }

    fn write(&self, name: &str, credential: &Credential) -> Result<PathBuf> {
        if !is_valid_name(name) {
            bail!("invalid credential name '{}': only [A-Za-z0-9_.-] allowed", name);
        }
        let body = credential.render();
        if body.len() > constants::MAX_SECRET_SIZE {
            bail!(
                "credential exceeds maximum size ({} > {} bytes)",
                body.len(),
                constants::MAX_SECRET_SIZE
            );
        }
        if !self.root.exists() {
            mk_fs::ensure_dir(&self.root, constants::CRED_DIR_MODE)?;
        }

        let path = self.path(name);
        mk_fs::write_atomic(&path, body.as_bytes(), constants::CRED_FILE_MODE)
            .with_context(|| format!("write credential {}", path.display()))?;
        tracing::info!(name, kind = ?credential.kind(), "credential written");
        Ok(path)
    }

    pub fn meta(&self, name: &str) -> CredentialMeta {
        meta_for(name, &self.path(name))
    }
}

/// Describe any credential file, including ones referenced by path from
/// mount options rather than named through the store.
pub fn meta_for(name: &str, path: &Path) -> CredentialMeta {
    let exists = path.is_file();
    CredentialMeta {
        name: name.to_string(),
        path: path.to_path_buf(),
        exists,
        mode: if exists { mk_fs::mode_of(path) } else { None },
        kind: if exists { detect_kind(path) } else { None },
    }
}

fn detect_kind(path: &Path) -> Option<CredentialKind> {
    let file = fs::File::open(path).ok()?;
    let is_smb = BufReader::new(file)
        .lines()
        .map_while(|l| l.ok())
        .any(|l| l.trim_start().starts_with("username="));
    Some(if is_smb {
        CredentialKind::Smb
    } else {
        CredentialKind::Nfs
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, CredentialStore) {
        let dir = TempDir::new().unwrap();
        let store = CredentialStore::new(dir.path().join("creds"));
        (dir, store)
    }

    #[test]
    fn test_smb_credential_written_owner_only() {
        let (_dir, store) = store();
        let path = store
            .write_smb("nas1", "alice", Zeroizing::new("s3cret".into()))
            .unwrap();
        assert_eq!(path, store.root().join(".nas1.cred"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "username=alice\npassword=s3cret\n");
        assert_eq!(mk_fs::mode_of(&path), Some(0o600));
        assert_eq!(mk_fs::mode_of(store.root()), Some(0o700));
    }

    #[test]
    fn test_overwrite_keeps_owner_only() {
        let (_dir, store) = store();
        let path = store.write_nfs("nas2", "sec=krb5").unwrap();
        mk_fs::set_permissions(&path, 0o644).unwrap();
        store.write_nfs("nas2", "sec=krb5p").unwrap();
        assert_eq!(mk_fs::mode_of(&path), Some(0o600));
        assert_eq!(fs::read_to_string(&path).unwrap(), "sec=krb5p\n");
    }

    #[test]
    fn test_existing_root_mode_untouched() {
        let (_dir, store) = store();
        fs::create_dir_all(store.root()).unwrap();
        mk_fs::set_permissions(store.root(), 0o750).unwrap();
        store.write_nfs("n", "x").unwrap();
        assert_eq!(mk_fs::mode_of(store.root()), Some(0o750));
    }

    #[test]
    fn test_rejects_multiline_secret() {
        let (_dir, store) = store();
        let err = store
            .write_smb("nas1", "alice", Zeroizing::new("a\nusername=root".into()))
            .unwrap_err();
        assert!(err.to_string().contains("single-line"));
        assert!(!store.path("nas1").exists());
    }

    #[test]
    fn test_rejects_oversized_and_bad_name() {
        let (_dir, store) = store();
        let big = "x".repeat(constants::MAX_SECRET_SIZE + 1);
        assert!(store.write_nfs("nas1", &big).is_err());
        assert!(store.write_nfs("../etc", "x").is_err());
    }

    #[test]
    fn test_meta_reports_kind_without_content() {
        let (_dir, store) = store();
        assert!(!store.meta("nas1").exists);
        store
            .write_smb("nas1", "alice", Zeroizing::new("hunter2-secret".into()))
            .unwrap();
        store.write_nfs("nas2", "sec=sys").unwrap();

        let smb = store.meta("nas1");
        assert!(smb.exists);
        assert!(smb.is_owner_only());
        assert_eq!(smb.kind, Some(CredentialKind::Smb));
        assert_eq!(store.meta("nas2").kind, Some(CredentialKind::Nfs));

        let json = serde_json::to_string(&smb).unwrap();
        assert!(!json.contains("hunter2"));
    }
}
