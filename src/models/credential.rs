use serde::Serialize;
use std::path::PathBuf;
use zeroize::Zeroizing;

/// Credential file contents.
pub enum Credential {
    Smb {
        username: String,
        password: Zeroizing<String>,
    },
    Nfs {
        options: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialKind {
    Smb,
    Nfs,
}

impl Credential {
    pub fn kind(&self) -> CredentialKind {
        match self {
            Credential::Smb { .. } => CredentialKind::Smb,
            Credential::Nfs { .. } => CredentialKind::Nfs,
        }
    }

    /// File body: two lines for SMB, the options text verbatim for NFS.
    pub fn render(&self) -> Zeroizing<String> {
        match self {
            Credential::Smb { username, password } => Zeroizing::new(format!(
                "username={}\npassword={}\n",
                username,
                password.as_str()
            )),
            Credential::Nfs { options } => {
                let mut body = options.clone();
                if !body.ends_with('\n') {
                    body.push('\n');
                }
                Zeroizing::new(body)
            }
        }
    }
}

/// What may be shown about a credential file: never its content.
#[derive(Debug, Clone, Serialize)]
pub struct CredentialMeta {
    pub name: String,
    pub path: PathBuf,
    pub exists: bool,
    pub mode: Option<u32>,
    pub kind: Option<CredentialKind>,
}

impl CredentialMeta {
    pub fn is_owner_only(&self) -> bool {
        self.mode.map(|m| m & 0o077 == 0).unwrap_or(false)
    }
}
