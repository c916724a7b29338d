use crate::cli::CliContext;
use crate::constants;
use crate::core::action_log::Action;
use crate::core::credstore::CredentialStore;
use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use comfy_table::{presets::UTF8_FULL, Table};
use dialoguer::Password;
use std::io::Read;
use zeroize::Zeroizing;

#[derive(Subcommand, Debug)]
pub enum CredentialCommand {
    /// Write an SMB/CIFS credential file (username and password)
    Smb(SmbArgs),
    /// Write an NFS credential file (free-form options text)
    Nfs(NfsArgs),
    /// Show whether a credential file exists and its mode
    Show(ShowArgs),
}

#[derive(Args, Debug)]
pub struct SmbArgs {
    /// Credential name, usually the mount name
    pub name: String,

    #[arg(long)]
    pub username: String,

    /// Read the password from stdin instead of an interactive prompt
    #[arg(long)]
    pub password_stdin: bool,
}

#[derive(Args, Debug)]
pub struct NfsArgs {
    pub name: String,

    /// Options text written to the file
    #[arg(long)]
    pub options: String,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    pub name: String,
}

pub fn run(ctx: &CliContext, cmd: CredentialCommand) -> Result<()> {
    let store = CredentialStore::new(&ctx.config.credential_root);
    match cmd {
        CredentialCommand::Smb(args) => run_smb(ctx, &store, args),
        CredentialCommand::Nfs(args) => run_nfs(ctx, &store, args),
        CredentialCommand::Show(args) => run_show(&store, args),
    }
}

fn run_smb(ctx: &CliContext, store: &CredentialStore, args: SmbArgs) -> Result<()> {
    if ctx.non_interactive && !args.password_stdin {
        return Err(ctx.refuse(
            Action::new("credential-smb", &args.name),
            "--non-interactive requires --password-stdin for credential smb",
        ));
    }
    let secret = match read_secret(args.password_stdin, &args.name) {
        Ok(secret) => secret,
        Err(e) => {
            return Err(ctx.refuse(
                Action::new("credential-smb", &args.name),
                format!("{:#}", e),
            ))
        }
    };
    let result = store.write_smb(&args.name, &args.username, secret);
    ctx.record(Action::new("credential-smb", &args.name), &result);
    let path = result?;
    println!("Wrote {} (mode 0600)", path.display());
    println!("Reference it with Options=credentials={}", path.display());
    Ok(())
}

fn run_nfs(ctx: &CliContext, store: &CredentialStore, args: NfsArgs) -> Result<()> {
    let result = store.write_nfs(&args.name, &args.options);
    ctx.record(Action::new("credential-nfs", &args.name), &result);
    let path = result?;
    println!("Wrote {} (mode 0600)", path.display());
    Ok(())
}

fn run_show(store: &CredentialStore, args: ShowArgs) -> Result<()> {
    let meta = store.meta(&args.name);
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.add_row(vec!["Path".to_string(), meta.path.display().to_string()]);
    table.add_row(vec!["Exists".to_string(), meta.exists.to_string()]);
    if meta.exists {
        let mode = meta
            .mode
            .map(|m| format!("{:04o}", m))
            .unwrap_or_else(|| "-".to_string());
        table.add_row(vec!["Mode".to_string(), mode]);
        let kind = match meta.kind {
            Some(k) => format!("{:?}", k).to_lowercase(),
            None => "-".to_string(),
        };
        table.add_row(vec!["Kind".to_string(), kind]);
    }
    println!("{}", table);
    if meta.exists && !meta.is_owner_only() {
        println!("  [WARN] readable by group or others; rewrite it to restore mode 0600");
    }
    Ok(())
}

fn read_secret(from_stdin: bool, name: &str) -> Result<Zeroizing<String>> {
    let secret = if from_stdin {
        let mut buf = Zeroizing::new(String::new());
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("read password from stdin")?;
        Zeroizing::new(buf.trim_end_matches(['\r', '\n']).to_string())
    } else {
        Zeroizing::new(
            Password::new()
                .with_prompt(format!("Password for {}", name))
                .allow_empty_password(false)
                .interact()
                .context("read password from prompt")?,
        )
    };
    if secret.len() > constants::MAX_SECRET_SIZE {
        bail!(
            "password exceeds maximum size ({} bytes, max {} bytes)",
            secret.len(),
            constants::MAX_SECRET_SIZE
        );
    }
    Ok(secret)
}
