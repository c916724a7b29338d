//! CLI routing and command dispatch.

use crate::core::action_log::{Action, ActionLog};
use crate::core::config_store;
use crate::core::context::MountContext;
use crate::core::error::MountError;
use crate::models::config::AppConfig;
use crate::util::in_use::ProcScanner;
use crate::util::journald;
use crate::util::privilege;
use crate::util::systemd::Systemctl;
use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::fmt::Display;
use std::path::PathBuf;

pub mod config;
pub mod credential;
pub mod definition;
pub mod doctor;
pub mod log;
pub mod mount;

/// Shared context passed to all command handlers.
pub struct CliContext {
    pub config: AppConfig,
    pub config_path: PathBuf,
    pub non_interactive: bool,
    pub init: Systemctl,
    pub probe: ProcScanner,
}

impl CliContext {
    pub fn mounts(&self) -> MountContext<'_> {
        MountContext::new(&self.config, &self.init, &self.probe)
    }

    /// Append an action-log entry and optionally forward it to journald.
    /// A failing log never fails the command itself.
    pub fn record<T, E: Display>(&self, action: Action, result: &std::result::Result<T, E>) {
        let (success, error) = match result {
            Ok(_) => (true, None),
            Err(e) => (false, Some(e.to_string())),
        };
        let log = ActionLog::new(&self.config);
        match log.record(action, success, error) {
            Ok(entry) => {
                if self.config.journald_audit {
                    // Entries carry names and outcomes only, never credential content.
                    if let Ok(line) = serde_json::to_string(&entry) {
                        journald::forward_line(journald::TAG, &line);
                    }
                }
            }
            Err(e) => eprintln!("warning: action log failed: {:#}", e),
        }
    }

    /// Record a command refused before reaching the core and return its error.
    pub fn refuse(&self, action: Action, message: impl Into<String>) -> anyhow::Error {
        let message = message.into();
        self.record(action, &Err::<(), _>(&message));
        anyhow::anyhow!(message)
    }

    /// Record the outcome of a core operation and turn it into a CLI result,
    /// printing the remediation for errors the operator can fix.
    pub fn conclude<T>(&self, action: Action, result: std::result::Result<T, MountError>) -> Result<T> {
        let logged = result
            .as_ref()
            .map(|_| ())
            .map_err(|e| format!("{}: {}", e.kind(), e));
        self.record(action, &logged);
        result.map_err(|e| {
            if let Some(hint) = remediation(&e) {
                eprintln!("hint: {}", hint);
            }
            e.into()
        })
    }
}

fn remediation(err: &MountError) -> Option<String> {
    match err {
        MountError::InvalidName(_) => Some("mount names may contain only letters, digits, '.', '_' and '-'".into()),
        MountError::InvalidDefinition { name, .. } | MountError::StillInvalid { name, .. } => Some(format!(
            "fix the definition with `mountkeeper edit {}` (or by hand), then run `mountkeeper repair {}`",
            name, name
        )),
        MountError::MissingTarget { name, .. } => Some(format!(
            "create it with `mountkeeper mkdir {}` or re-run activate with --create-target",
            name
        )),
        MountError::ResourceBusy { .. } => {
            Some("close the listed processes or leave the directory, then retry".into())
        }
        MountError::NotInstalled(_) => Some("activate the mount first to install its unit".into()),
        _ => None,
    }
}

#[derive(Parser, Debug)]
#[command(name = "mountkeeper", version, about = "Manage systemd mount units from tracked definitions")]
pub struct Cli {
    /// Configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Run in non-interactive mode (no prompts, suitable for automation)
    #[arg(long, global = true, env = "MOUNTKEEPER_NON_INTERACTIVE")]
    pub non_interactive: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        let config_path = config_store::resolve_path(self.config);

        // Root is checked before anything is read or written.
        if self.command.requires_root() {
            privilege::require_root(self.command.name())?;
        }

        let config = config_store::load(&config_path)?;
        tracing::debug!(path = %config_path.display(), "configuration loaded");

        let ctx = CliContext {
            config,
            config_path,
            non_interactive: self.non_interactive,
            init: Systemctl,
            probe: ProcScanner::default(),
        };

        match self.command {
            Commands::List(args) => mount::run_list(&ctx, args),
            Commands::Status(args) => mount::run_status(&ctx, args),
            Commands::Show(args) => mount::run_show(&ctx, args),
            Commands::Activate(args) => mount::run_activate(&ctx, args),
            Commands::Deactivate(args) => mount::run_deactivate(&ctx, args),
            Commands::Enable(args) => mount::run_enable(&ctx, args),
            Commands::Disable(args) => mount::run_disable(&ctx, args),
            Commands::Automount(args) => mount::run_automount(&ctx, args),
            Commands::Repair(args) => mount::run_repair(&ctx, args),
            Commands::Mkdir(args) => mount::run_mkdir(&ctx, args),
            Commands::Create(args) => definition::run_create(&ctx, args),
            Commands::Edit(args) => definition::run_edit(&ctx, args),
            Commands::Remove(args) => definition::run_remove(&ctx, args),
            Commands::Credential { command } => credential::run(&ctx, command),
            Commands::Config { command } => config::run(&ctx, command),
            Commands::Log { command } => log::run(&ctx, command),
            Commands::Doctor(args) => doctor::run(&ctx, args),
        }
    }
}

/// A single mount name argument.
#[derive(Args, Debug)]
pub struct NameArgs {
    /// Mount name
    pub name: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List every known mount with its status
    List(mount::ListArgs),
    /// Print the status line of a mount
    Status(NameArgs),
    /// Show definition, status and credential reference of a mount
    Show(NameArgs),
    /// Install and start a mount
    Activate(mount::ActivateArgs),
    /// Stop and uninstall a mount
    Deactivate(NameArgs),
    /// Start a mount at boot
    Enable(NameArgs),
    /// Stop starting a mount at boot
    Disable(NameArgs),
    /// Mount on first access through a companion automount unit
    Automount(mount::AutomountArgs),
    /// Re-validate a definition after editing it
    Repair(NameArgs),
    /// Create the target directory of a mount
    Mkdir(NameArgs),
    /// Create a mount definition
    Create(definition::CreateArgs),
    /// Change fields of a mount definition
    Edit(definition::EditArgs),
    /// Delete a mount definition (installed units are kept)
    Remove(definition::RemoveArgs),
    /// Write or inspect credential files
    Credential {
        #[command(subcommand)]
        command: credential::CredentialCommand,
    },
    /// Show or change configuration
    Config {
        #[command(subcommand)]
        command: config::ConfigCommand,
    },
    /// View or verify the action log
    Log {
        #[command(subcommand)]
        command: log::LogCommand,
    },
    /// Diagnose installation and configuration (safe, read-only)
    Doctor(doctor::DoctorArgs),
}

impl Commands {
    /// Whether this command requires root privileges.
    pub fn requires_root(&self) -> bool {
        matches!(
            self,
            Commands::Activate(_)
                | Commands::Deactivate(_)
                | Commands::Enable(_)
                | Commands::Disable(_)
                | Commands::Automount(_)
                | Commands::Mkdir(_)
                | Commands::Create(_)
                | Commands::Edit(_)
                | Commands::Remove(_)
                | Commands::Credential {
                    command: credential::CredentialCommand::Smb(_)
                        | credential::CredentialCommand::Nfs(_)
                }
                | Commands::Config {
                    command: config::ConfigCommand::Set(_)
                }
        )
    }

    /// Command name for error messages.
    pub fn name(&self) -> &str {
        match self {
            Commands::List(_) => "list",
            Commands::Status(_) => "status",
            Commands::Show(_) => "show",
            Commands::Activate(_) => "activate",
            Commands::Deactivate(_) => "deactivate",
            Commands::Enable(_) => "enable",
            Commands::Disable(_) => "disable",
            Commands::Automount(_) => "automount",
            Commands::Repair(_) => "repair",
            Commands::Mkdir(_) => "mkdir",
            Commands::Create(_) => "create",
            Commands::Edit(_) => "edit",
            Commands::Remove(_) => "remove",
            Commands::Credential { .. } => "credential",
            Commands::Config { .. } => "config",
            Commands::Log { .. } => "log",
            Commands::Doctor(_) => "doctor",
        }
    }
}
