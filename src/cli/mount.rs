use crate::cli::{CliContext, NameArgs};
use crate::core::action_log::Action;
use crate::core::catalog::{Catalog, CatalogEntry};
use crate::core::credstore;
use crate::core::lifecycle::{self, ActivateOptions, AutomountOptions, Outcome};
use crate::core::reconciler;
use crate::util::path::is_within;
use anyhow::{Context, Result};
use clap::Args;
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Color, Table};
use dialoguer::Confirm;
use std::path::Path;

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Output format
    #[arg(long, default_value = "table", value_parser = ["table", "json"])]
    pub format: String,
}

#[derive(Args, Debug)]
pub struct ActivateArgs {
    /// Mount name
    pub name: String,

    /// Also start the mount at boot
    #[arg(long)]
    pub enable: bool,

    /// Create a missing target directory without asking
    #[arg(long)]
    pub create_target: bool,
}

#[derive(Args, Debug)]
pub struct AutomountArgs {
    /// Mount name
    pub name: String,

    /// Unmount after this many idle seconds
    #[arg(long, value_name = "SECS")]
    pub idle_timeout: Option<u32>,
}

pub fn run_list(ctx: &CliContext, args: ListArgs) -> Result<()> {
    let mounts = ctx.mounts();
    let catalog = Catalog::scan(&mounts)?;
    if catalog.is_empty() && args.format != "json" {
        println!("No mounts found");
        return Ok(());
    }
    let entries = catalog
        .iter()
        .collect::<std::result::Result<Vec<CatalogEntry>, _>>()?;

    if args.format == "json" {
        let json = serde_json::to_string_pretty(&entries).context("serialize list")?;
        println!("{}", json);
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        Cell::new("Name").add_attribute(Attribute::Bold),
        Cell::new("Status").add_attribute(Attribute::Bold),
        Cell::new("Provenance").add_attribute(Attribute::Bold),
        Cell::new("Where").add_attribute(Attribute::Bold),
    ]);
    for entry in entries {
        let target = entry
            .status
            .target
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "-".to_string());
        let mut status = Cell::new(entry.status.to_string());
        if entry.status.state.is_error() {
            status = status.fg(Color::Red);
        }
        table.add_row(vec![
            Cell::new(entry.name),
            status,
            Cell::new(entry.provenance.as_str()),
            Cell::new(target),
        ]);
    }
    println!("{}", table);
    Ok(())
}

pub fn run_status(ctx: &CliContext, args: NameArgs) -> Result<()> {
    let status = reconciler::compute_status(&ctx.mounts(), &args.name)?;
    println!("{}: {}", args.name, status);
    Ok(())
}

pub fn run_show(ctx: &CliContext, args: NameArgs) -> Result<()> {
    let mounts = ctx.mounts();
    let resolved = reconciler::resolve(&mounts, &args.name)?;
    let status = reconciler::status_of(&mounts, &resolved);

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.add_row(vec!["Name".to_string(), args.name.clone()]);
    table.add_row(vec!["Status".to_string(), status.to_string()]);
    let provenance = if resolved.definition.is_some() {
        "defined"
    } else {
        "system-only"
    };
    table.add_row(vec!["Provenance".to_string(), provenance.to_string()]);
    table.add_row(vec!["Unit".to_string(), resolved.unit()]);
    table.add_row(vec![
        "Installed".to_string(),
        mounts
            .installed
            .path(&resolved.stem, crate::core::unit_dir::UnitKind::Mount)
            .display()
            .to_string(),
    ]);
    if let Some(issue) = &status.issue {
        table.add_row(vec!["Problem".to_string(), issue.clone()]);
    }

    let mut warnings = Vec::new();
    if let Ok(def) = resolved.effective() {
        table.add_row(vec!["What".to_string(), def.what.clone()]);
        table.add_row(vec!["Where".to_string(), def.r#where.display().to_string()]);
        table.add_row(vec!["Type".to_string(), def.fs_type.clone()]);
        table.add_row(vec!["Options".to_string(), def.options.clone()]);
        if let Some(description) = &def.description {
            table.add_row(vec!["Description".to_string(), description.clone()]);
        }

        if let Some(cred_path) = def.credentials_path() {
            let meta = credstore::meta_for(&args.name, &cred_path);
            let state = match (meta.exists, meta.mode) {
                (false, _) => "missing".to_string(),
                (true, Some(mode)) => format!("present, mode {:04o}", mode),
                (true, None) => "present".to_string(),
            };
            table.add_row(vec![
                "Credentials".to_string(),
                format!("{} ({})", cred_path.display(), state),
            ]);
            if meta.exists && !meta.is_owner_only() {
                warnings.push(format!(
                    "credential file {} is readable by group or others",
                    cred_path.display()
                ));
            }
            if !is_within(&cred_path, &ctx.config.credential_root) {
                warnings.push(format!(
                    "credential file {} is outside {}",
                    cred_path.display(),
                    ctx.config.credential_root.display()
                ));
            }
        }
    }
    if status.drift {
        warnings.push("installed unit differs from the definition; activate to re-install".to_string());
    }

    println!("{}", table);
    for warning in warnings {
        println!("  [WARN] {}", warning);
    }
    Ok(())
}

pub fn run_activate(ctx: &CliContext, args: ActivateArgs) -> Result<()> {
    let mounts = ctx.mounts();
    let opts = ActivateOptions {
        enable_at_boot: args.enable,
    };
    let create_target = args.create_target;
    let non_interactive = ctx.non_interactive;
    let mut confirm = |path: &Path| -> bool {
        if create_target {
            return true;
        }
        if non_interactive {
            return false;
        }
        Confirm::new()
            .with_prompt(format!("Target {} does not exist. Create it?", path.display()))
            .default(false)
            .interact()
            .unwrap_or(false)
    };

    let result = lifecycle::activate_with_target_prompt(&mounts, &args.name, opts, &mut confirm);
    let mut action = Action::new("activate", &args.name);
    if args.enable {
        action = action.with_detail("enable-at-boot");
    }
    let outcome = ctx.conclude(action, result)?;
    print_outcome("Activated", &outcome);
    Ok(())
}

pub fn run_deactivate(ctx: &CliContext, args: NameArgs) -> Result<()> {
    let result = lifecycle::deactivate(&ctx.mounts(), &args.name);
    let outcome = ctx.conclude(Action::new("deactivate", &args.name), result)?;
    print_outcome("Deactivated", &outcome);
    Ok(())
}

pub fn run_enable(ctx: &CliContext, args: NameArgs) -> Result<()> {
    let result = lifecycle::enable_at_boot(&ctx.mounts(), &args.name);
    let outcome = ctx.conclude(Action::new("enable", &args.name), result)?;
    println!("Enabled {} at boot", outcome.unit);
    Ok(())
}

pub fn run_disable(ctx: &CliContext, args: NameArgs) -> Result<()> {
    let result = lifecycle::disable_at_boot(&ctx.mounts(), &args.name);
    let outcome = ctx.conclude(Action::new("disable", &args.name), result)?;
    println!("Disabled {} at boot", outcome.unit);
    Ok(())
}

pub fn run_automount(ctx: &CliContext, args: AutomountArgs) -> Result<()> {
    let opts = AutomountOptions {
        idle_timeout: args.idle_timeout,
    };
    let result = lifecycle::create_automount(&ctx.mounts(), &args.name, opts);
    let mut action = Action::new("automount", &args.name);
    if let Some(secs) = args.idle_timeout {
        action = action.with_detail(format!("idle-timeout={}", secs));
    }
    let outcome = ctx.conclude(action, result)?;
    print_outcome("Automount active:", &outcome);
    Ok(())
}

pub fn run_repair(ctx: &CliContext, args: NameArgs) -> Result<()> {
    let mounts = ctx.mounts();
    let result = lifecycle::repair(&mounts, &args.name);
    ctx.conclude(Action::new("repair", &args.name), result)?;
    let status = reconciler::compute_status(&mounts, &args.name)?;
    println!("Definition valid. {}: {}", args.name, status);
    Ok(())
}

pub fn run_mkdir(ctx: &CliContext, args: NameArgs) -> Result<()> {
    let result = lifecycle::create_target_dir(&ctx.mounts(), &args.name);
    let path = ctx.conclude(Action::new("mkdir", &args.name), result)?;
    println!("Created {}", path.display());
    Ok(())
}

fn print_outcome(verb: &str, outcome: &Outcome) {
    println!("{} {}", verb, outcome.unit);
    for path in &outcome.changed {
        println!("  updated {}", path.display());
    }
    if outcome.reloaded {
        println!("  systemd reloaded");
    }
}
