use crate::cli::CliContext;
use crate::core::action_log::Action;
use crate::core::definitions;
use crate::core::unit_dir::UnitKind;
use crate::models::definition::RawMount;
use anyhow::{Context, Result};
use clap::Args;
use dialoguer::Confirm;

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Mount name
    pub name: String,

    /// Device, share or export to mount (What=)
    #[arg(long)]
    pub what: String,

    /// Target directory (Where=), defaults to <mount_base>/<name>
    #[arg(long = "where", value_name = "PATH")]
    pub target: Option<String>,

    /// Filesystem type (Type=)
    #[arg(long = "type", value_name = "TYPE")]
    pub fs_type: Option<String>,

    /// Mount options (Options=)
    #[arg(long)]
    pub options: Option<String>,

    /// Description stored in [Unit]
    #[arg(long)]
    pub description: Option<String>,
}

#[derive(Args, Debug)]
pub struct EditArgs {
    /// Mount name
    pub name: String,

    #[arg(long)]
    pub what: Option<String>,

    #[arg(long = "where", value_name = "PATH")]
    pub target: Option<String>,

    #[arg(long = "type", value_name = "TYPE")]
    pub fs_type: Option<String>,

    #[arg(long)]
    pub options: Option<String>,

    #[arg(long)]
    pub description: Option<String>,
}

#[derive(Args, Debug)]
pub struct RemoveArgs {
    /// Mount name
    pub name: String,

    /// Skip the confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,
}

pub fn run_create(ctx: &CliContext, args: CreateArgs) -> Result<()> {
    let mounts = ctx.mounts();
    let target = args.target.unwrap_or_else(|| {
        ctx.config
            .mount_base
            .join(&args.name)
            .display()
            .to_string()
    });
    let raw = RawMount {
        what: Some(args.what),
        r#where: Some(target),
        fs_type: args.fs_type,
        options: args.options,
        description: args.description,
    };

    let result = definitions::create(&mounts, &args.name, raw);
    let def = ctx.conclude(Action::new("create", &args.name), result)?;
    println!(
        "Created definition {}",
        mounts.definitions.path(&args.name, UnitKind::Mount).display()
    );
    println!("Installs as {}", def.unit_name());
    Ok(())
}

pub fn run_edit(ctx: &CliContext, args: EditArgs) -> Result<()> {
    let patch = RawMount {
        what: args.what,
        r#where: args.target,
        fs_type: args.fs_type,
        options: args.options,
        description: args.description,
    };
    if patch == RawMount::default() {
        return Err(ctx.refuse(
            Action::new("edit", &args.name),
            "nothing to change: pass at least one of --what, --where, --type, --options, --description",
        ));
    }

    let result = definitions::update(&ctx.mounts(), &args.name, patch);
    let def = ctx.conclude(Action::new("edit", &args.name), result)?;
    println!("Updated definition {}", args.name);
    println!(
        "Run `mountkeeper activate {}` to install the change as {}.",
        args.name,
        def.unit_name()
    );
    Ok(())
}

pub fn run_remove(ctx: &CliContext, args: RemoveArgs) -> Result<()> {
    if !args.yes {
        if ctx.non_interactive {
            return Err(ctx.refuse(
                Action::new("remove", &args.name),
                "--non-interactive requires --yes for remove",
            ));
        }
        let confirmed = Confirm::new()
            .with_prompt(format!("Remove definition '{}'?", args.name))
            .default(false)
            .interact()
            .context("read confirmation")?;
        if !confirmed {
            println!("Aborted");
            return Ok(());
        }
    }

    let result = definitions::remove(&ctx.mounts(), &args.name);
    ctx.conclude(Action::new("remove", &args.name), result)?;
    println!("Removed definition {}", args.name);
    Ok(())
}
