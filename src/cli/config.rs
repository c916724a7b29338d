use crate::cli::CliContext;
use crate::core::action_log::Action;
use crate::core::config_store;
use anyhow::{anyhow, Result};
use clap::{Args, Subcommand};
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Table};

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print every setting
    Show,
    /// Change one setting and save the file
    Set(SetArgs),
}

#[derive(Args, Debug)]
pub struct SetArgs {
    pub key: String,
    pub value: String,
}

pub fn run(ctx: &CliContext, cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show => run_show(ctx),
        ConfigCommand::Set(args) => run_set(ctx, args),
    }
}

fn run_show(ctx: &CliContext) -> Result<()> {
    println!("Config file: {}", ctx.config_path.display());
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        Cell::new("Key").add_attribute(Attribute::Bold),
        Cell::new("Value").add_attribute(Attribute::Bold),
    ]);
    for (key, value) in ctx.config.entries() {
        table.add_row(vec![key.to_string(), value]);
    }
    println!("{}", table);
    Ok(())
}

fn run_set(ctx: &CliContext, args: SetArgs) -> Result<()> {
    let mut config = ctx.config.clone();
    let result = config
        .set(&args.key, &args.value)
        .map_err(|e| anyhow!(e))
        .and_then(|_| config_store::save(&ctx.config_path, &config).map_err(Into::into));
    ctx.record(
        Action::new("config-set", &args.key).with_detail(&args.value),
        &result,
    );
    result?;
    println!("{} = {}", args.key, args.value);
    Ok(())
}
