use crate::cli::CliContext;
use crate::core::action_log::ActionLog;
use anyhow::Result;
use chrono::{DateTime, Local};
use clap::{Args, Subcommand};
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Table};

#[derive(Subcommand, Debug)]
pub enum LogCommand {
    /// Display recent actions
    Show(LogShowArgs),
    /// Verify the hash chain
    Verify,
}

#[derive(Args, Debug)]
pub struct LogShowArgs {
    /// Maximum number of entries to display
    #[arg(long, default_value_t = 50)]
    pub limit: usize,
}

pub fn run(ctx: &CliContext, cmd: LogCommand) -> Result<()> {
    let log = ActionLog::new(&ctx.config);
    match cmd {
        LogCommand::Show(args) => run_show(&log, args),
        LogCommand::Verify => run_verify(&log),
    }
}

fn run_show(log: &ActionLog, args: LogShowArgs) -> Result<()> {
    let entries = log.read(Some(args.limit))?;
    if entries.is_empty() {
        println!("No actions recorded in {}", log.path().display());
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        Cell::new("Timestamp").add_attribute(Attribute::Bold),
        Cell::new("Action").add_attribute(Attribute::Bold),
        Cell::new("Mount").add_attribute(Attribute::Bold),
        Cell::new("Actor").add_attribute(Attribute::Bold),
        Cell::new("Result").add_attribute(Attribute::Bold),
    ]);

    for entry in &entries {
        let local: DateTime<Local> = entry.timestamp.into();
        let result = if entry.result.success {
            "OK".to_string()
        } else {
            format!("FAIL: {}", entry.result.error.as_deref().unwrap_or("?"))
        };
        table.add_row(vec![
            local.format("%Y-%m-%d %H:%M:%S").to_string(),
            entry.action.clone(),
            entry.mount.clone(),
            entry.actor.clone(),
            result,
        ]);
    }

    println!("{}", table);
    println!("\n{} entries shown.", entries.len());
    Ok(())
}

fn run_verify(log: &ActionLog) -> Result<()> {
    let (total, errors) = log.verify()?;
    if total == 0 {
        println!("No actions to verify.");
        return Ok(());
    }

    for err in &errors {
        println!("  [FAIL] {}", err);
    }
    println!();
    if errors.is_empty() {
        println!("Action log: {} entries verified, 0 errors", total);
        Ok(())
    } else {
        anyhow::bail!("action log: {} entries, {} errors", total, errors.len())
    }
}
