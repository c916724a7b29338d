//! Read-only diagnostics of the host, the configuration and every definition.

use crate::cli::CliContext;
use crate::constants;
use crate::core::action_log::ActionLog;
use crate::core::credstore;
use crate::core::reconciler;
use crate::util::fs::mode_of;
use crate::util::privilege;
use crate::util::systemd::Systemctl;
use anyhow::{bail, Result};
use clap::Args;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Args, Debug)]
pub struct DoctorArgs {
    /// Treat warnings as failures
    #[arg(long)]
    pub strict: bool,
}

#[derive(Default)]
struct Report {
    pass: u32,
    warn: u32,
    fail: u32,
}

impl Report {
    fn pass(&mut self, msg: impl AsRef<str>) {
        println!("  [PASS] {}", msg.as_ref());
        self.pass += 1;
    }

    fn warn(&mut self, msg: impl AsRef<str>) {
        println!("  [WARN] {}", msg.as_ref());
        self.warn += 1;
    }

    fn fail(&mut self, msg: impl AsRef<str>) {
        println!("  [FAIL] {}", msg.as_ref());
        self.fail += 1;
    }

    fn dir(&mut self, label: &str, path: &Path, required: bool) {
        if path.is_dir() {
            self.pass(format!("{} exists: {}", label, path.display()));
        } else if required {
            self.fail(format!("{} missing: {}", label, path.display()));
        } else {
            self.warn(format!("{} missing: {}", label, path.display()));
        }
    }
}

pub fn run(ctx: &CliContext, args: DoctorArgs) -> Result<()> {
    let config = &ctx.config;
    let mut report = Report::default();

    println!("Doctor: {}", ctx.config_path.display());

    if privilege::is_root() {
        report.pass("running as root");
    } else {
        report.warn("not running as root; mutating commands will be refused");
    }

    if Systemctl::available() {
        report.pass("systemctl available");
    } else {
        report.fail("systemctl not found on PATH");
    }

    report.dir("unit directory", &config.unit_dir, true);
    report.dir("definitions directory", &config.definitions_dir, false);
    report.dir("mount base", &config.mount_base, false);
    report.dir("credential root", &config.credential_root, false);

    if let Some(mode) = mode_of(&config.credential_root) {
        if mode & 0o077 == 0 {
            report.pass(format!("credential root mode ok: {:04o}", mode));
        } else {
            report.warn(format!(
                "credential root mode {:04o} (expected {:04o})",
                mode,
                constants::CRED_DIR_MODE
            ));
        }
    }

    check_definitions(ctx, &mut report)?;
    check_action_log(ctx, &mut report);

    println!();
    println!(
        "Doctor summary: {} pass, {} warn, {} fail",
        report.pass, report.warn, report.fail
    );
    if report.fail > 0 || (args.strict && report.warn > 0) {
        bail!("doctor found problems");
    }
    Ok(())
}

fn check_definitions(ctx: &CliContext, report: &mut Report) -> Result<()> {
    let mounts = ctx.mounts();
    let mut units: BTreeMap<String, String> = BTreeMap::new();
    for name in mounts.definitions.names()? {
        let resolved = reconciler::resolve(&mounts, &name)?;
        if let Some(other) = units.insert(resolved.unit(), name.clone()) {
            report.warn(format!(
                "{}: installs as {}, the same unit as {}",
                name,
                resolved.unit(),
                other
            ));
        }
        let def = match resolved.source_definition() {
            Ok(def) => def,
            Err(e) => {
                report.fail(e.to_string());
                continue;
            }
        };
        report.pass(format!("{}: definition valid", name));

        if resolved.drift() {
            report.warn(format!("{}: installed unit differs from the definition", name));
        }
        if let Some(cred_path) = def.credentials_path() {
            let meta = credstore::meta_for(&name, &cred_path);
            if !meta.exists {
                report.warn(format!("{}: credential file {} missing", name, cred_path.display()));
            } else if !meta.is_owner_only() {
                report.warn(format!(
                    "{}: credential file {} is readable by group or others",
                    name,
                    cred_path.display()
                ));
            }
        }
    }
    Ok(())
}

fn check_action_log(ctx: &CliContext, report: &mut Report) {
    let log = ActionLog::new(&ctx.config);
    if !log.path().exists() {
        report.warn(format!("action log not yet created: {}", log.path().display()));
        return;
    }
    match mode_of(log.path()) {
        Some(mode) if mode == constants::ACTION_LOG_MODE => {
            report.pass(format!("action log mode ok: {:04o}", mode))
        }
        Some(mode) => report.warn(format!(
            "action log mode {:04o} (expected {:04o})",
            mode,
            constants::ACTION_LOG_MODE
        )),
        None => {}
    }
    match log.verify() {
        Ok((total, errors)) if errors.is_empty() => {
            report.pass(format!("action log chain intact ({} entries)", total))
        }
        Ok((_, errors)) => report.fail(format!("action log chain broken: {}", errors.join("; "))),
        Err(e) => report.warn(format!("cannot read action log: {:#}", e)),
    }
}
