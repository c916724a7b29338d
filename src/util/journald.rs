//! Optional forwarding of action-log lines to journald via systemd-cat.
//!
//! Best effort: a missing or failing systemd-cat never fails a command.

use std::io::Write;
use std::process::{Command, Stdio};

pub const TAG: &str = "mountkeeper";

pub fn systemd_cat_available() -> bool {
    Command::new("systemd-cat")
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

pub fn forward_line(tag: &str, line: &str) {
    if !systemd_cat_available() {
        tracing::debug!("systemd-cat not available, journald forwarding skipped");
        return;
    }

    let mut child = match Command::new("systemd-cat")
        .arg("-t")
        .arg(tag)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
    {
        Ok(c) => c,
        Err(e) => {
            tracing::debug!(error = %e, "systemd-cat spawn failed");
            return;
        }
    };

    if let Some(mut stdin) = child.stdin.take() {
        let _ = stdin.write_all(line.as_bytes());
        let _ = stdin.write_all(b"\n");
    }

    let _ = child.wait();
}
