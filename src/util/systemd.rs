use crate::core::system::{InitSystem, SystemError};
use std::process::{Command, Stdio};

/// `systemctl` on the local host.
#[derive(Debug, Clone, Default)]
pub struct Systemctl;

impl Systemctl {
    pub fn available() -> bool {
        Command::new("systemctl")
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }
}

impl InitSystem for Systemctl {
    fn is_active(&self, unit: &str) -> bool {
        Command::new("systemctl")
            .args(["is-active", "--quiet", unit])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn is_enabled(&self, unit: &str) -> bool {
        // is-enabled exits 0 for static, alias and indirect units as well.
        match Command::new("systemctl")
            .args(["is-enabled", unit])
            .stderr(Stdio::null())
            .output()
        {
            Ok(output) => enabled_state(&String::from_utf8_lossy(&output.stdout)),
            Err(_) => false,
        }
    }

    fn start(&self, unit: &str) -> Result<(), SystemError> {
        run(&["start", unit])
    }

    fn stop(&self, unit: &str) -> Result<(), SystemError> {
        run(&["stop", unit])
    }

    fn enable(&self, unit: &str) -> Result<(), SystemError> {
        run(&["enable", unit])
    }

    fn disable(&self, unit: &str) -> Result<(), SystemError> {
        run(&["disable", unit])
    }

    fn reload(&self) -> Result<(), SystemError> {
        run(&["daemon-reload"])
    }

    fn status_text(&self, unit: &str) -> String {
        // Exits non-zero for inactive units; the text is what matters.
        match Command::new("systemctl")
            .args(["status", "--no-pager", "--full", unit])
            .output()
        {
            Ok(output) => String::from_utf8_lossy(&output.stdout).into_owned(),
            Err(e) => format!("systemctl status unavailable: {}", e),
        }
    }
}

fn run(args: &[&str]) -> Result<(), SystemError> {
    let command = format!("systemctl {}", args.join(" "));
    tracing::debug!(%command, "running");
    let output = Command::new("systemctl")
        .args(args)
        .output()
        .map_err(|e| SystemError::new(&command, e.to_string()))?;
    if output.status.success() {
        return Ok(());
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    Err(SystemError::new(
        command,
        format!("{}{}", stdout, stderr).trim().to_string(),
    ))
}

/// Whether `systemctl is-enabled` output means the unit starts at boot.
fn enabled_state(text: &str) -> bool {
    matches!(text.trim(), "enabled" | "enabled-runtime")
}
