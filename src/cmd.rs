use std::process::{Command, Output, Stdio};

use crate::error::{ProvisionError, ProvisionResult};

/// Run a local program and capture its exit status, stdout and
/// stderr. A non-zero exit is not an error here; callers decide
/// what a failure means.
pub fn output(program: &str, args: &[&str]) -> ProvisionResult<Output> {
    Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ProvisionError::CommandNotFound(program.to_string())
            } else {
                ProvisionError::Io(e)
            }
        })
}

/// Check if a command exists on PATH.
#[must_use]
pub fn command_exists(program: &str) -> bool {
    Command::new("which")
        .arg(program)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|s| s.success())
}

#[must_use]
pub fn format_command(program: &str, args: &[&str]) -> String {
    let mut parts = vec![program.to_string()];
    parts.extend(args.iter().map(|a| (*a).to_string()));
    parts.join(" ")
}
