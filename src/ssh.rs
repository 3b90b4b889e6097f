use std::fmt;

use tracing::debug;

use crate::cmd;
use crate::commands::RemoteCommand;
use crate::config::SshOptions;
use crate::error::{ProvisionError, ProvisionResult};

/// Exit status the OpenSSH client uses for its own failures.
const SSH_TRANSPORT_FAILURE: i32 = 255;

/// The identity a command is run as: host, user and port.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Connection {
    pub host: String,
    pub user: String,
    pub port: u16,
}

impl Connection {
    #[must_use]
    pub fn new(host: &str, user: &str, port: u16) -> Self {
        Self {
            host: host.to_string(),
            user: user.to_string(),
            port,
        }
    }

    #[must_use]
    pub fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.user, self.host, self.port)
    }
}

/// Executes commands on a remote host.
///
/// Implementations must report authentication failures and refused
/// connections as [`ProvisionError::AuthenticationFailed`] and
/// [`ProvisionError::ConnectionRefused`], and a command that ran but
/// exited non-zero as [`ProvisionError::RemoteCommand`].
pub trait Remote {
    /// Run a command and return its trimmed stdout.
    fn capture(&self, connection: &Connection, command: &RemoteCommand) -> ProvisionResult<String>;

    /// Run a command, failing on non-zero exit.
    fn execute(&self, connection: &Connection, command: &RemoteCommand) -> ProvisionResult<()> {
        self.capture(connection, command).map(|_| ())
    }

    /// Run a command and report whether it succeeded. Only a command
    /// failure maps to `false`; transport errors still propagate.
    fn test(&self, connection: &Connection, command: &RemoteCommand) -> ProvisionResult<bool> {
        match self.capture(connection, command) {
            Ok(_) => Ok(true),
            Err(ProvisionError::RemoteCommand { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// [`Remote`] backed by the local OpenSSH client.
#[derive(Debug, Clone)]
pub struct SshExecutor {
    keys: Vec<String>,
    keys_only: bool,
    proxy: Option<String>,
}

impl SshExecutor {
    #[must_use]
    pub fn new(options: &SshOptions) -> Self {
        Self {
            keys: options.identity_files(),
            keys_only: options.keys_only,
            proxy: options.proxy.clone(),
        }
    }

    /// Arguments passed to `ssh` to run `remote_command` over
    /// `connection`.
    #[must_use]
    pub fn args(&self, connection: &Connection, remote_command: &str) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=accept-new".to_string(),
            "-o".to_string(),
            "ConnectTimeout=10".to_string(),
            "-p".to_string(),
            connection.port.to_string(),
        ];
        for key in &self.keys {
            args.push("-i".to_string());
            args.push(key.clone());
        }
        if self.keys_only {
            args.push("-o".to_string());
            args.push("IdentitiesOnly=yes".to_string());
        }
        if let Some(proxy) = &self.proxy {
            args.push("-J".to_string());
            args.push(proxy.clone());
        }
        args.push(connection.destination());
        args.push("--".to_string());
        args.push(remote_command.to_string());
        args
    }
}

impl Remote for SshExecutor {
    fn capture(&self, connection: &Connection, command: &RemoteCommand) -> ProvisionResult<String> {
        let shell = command.to_shell()?;
        let args = self.args(connection, &shell);
        let refs: Vec<&str> = args.iter().map(String::as_str).collect();
        debug!("{}", cmd::format_command("ssh", &refs));

        let output = cmd::output("ssh", &refs)?;
        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).trim().to_string());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        debug!("stderr: {stderr}");
        Err(classify_failure(
            connection,
            &command.to_string(),
            output.status.code(),
            &stderr,
        ))
    }
}

/// Turn a failed `ssh` invocation into the matching error variant.
///
/// Exit status 255 comes from the client itself, so its stderr
/// decides between an authentication failure, a refused connection
/// and any other transport problem. Every other status belongs to
/// the remote command.
#[must_use]
pub fn classify_failure(
    connection: &Connection,
    command: &str,
    status: Option<i32>,
    stderr: &str,
) -> ProvisionError {
    let destination = connection.to_string();

    if status != Some(SSH_TRANSPORT_FAILURE) {
        return ProvisionError::RemoteCommand {
            destination,
            command: command.to_string(),
            status,
            stderr: stderr.to_string(),
        };
    }

    if stderr.contains("Permission denied") || stderr.contains("Too many authentication failures")
    {
        ProvisionError::AuthenticationFailed { destination }
    } else if stderr.contains("Connection refused") {
        ProvisionError::ConnectionRefused { destination }
    } else {
        let detail = stderr
            .lines()
            .rev()
            .find(|l| !l.trim().is_empty())
            .unwrap_or("ssh exited with status 255")
            .trim()
            .to_string();
        ProvisionError::Unreachable {
            destination,
            detail,
        }
    }
}
