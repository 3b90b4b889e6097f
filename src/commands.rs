//! Remote command builder.
//!
//! Every provisioning primitive maps to a [`RemoteCommand`]: one or
//! more argument vectors joined by `&&` or `||`. Nothing here runs
//! anything; the [`Remote`](crate::ssh::Remote) executor sends the
//! shell form to the host.

use std::fmt;

use crate::error::{ProvisionError, ProvisionResult};

pub const SSHD_CONFIG: &str = "/etc/ssh/sshd_config";
pub const SSHD_CONFIG_DROP_INS: &str = "/etc/ssh/sshd_config.d/*.conf";
pub const DEFAULT_SHELL: &str = "/bin/bash";

/// How the steps of a chained command are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Join {
    /// Every step must succeed (`&&`).
    All,
    /// The first step that succeeds wins (`||`).
    Any,
}

impl Join {
    const fn operator(self) -> &'static str {
        match self {
            Self::All => "&&",
            Self::Any => "||",
        }
    }
}

/// A command to run on a remote host, kept as argument vectors
/// until it is rendered for the remote shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCommand {
    steps: Vec<Vec<String>>,
    join: Join,
}

impl RemoteCommand {
    #[must_use]
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            steps: vec![args.into_iter().map(Into::into).collect()],
            join: Join::All,
        }
    }

    #[must_use]
    pub fn chain(steps: Vec<Self>, join: Join) -> Self {
        Self {
            steps: steps.into_iter().flat_map(|c| c.steps).collect(),
            join,
        }
    }

    #[must_use]
    pub fn steps(&self) -> &[Vec<String>] {
        &self.steps
    }

    #[must_use]
    pub const fn join(&self) -> Join {
        self.join
    }

    /// Flattened argument vector with the join operator between
    /// steps.
    #[must_use]
    pub fn argv(&self) -> Vec<&str> {
        let mut argv = Vec::new();
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                argv.push(self.join.operator());
            }
            argv.extend(step.iter().map(String::as_str));
        }
        argv
    }

    /// Render for a POSIX shell. Each argument is quoted so the
    /// remote side sees exactly the vector built here.
    pub fn to_shell(&self) -> ProvisionResult<String> {
        let separator = format!(" {} ", self.join.operator());
        let mut rendered = Vec::with_capacity(self.steps.len());
        for step in &self.steps {
            let quoted = shlex::try_join(step.iter().map(String::as_str)).map_err(|e| {
                ProvisionError::InvalidConfig(format!("cannot quote remote command: {e}"))
            })?;
            rendered.push(quoted);
        }
        Ok(rendered.join(&separator))
    }
}

impl fmt::Display for RemoteCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.argv().join(" "))
    }
}

/// Home directory of a user on the remote host.
#[must_use]
pub fn home_dir(username: &str) -> String {
    if username == "root" {
        "/root".to_string()
    } else {
        format!("/home/{username}")
    }
}

#[must_use]
pub fn ssh_dir(username: &str) -> String {
    format!("{}/.ssh", home_dir(username))
}

#[must_use]
pub fn authorized_keys_path(username: &str) -> String {
    format!("{}/authorized_keys", ssh_dir(username))
}

/// Quote a value as a single-quoted shell literal.
#[must_use]
pub fn single_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

/// Trivial command used to probe a connection.
#[must_use]
pub fn noop() -> RemoteCommand {
    RemoteCommand::new(["true"])
}

#[must_use]
pub fn user_exists(username: &str) -> RemoteCommand {
    RemoteCommand::new(["id", username])
}

#[must_use]
pub fn create_user(username: &str) -> RemoteCommand {
    RemoteCommand::new([
        "sudo",
        "useradd",
        "--create-home",
        "--shell",
        DEFAULT_SHELL,
        username,
    ])
}

#[must_use]
pub fn ensure_ssh_directory(username: &str) -> RemoteCommand {
    let dir = ssh_dir(username);
    let keys = authorized_keys_path(username);
    let owner = format!("{username}:{username}");

    RemoteCommand::chain(
        vec![
            RemoteCommand::new(["sudo", "mkdir", "-p", &dir]),
            RemoteCommand::new(["sudo", "touch", &keys]),
            RemoteCommand::new(["sudo", "chmod", "700", &dir]),
            RemoteCommand::new(["sudo", "chmod", "600", &keys]),
            RemoteCommand::new(["sudo", "chown", "-R", &owner, &dir]),
        ],
        Join::All,
    )
}

/// Append `key` to the user's `authorized_keys` unless an identical
/// line is already there. A missing trailing newline in the file is
/// repaired first so the key lands on its own line.
#[must_use]
pub fn add_public_key(username: &str, key: &str) -> RemoteCommand {
    let file = authorized_keys_path(username);
    let quoted = single_quote(key);

    let script = format!(
        "grep -qxF -- {quoted} {file} || \
         {{ [ ! -s {file} ] || [ -z \"$(tail -c 1 {file})\" ] || echo >> {file}; \
         printf '%s\\n' {quoted} >> {file}; }}"
    );
    RemoteCommand::new(["sudo", "sh", "-c", &script])
}

#[must_use]
pub fn add_to_group(username: &str, group: &str) -> RemoteCommand {
    RemoteCommand::new(["sudo", "usermod", "-a", "-G", group, username])
}

/// Read `username`'s `authorized_keys` while logged in as
/// `connected_as`.
#[must_use]
pub fn read_authorized_keys(username: &str, connected_as: &str) -> RemoteCommand {
    as_owner_of(username, connected_as, ["cat", &authorized_keys_path(username)])
}

/// Succeeds if `username`'s `authorized_keys` exists and is non-empty.
#[must_use]
pub fn has_authorized_keys(username: &str, connected_as: &str) -> RemoteCommand {
    as_owner_of(
        username,
        connected_as,
        ["test", "-s", &authorized_keys_path(username)],
    )
}

/// Prefix `sudo` unless `connected_as` can already read files owned
/// by `owner`.
fn as_owner_of<const N: usize>(
    owner: &str,
    connected_as: &str,
    args: [&str; N],
) -> RemoteCommand {
    if connected_as == "root" || connected_as == owner {
        RemoteCommand::new(args)
    } else {
        RemoteCommand::new(std::iter::once("sudo").chain(args))
    }
}

#[must_use]
pub fn disable_root_login() -> RemoteCommand {
    set_sshd_directive("PermitRootLogin", "no")
}

#[must_use]
pub fn disable_password_authentication() -> RemoteCommand {
    set_sshd_directive("PasswordAuthentication", "no")
}

#[must_use]
pub fn restart_sshd() -> RemoteCommand {
    RemoteCommand::chain(
        vec![
            RemoteCommand::new(["sudo", "systemctl", "restart", "sshd"]),
            RemoteCommand::new(["sudo", "systemctl", "restart", "ssh"]),
            RemoteCommand::new(["sudo", "service", "ssh", "restart"]),
            RemoteCommand::new(["sudo", "service", "sshd", "restart"]),
        ],
        Join::Any,
    )
}

/// Rewrite every active or commented occurrence of `directive` to
/// `directive value`, matching the keyword case-insensitively as sshd
/// does. Drop-ins are rewritten too since they take precedence on
/// distributions that ship them. If the main config still has no
/// global occurrence, the line is inserted before the first `Match`
/// block, or appended when there is none.
fn set_sshd_directive(directive: &str, value: &str) -> RemoteCommand {
    let line = format!("{directive} {value}");
    let quoted_line = single_quote(&line);
    let expression = single_quote(&format!(
        "s/^#?[[:space:]]*{directive}([[:space:]].*)?$/{line}/I"
    ));
    let global_section = single_quote("tolower($1) == \"match\" { exit } { print }");
    let insert = single_quote(
        "!done && tolower($1) == \"match\" { print line; done = 1 } \
         { print } \
         END { if (!done) print line }",
    );

    let script = format!(
        "for c in {SSHD_CONFIG} {SSHD_CONFIG_DROP_INS}; do \
         if [ -f \"$c\" ]; then sed -i -E {expression} \"$c\" || exit 1; fi; done; \
         awk {global_section} {SSHD_CONFIG} | grep -qixF {quoted_line} && exit 0; \
         awk -v line={quoted_line} {insert} {SSHD_CONFIG} > {SSHD_CONFIG}.tmp && \
         cat {SSHD_CONFIG}.tmp > {SSHD_CONFIG} && rm -f {SSHD_CONFIG}.tmp"
    );
    RemoteCommand::new(["sudo", "sh", "-c", &script])
}
