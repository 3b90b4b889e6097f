//! Per-host provisioning: deploy user, SSH trust, group membership
//! and, once a key is in place, SSH hardening.

use std::fmt;

use tracing::{info, warn};

use crate::commands;
use crate::config::extension::split_keys;
use crate::error::{ProvisionError, ProvisionResult};
use crate::harden::{self, HardenOutcome, HardeningPolicy};
use crate::probe;
use crate::ssh::{Connection, Remote};

/// What every host should end up with. Derived once per session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningTarget {
    pub user: String,
    /// Keys to install, in configuration order. Empty means "keep the
    /// user's existing keys, or borrow root's".
    pub keys: Vec<String>,
    pub group: String,
    pub policy: HardeningPolicy,
}

/// The step a host failed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Connection,
    UserCreation,
    KeyInstallation,
    GroupMembership,
    Hardening,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connection => "connection",
            Self::UserCreation => "user creation",
            Self::KeyInstallation => "key installation",
            Self::GroupMembership => "group membership",
            Self::Hardening => "hardening",
        };
        f.write_str(name)
    }
}

/// Where the installed keys came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    /// `keys` / `key_data` in the extension block.
    Configured,
    /// Nothing configured and the user already had keys; none were
    /// installed.
    Existing,
    /// Nothing configured; root's `authorized_keys` were copied.
    Root,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hardening {
    Applied(HardenOutcome),
    /// No key was installed in this run, so locking down SSH could
    /// leave the host unreachable.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostReport {
    pub connection: Connection,
    pub user_created: bool,
    pub key_source: KeySource,
    pub keys_installed: usize,
    pub hardening: Hardening,
}

#[derive(Debug)]
pub struct HostFailure {
    pub stage: Stage,
    pub error: ProvisionError,
}

impl fmt::Display for HostFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.stage, self.error)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The deploy user is root; there is nothing to create.
    RootUser,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RootUser => f.write_str("ssh.user is root"),
        }
    }
}

#[derive(Debug)]
pub enum ProvisioningOutcome {
    Provisioned { host: String, report: HostReport },
    Failed { host: String, failure: HostFailure },
    Skipped(SkipReason),
}

impl ProvisioningOutcome {
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    #[must_use]
    pub fn host(&self) -> Option<&str> {
        match self {
            Self::Provisioned { host, .. } | Self::Failed { host, .. } => Some(host),
            Self::Skipped(_) => None,
        }
    }
}

/// Provisions one host at a time over a [`Remote`].
pub struct HostProvisioner<'a, R: Remote + ?Sized> {
    remote: &'a R,
    target: &'a ProvisioningTarget,
    port: u16,
}

impl<'a, R: Remote + ?Sized> HostProvisioner<'a, R> {
    #[must_use]
    pub const fn new(remote: &'a R, target: &'a ProvisioningTarget, port: u16) -> Self {
        Self {
            remote,
            target,
            port,
        }
    }

    pub fn provision(&self, host: &str) -> ProvisioningOutcome {
        info!("Provisioning {host}...");
        match self.run(host) {
            Ok(report) => {
                info!("Done provisioning {host}");
                ProvisioningOutcome::Provisioned {
                    host: host.to_string(),
                    report,
                }
            }
            Err(failure) => ProvisioningOutcome::Failed {
                host: host.to_string(),
                failure,
            },
        }
    }

    fn run(&self, host: &str) -> Result<HostReport, HostFailure> {
        let user = self.target.user.as_str();

        let connection = probe::establish(self.remote, host, user, self.port)
            .map_err(at(Stage::Connection))?;

        let exists = self
            .remote
            .test(&connection, &commands::user_exists(user))
            .map_err(at(Stage::UserCreation))?;

        // Keys are resolved before anything is changed on the host.
        let (key_source, keys) = self
            .resolve_keys(&connection, exists)
            .map_err(at(Stage::KeyInstallation))?;

        if !exists {
            info!("Creating user {user}...");
            self.remote
                .execute(&connection, &commands::create_user(user))
                .map_err(at(Stage::UserCreation))?;
        }

        self.remote
            .execute(&connection, &commands::ensure_ssh_directory(user))
            .map_err(at(Stage::KeyInstallation))?;

        for key in &keys {
            self.remote
                .execute(&connection, &commands::add_public_key(user, key))
                .map_err(at(Stage::KeyInstallation))?;
        }

        info!("Adding {user} to {} group...", self.target.group);
        self.remote
            .execute(&connection, &commands::add_to_group(user, &self.target.group))
            .map_err(at(Stage::GroupMembership))?;

        let hardening = if keys.is_empty() {
            warn!("Skipping SSH hardening on {host}: no SSH keys installed in this run");
            Hardening::Skipped
        } else {
            let outcome = harden::harden(self.remote, &connection, self.target.policy)
                .map_err(at(Stage::Hardening))?;
            Hardening::Applied(outcome)
        };

        Ok(HostReport {
            connection,
            user_created: !exists,
            key_source,
            keys_installed: keys.len(),
            hardening,
        })
    }

    fn resolve_keys(
        &self,
        connection: &Connection,
        user_exists: bool,
    ) -> ProvisionResult<(KeySource, Vec<String>)> {
        let user = self.target.user.as_str();
        let connected_as = connection.user.as_str();

        if !self.target.keys.is_empty() {
            return Ok((KeySource::Configured, self.target.keys.clone()));
        }

        if user_exists
            && self
                .remote
                .test(connection, &commands::has_authorized_keys(user, connected_as))?
        {
            info!("User {user} already has authorized_keys, skipping key setup");
            return Ok((KeySource::Existing, Vec::new()));
        }

        info!("No keys configured, using root's authorized_keys...");
        let no_keys = || ProvisionError::NoKeysAvailable(connection.host.clone());

        if !self
            .remote
            .test(connection, &commands::has_authorized_keys("root", connected_as))?
        {
            return Err(no_keys());
        }

        let content = self
            .remote
            .capture(connection, &commands::read_authorized_keys("root", connected_as))?;
        let keys = split_keys(&content);
        if keys.is_empty() {
            return Err(no_keys());
        }

        Ok((KeySource::Root, keys))
    }
}

fn at(stage: Stage) -> impl FnOnce(ProvisionError) -> HostFailure {
    move |error| HostFailure { stage, error }
}
