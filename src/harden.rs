use tracing::info;

use crate::commands;
use crate::error::{ProvisionError, ProvisionResult};
use crate::ssh::{Connection, Remote};

/// Which SSH daemon directives to lock down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HardeningPolicy {
    pub disable_root_login: bool,
    pub disable_password_authentication: bool,
}

impl Default for HardeningPolicy {
    fn default() -> Self {
        Self {
            disable_root_login: true,
            disable_password_authentication: true,
        }
    }
}

/// What hardening did on a host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HardenOutcome {
    pub root_login_disabled: bool,
    pub password_authentication_disabled: bool,
    pub sshd_restarted: bool,
}

impl HardenOutcome {
    #[must_use]
    pub const fn changed(&self) -> bool {
        self.root_login_disabled || self.password_authentication_disabled
    }
}

/// Apply `policy` over `connection` and restart the SSH daemon if a
/// directive was rewritten.
///
/// Must only be called once a public key has been installed for the
/// deploy user on this host. Any failure comes back as
/// [`ProvisionError::HardeningFailed`] and is not retried: the host
/// may be partially hardened at that point.
pub fn harden<R: Remote + ?Sized>(
    remote: &R,
    connection: &Connection,
    policy: HardeningPolicy,
) -> ProvisionResult<HardenOutcome> {
    apply(remote, connection, policy).map_err(|e| ProvisionError::HardeningFailed {
        host: connection.host.clone(),
        source: Box::new(e),
    })
}

fn apply<R: Remote + ?Sized>(
    remote: &R,
    connection: &Connection,
    policy: HardeningPolicy,
) -> ProvisionResult<HardenOutcome> {
    let mut outcome = HardenOutcome::default();

    if policy.disable_root_login {
        info!("Disabling root SSH login...");
        remote.execute(connection, &commands::disable_root_login())?;
        outcome.root_login_disabled = true;
    }

    if policy.disable_password_authentication {
        info!("Disabling password authentication...");
        remote.execute(connection, &commands::disable_password_authentication())?;
        outcome.password_authentication_disabled = true;
    }

    if outcome.changed() {
        info!("Restarting SSH service...");
        remote.execute(connection, &commands::restart_sshd())?;
        outcome.sshd_restarted = true;
    }

    Ok(outcome)
}
