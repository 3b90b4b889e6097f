use tracing::{info, warn};

use crate::config::ProvisionConfig;
use crate::error::ProvisionResult;
use crate::provisioner::{HostProvisioner, ProvisioningOutcome, SkipReason};
use crate::ssh::Remote;

/// One provisioning run over every configured host.
///
/// Constructed per invocation; holds nothing beyond the read-only
/// configuration and the executor.
pub struct Session<'a, R: Remote + ?Sized> {
    config: &'a ProvisionConfig,
    remote: &'a R,
}

impl<'a, R: Remote + ?Sized> Session<'a, R> {
    #[must_use]
    pub const fn new(config: &'a ProvisionConfig, remote: &'a R) -> Self {
        Self { config, remote }
    }

    /// Provision every host in order, one outcome per host.
    ///
    /// Returns a single [`ProvisioningOutcome::Skipped`] without
    /// contacting any host when the deploy user is root. Fails as a
    /// whole only on configuration errors, e.g. a missing public key
    /// file; a host failing never stops the hosts after it.
    pub fn run(&self) -> ProvisionResult<Vec<ProvisioningOutcome>> {
        let user = self.config.user();
        if user == "root" {
            warn!("Skipping user creation: ssh.user is root");
            return Ok(vec![ProvisioningOutcome::Skipped(SkipReason::RootUser)]);
        }

        let target = self.config.target()?;
        let hosts = self.config.hosts();
        info!("Creating user '{user}' on {} host(s)...", hosts.len());

        let provisioner = HostProvisioner::new(self.remote, &target, self.config.ssh().port);
        let outcomes = hosts
            .iter()
            .map(|host| provisioner.provision(host))
            .collect();

        Ok(outcomes)
    }
}

/// True if any host failed.
#[must_use]
pub fn any_failed(outcomes: &[ProvisioningOutcome]) -> bool {
    outcomes.iter().any(ProvisioningOutcome::is_failure)
}
