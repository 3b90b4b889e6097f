//! First-time host provisioning for Kamal deployments.
//!
//! Before Kamal can deploy to a freshly imaged server it needs a
//! non-root deploy user that it can reach over SSH and that may run
//! Docker. `kamal-provision` reads the same `config/deploy.yml` and,
//! for every host:
//!
//! 1. Finds a user/port pair that connects ([`probe`])
//! 2. Creates the deploy user if it is missing
//! 3. Sets up `~/.ssh` and installs the public keys listed in the
//!    `x-provision` block, or copies root's `authorized_keys`
//! 4. Adds the user to the `docker` group
//! 5. Disables root login and password authentication ([`harden`]),
//!    but only once a key was installed in the same run
//!
//! Every remote step is idempotent, so provisioning can be re-run.
//!
//! # Configuration
//!
//! ```yaml
//! servers:
//!   - 192.0.2.10
//! ssh:
//!   user: deploy
//!   port: 2222
//! x-provision:
//!   keys:
//!     - ~/.ssh/id_ed25519.pub
//!   disable_password_authentication: true
//! ```
//!
//! # Library use
//!
//! ```rust,no_run
//! use kamal_provision::{ProvisionConfig, Session, SshExecutor};
//! use std::path::Path;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = ProvisionConfig::load(Path::new("config/deploy.yml"), None)?;
//!     let executor = SshExecutor::new(config.ssh());
//!
//!     for outcome in Session::new(&config, &executor).run()? {
//!         println!("{outcome:?}");
//!     }
//!     Ok(())
//! }
//! ```

// Allow noisy pedantic lints that don't add value for a
// provisioning tool crate.
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions
)]

pub mod cli;
pub mod cmd;
pub mod commands;
pub mod config;
pub mod error;
pub mod harden;
pub mod init;
pub mod probe;
pub mod provisioner;
pub mod session;
pub mod ssh;

pub use commands::RemoteCommand;
pub use config::{DeployConfig, Extension, ProvisionConfig, SshOptions};
pub use error::{ProvisionError, ProvisionResult};
pub use harden::{HardenOutcome, HardeningPolicy};
pub use provisioner::{HostProvisioner, ProvisioningOutcome, ProvisioningTarget};
pub use session::Session;
pub use ssh::{Connection, Remote, SshExecutor};
