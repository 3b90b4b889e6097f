use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use crate::cmd;
use crate::config::{DEFAULT_CONFIG_FILE, ProvisionConfig};
use crate::error::{ProvisionError, ProvisionResult};
use crate::init::{self, InitOutcome};
use crate::provisioner::{Hardening, KeySource, ProvisioningOutcome};
use crate::session::{self, Session};
use crate::ssh::SshExecutor;

#[derive(Debug, Parser)]
#[command(name = "kamal-provision")]
#[command(about = "Provision deploy users on Kamal hosts")]
#[command(version)]
pub struct Cli {
    /// Detailed logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Minimal logging
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to config file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    pub config_file: PathBuf,

    /// Specify destination (staging -> deploy.staging.yml)
    #[arg(short, long, global = true)]
    pub destination: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, Subcommand)]
pub enum Command {
    /// Provision all servers
    Provision,

    /// Initialize x-provision configuration in deploy config
    Init,

    /// Show kamal-provision version
    Version,
}

impl Cli {
    /// Log level implied by `--verbose` / `--quiet`. Quiet wins when
    /// both are given.
    #[must_use]
    pub const fn log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else if self.verbose {
            "debug"
        } else {
            "info"
        }
    }

    /// Dispatch the selected command.
    pub fn run(&self) -> ProvisionResult<ExitCode> {
        match self.command {
            Command::Provision => self.cmd_provision(),
            Command::Init => self.cmd_init(),
            Command::Version => {
                println!("{}", env!("CARGO_PKG_VERSION"));
                Ok(ExitCode::SUCCESS)
            }
        }
    }

    fn cmd_provision(&self) -> ProvisionResult<ExitCode> {
        if !cmd::command_exists("ssh") {
            return Err(ProvisionError::CommandNotFound("ssh".into()));
        }

        let config = ProvisionConfig::load(&self.config_file, self.destination.as_deref())?;
        let executor = SshExecutor::new(config.ssh());

        eprintln!("Provisioning servers...");
        let outcomes = Session::new(&config, &executor).run()?;

        eprintln!();
        for outcome in &outcomes {
            eprintln!("{}", summary_line(outcome));
        }

        if session::any_failed(&outcomes) {
            eprintln!();
            eprintln!("Provisioning failed on one or more hosts");
            Ok(ExitCode::FAILURE)
        } else {
            eprintln!();
            eprintln!("Provisioning complete!");
            Ok(ExitCode::SUCCESS)
        }
    }

    fn cmd_init(&self) -> ProvisionResult<ExitCode> {
        let path = self.config_file.display();
        match init::init(&self.config_file)? {
            InitOutcome::Added => eprintln!("Added x-provision configuration to {path}"),
            InitOutcome::AlreadyPresent => eprintln!("x-provision already exists in {path}"),
        }
        Ok(ExitCode::SUCCESS)
    }
}

/// One line per host for the end-of-run summary.
#[must_use]
pub fn summary_line(outcome: &ProvisioningOutcome) -> String {
    match outcome {
        ProvisioningOutcome::Provisioned { host, report } => {
            let keys = match report.key_source {
                KeySource::Configured => format!("{} key(s) installed", report.keys_installed),
                KeySource::Root => {
                    format!("{} key(s) copied from root", report.keys_installed)
                }
                KeySource::Existing => "existing keys kept".to_string(),
            };
            let hardening = match report.hardening {
                Hardening::Applied(h) if h.changed() => "SSH hardened",
                Hardening::Applied(_) => "SSH hardening disabled by config",
                Hardening::Skipped => "SSH hardening skipped (no keys installed)",
            };
            format!(
                "  ok      {host} (as {}): {keys}, {hardening}",
                report.connection
            )
        }
        ProvisioningOutcome::Failed { host, failure } => {
            format!("  FAILED  {host}: {failure}")
        }
        ProvisioningOutcome::Skipped(reason) => format!("  skipped: {reason}"),
    }
}
