//! Find a user and port that can reach a freshly imaged host.
//!
//! New hosts often accept only root, or only the deploy user when the
//! image was pre-seeded, and may still listen on port 22 before a
//! custom SSH port is applied. The deploy user is tried first so root
//! is only used when nothing else works.

use tracing::{info, warn};

use crate::commands;
use crate::error::{ProvisionError, ProvisionResult};
use crate::ssh::{Connection, Remote};

pub const DEFAULT_SSH_PORT: u16 = 22;

/// A (user, port) pair to try against a host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub user: String,
    pub port: u16,
}

impl Candidate {
    #[must_use]
    pub fn new(user: &str, port: u16) -> Self {
        Self {
            user: user.to_string(),
            port,
        }
    }
}

/// Result of a single connection attempt.
#[derive(Debug)]
pub enum Attempt {
    Connected(Connection),
    /// Authentication failed or the connection was refused; the next
    /// candidate may work.
    Retryable(ProvisionError),
    /// Anything else. No further candidates are tried.
    Fatal(ProvisionError),
}

/// Candidates in the order they are tried: the target user on the
/// configured port, then on 22, then root on both. Identical pairs
/// appear once.
#[must_use]
pub fn candidates(target_user: &str, configured_port: u16) -> Vec<Candidate> {
    let ordered = [
        Candidate::new(target_user, configured_port),
        Candidate::new(target_user, DEFAULT_SSH_PORT),
        Candidate::new("root", configured_port),
        Candidate::new("root", DEFAULT_SSH_PORT),
    ];

    let mut unique: Vec<Candidate> = Vec::with_capacity(ordered.len());
    for candidate in ordered {
        if !unique.contains(&candidate) {
            unique.push(candidate);
        }
    }
    unique
}

/// Try one candidate by running a no-op command.
pub fn attempt<R: Remote + ?Sized>(remote: &R, host: &str, candidate: &Candidate) -> Attempt {
    let connection = Connection::new(host, &candidate.user, candidate.port);
    match remote.execute(&connection, &commands::noop()) {
        Ok(()) => Attempt::Connected(connection),
        Err(e) if e.is_retryable_connection() => Attempt::Retryable(e),
        Err(e) => Attempt::Fatal(e),
    }
}

/// Walk the candidate list until one connects.
///
/// Fails with [`ProvisionError::ConnectionFailed`] naming every
/// attempted identity when all candidates are exhausted, or with the
/// underlying error as soon as an attempt fails for any reason other
/// than authentication or a refused connection.
pub fn establish<R: Remote + ?Sized>(
    remote: &R,
    host: &str,
    target_user: &str,
    configured_port: u16,
) -> ProvisionResult<Connection> {
    let candidates = candidates(target_user, configured_port);
    let mut attempted = Vec::with_capacity(candidates.len());

    for (index, candidate) in candidates.iter().enumerate() {
        let identity = format!("{}@{host}:{}", candidate.user, candidate.port);

        match attempt(remote, host, candidate) {
            Attempt::Connected(connection) => {
                info!("Connected as {connection}");
                return Ok(connection);
            }
            Attempt::Retryable(e) => {
                attempted.push(identity.clone());
                match candidates.get(index + 1) {
                    Some(next) => warn!(
                        "Could not connect as {identity} ({e}), trying {}@{host}:{}...",
                        next.user, next.port
                    ),
                    None => warn!("Could not connect as {identity} ({e})"),
                }
            }
            Attempt::Fatal(e) => return Err(e),
        }
    }

    Err(ProvisionError::ConnectionFailed {
        host: host.to_string(),
        attempts: attempted,
    })
}
