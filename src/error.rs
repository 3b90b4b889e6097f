use std::path::PathBuf;

pub type ProvisionResult<T> = Result<T, ProvisionError>;

#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("authentication failed for {destination}")]
    AuthenticationFailed { destination: String },

    #[error("connection refused by {destination}")]
    ConnectionRefused { destination: String },

    #[error("could not reach {destination}: {detail}")]
    Unreachable { destination: String, detail: String },

    #[error("remote command failed on {destination}: {command}")]
    RemoteCommand {
        destination: String,
        command: String,
        status: Option<i32>,
        stderr: String,
    },

    #[error("could not connect to {host} (tried {})", .attempts.join(", "))]
    ConnectionFailed { host: String, attempts: Vec<String> },

    #[error("no public keys configured and root has no authorized_keys on {0}")]
    NoKeysAvailable(String),

    #[error(
        "failed to harden SSH on {host}: {source}. \
         Ensure key-based SSH access works before retrying."
    )]
    HardeningFailed {
        host: String,
        source: Box<ProvisionError>,
    },

    #[error("command not found: {0}")]
    CommandNotFound(String),

    #[error("config file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("public key file not found: {0}")]
    KeyFileNotFound(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ProvisionError {
    /// Whether the next connection candidate should be tried after
    /// this failure.
    #[must_use]
    pub const fn is_retryable_connection(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationFailed { .. } | Self::ConnectionRefused { .. }
        )
    }
}
