use std::path::PathBuf;

use kamal_provision::error::ProvisionError;

#[test]
fn display_connection_failed_lists_attempts() {
    let err = ProvisionError::ConnectionFailed {
        host: "web1".into(),
        attempts: vec!["deploy@web1:22".into(), "root@web1:22".into()],
    };
    assert_eq!(
        err.to_string(),
        "could not connect to web1 (tried deploy@web1:22, root@web1:22)"
    );
}

#[test]
fn display_no_keys_available() {
    let err = ProvisionError::NoKeysAvailable("web1".into());
    assert_eq!(
        err.to_string(),
        "no public keys configured and root has no authorized_keys on web1"
    );
}

#[test]
fn display_hardening_failed() {
    let err = ProvisionError::HardeningFailed {
        host: "web1".into(),
        source: Box::new(ProvisionError::RemoteCommand {
            destination: "deploy@web1:22".into(),
            command: "sudo systemctl restart sshd".into(),
            status: Some(1),
            stderr: String::new(),
        }),
    };
    assert_eq!(
        err.to_string(),
        "failed to harden SSH on web1: remote command failed on deploy@web1:22: \
         sudo systemctl restart sshd. Ensure key-based SSH access works before retrying."
    );
    assert!(std::error::Error::source(&err).is_some());
}

#[test]
fn display_command_not_found() {
    let err = ProvisionError::CommandNotFound("ssh".into());
    assert_eq!(err.to_string(), "command not found: ssh");
}

#[test]
fn display_config_not_found() {
    let err = ProvisionError::ConfigNotFound(PathBuf::from("config/deploy.yml"));
    assert_eq!(err.to_string(), "config file not found: config/deploy.yml");
}

#[test]
fn display_key_file_not_found() {
    let err = ProvisionError::KeyFileNotFound("~/.ssh/id.pub".into());
    assert_eq!(err.to_string(), "public key file not found: ~/.ssh/id.pub");
}

#[test]
fn retryable_connection_errors() {
    assert!(
        ProvisionError::AuthenticationFailed {
            destination: "a".into()
        }
        .is_retryable_connection()
    );
    assert!(
        ProvisionError::ConnectionRefused {
            destination: "a".into()
        }
        .is_retryable_connection()
    );
    assert!(
        !ProvisionError::Unreachable {
            destination: "a".into(),
            detail: "timeout".into()
        }
        .is_retryable_connection()
    );
    assert!(!ProvisionError::NoKeysAvailable("a".into()).is_retryable_connection());
}

#[test]
fn from_io_error() {
    let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
    let err: ProvisionError = io_err.into();
    assert!(matches!(err, ProvisionError::Io(_)));
}
