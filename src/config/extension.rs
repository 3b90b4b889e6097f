use serde::Deserialize;
use serde_yaml::Value;

use crate::config::expand_tilde;
use crate::error::{ProvisionError, ProvisionResult};

/// Top-level key of the extension block in `deploy.yml`.
pub const EXTENSION_KEY: &str = "x-provision";

pub const DEFAULT_GROUP: &str = "docker";

/// The `x-provision` block.
///
/// ```yaml
/// x-provision:
///   keys:
///     - ~/.ssh/id_ed25519.pub
///   key_data:
///     - ssh-ed25519 AAAA... ops@example.com
///   disable_root_login: true
///   disable_password_authentication: true
///   group: docker
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Extension {
    /// Paths to public key files.
    pub keys: Vec<String>,
    /// Public keys given inline.
    pub key_data: Vec<String>,
    pub disable_root_login: Option<bool>,
    pub disable_password_authentication: Option<bool>,
    /// Supplementary group for the deploy user.
    pub group: Option<String>,
}

impl Extension {
    /// Parse the raw block. A missing or empty block yields the
    /// defaults; anything malformed is a configuration error.
    pub fn from_value(value: Option<&Value>) -> ProvisionResult<Self> {
        match value {
            None | Some(Value::Null) => Ok(Self::default()),
            Some(value) => serde_yaml::from_value(value.clone())
                .map_err(|e| ProvisionError::InvalidConfig(format!("{EXTENSION_KEY}: {e}"))),
        }
    }

    /// Keys read from [`keys`](Self::keys) followed by
    /// [`key_data`](Self::key_data), in the order they are listed.
    /// Every non-empty line of a key file or `key_data` entry counts
    /// as one key.
    pub fn public_keys(&self) -> ProvisionResult<Vec<String>> {
        let mut keys = Vec::new();

        for path in &self.keys {
            let expanded = expand_tilde(path);
            if !expanded.exists() {
                return Err(ProvisionError::KeyFileNotFound(path.clone()));
            }
            let content = std::fs::read_to_string(&expanded)?;
            keys.extend(split_keys(&content));
        }

        keys.extend(self.key_data.iter().flat_map(|k| split_keys(k)));
        Ok(keys)
    }

    /// Never disables root login for a root deploy user; otherwise
    /// defaults to true.
    #[must_use]
    pub fn disable_root_login(&self, user: &str) -> bool {
        user != "root" && self.disable_root_login.unwrap_or(true)
    }

    #[must_use]
    pub fn disable_password_authentication(&self) -> bool {
        self.disable_password_authentication.unwrap_or(true)
    }

    #[must_use]
    pub fn group(&self) -> &str {
        self.group.as_deref().unwrap_or(DEFAULT_GROUP)
    }
}

/// Split `authorized_keys`-style content into trimmed, non-empty
/// lines.
#[must_use]
pub fn split_keys(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}
