//! Deployment configuration as read from `config/deploy.yml`.
//!
//! Only what provisioning needs is parsed: the hosts, the `ssh`
//! section and the raw `x-provision` block. Everything else in the
//! file is ignored.

pub mod extension;

use std::path::{Path, PathBuf};

use indexmap::{IndexMap, IndexSet};
use serde::Deserialize;
use serde_yaml::Value;

use crate::error::{ProvisionError, ProvisionResult};
use crate::harden::HardeningPolicy;
use crate::provisioner::ProvisioningTarget;

pub use extension::Extension;

pub const DEFAULT_CONFIG_FILE: &str = "config/deploy.yml";

/// Role name given to hosts listed directly under `servers`.
const DEFAULT_ROLE: &str = "web";

/// The `ssh` section of the deployment configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SshOptions {
    pub user: String,
    pub port: u16,
    /// Identity files passed to the SSH client.
    pub keys: Vec<String>,
    pub keys_only: bool,
    /// Jump host, e.g. `bastion@10.0.0.1`.
    pub proxy: Option<String>,
}

impl Default for SshOptions {
    fn default() -> Self {
        Self {
            user: "root".to_string(),
            port: 22,
            keys: Vec::new(),
            keys_only: false,
            proxy: None,
        }
    }
}

impl SshOptions {
    /// Identity file paths with `~` expanded.
    #[must_use]
    pub fn identity_files(&self) -> Vec<String> {
        self.keys
            .iter()
            .map(|k| expand_tilde(k).to_string_lossy().to_string())
            .collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Servers {
    List(Vec<HostEntry>),
    Roles(IndexMap<String, RoleServers>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RoleServers {
    List(Vec<HostEntry>),
    Detailed {
        #[serde(default)]
        hosts: Vec<HostEntry>,
    },
}

impl RoleServers {
    fn hosts(&self) -> &[HostEntry] {
        match self {
            Self::List(hosts) | Self::Detailed { hosts } => hosts,
        }
    }
}

/// A host is either a bare address or `{ address: tags }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum HostEntry {
    Address(String),
    Tagged(IndexMap<String, Value>),
}

impl HostEntry {
    fn addresses(&self) -> Vec<String> {
        match self {
            Self::Address(a) => vec![a.clone()],
            Self::Tagged(map) => map.keys().cloned().collect(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct Accessory {
    host: Option<String>,
    #[serde(default)]
    hosts: Vec<String>,
    #[serde(default)]
    roles: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    servers: Option<Servers>,
    #[serde(default)]
    accessories: IndexMap<String, Accessory>,
    #[serde(default)]
    ssh: SshOptions,
    #[serde(rename = "x-provision")]
    provision: Option<Value>,
}

/// The base deployment configuration, read-only for a session.
#[derive(Debug, Clone)]
pub struct DeployConfig {
    hosts: Vec<String>,
    ssh: SshOptions,
    extension: Option<Value>,
}

impl DeployConfig {
    /// Load `path`, deep-merging `deploy.<destination>.yml` over it
    /// when a destination is given.
    pub fn load(path: &Path, destination: Option<&str>) -> ProvisionResult<Self> {
        let mut value = read_yaml(path)?;
        if let Some(destination) = destination {
            let overlay = read_yaml(&destination_path(path, destination))?;
            merge(&mut value, overlay);
        }
        Self::from_value(value)
    }

    pub fn from_yaml(content: &str) -> ProvisionResult<Self> {
        let value: Value = serde_yaml::from_str(content)
            .map_err(|e| ProvisionError::InvalidConfig(e.to_string()))?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> ProvisionResult<Self> {
        let raw: RawConfig = if value.is_null() {
            RawConfig::default()
        } else {
            serde_yaml::from_value(value).map_err(|e| ProvisionError::InvalidConfig(e.to_string()))?
        };

        let hosts = collect_hosts(raw.servers.as_ref(), &raw.accessories)?;

        Ok(Self {
            hosts,
            ssh: raw.ssh,
            extension: raw.provision,
        })
    }

    /// Every host in declaration order, servers before accessories,
    /// without duplicates.
    #[must_use]
    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    #[must_use]
    pub const fn ssh(&self) -> &SshOptions {
        &self.ssh
    }

    /// The raw `x-provision` block, if present.
    #[must_use]
    pub const fn extension_block(&self) -> Option<&Value> {
        self.extension.as_ref()
    }
}

/// Base configuration composed with the parsed `x-provision` block.
#[derive(Debug, Clone)]
pub struct ProvisionConfig {
    base: DeployConfig,
    extension: Extension,
}

impl ProvisionConfig {
    pub fn new(base: DeployConfig) -> ProvisionResult<Self> {
        let extension = Extension::from_value(base.extension_block())?;
        Ok(Self { base, extension })
    }

    pub fn load(path: &Path, destination: Option<&str>) -> ProvisionResult<Self> {
        Self::new(DeployConfig::load(path, destination)?)
    }

    /// The deploy user.
    #[must_use]
    pub fn user(&self) -> &str {
        &self.base.ssh.user
    }

    #[must_use]
    pub fn hosts(&self) -> &[String] {
        self.base.hosts()
    }

    #[must_use]
    pub const fn ssh(&self) -> &SshOptions {
        self.base.ssh()
    }

    #[must_use]
    pub const fn extension(&self) -> &Extension {
        &self.extension
    }

    /// Resolve what every host should end up with. Key files are read
    /// here, so a missing file fails before any host is contacted.
    pub fn target(&self) -> ProvisionResult<ProvisioningTarget> {
        let user = self.user();
        Ok(ProvisioningTarget {
            user: user.to_string(),
            keys: self.extension.public_keys()?,
            group: self.extension.group().to_string(),
            policy: HardeningPolicy {
                disable_root_login: self.extension.disable_root_login(user),
                disable_password_authentication: self
                    .extension
                    .disable_password_authentication(),
            },
        })
    }
}

/// Expand a leading `~` to the local home directory.
#[must_use]
pub fn expand_tilde(path: &str) -> PathBuf {
    let rest = if path == "~" {
        Some("")
    } else {
        path.strip_prefix("~/")
    };

    match (rest, home::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

/// `config/deploy.yml` with destination `staging` becomes
/// `config/deploy.staging.yml`.
#[must_use]
pub fn destination_path(path: &Path, destination: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map_or_else(|| "deploy".into(), |s| s.to_string_lossy());
    let file_name = path.extension().map_or_else(
        || format!("{stem}.{destination}"),
        |ext| format!("{stem}.{destination}.{}", ext.to_string_lossy()),
    );
    path.with_file_name(file_name)
}

/// Deep-merge `overlay` into `base`. Mappings merge key by key;
/// any other value in the overlay replaces the base value.
pub fn merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Mapping(base), Value::Mapping(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

fn read_yaml(path: &Path) -> ProvisionResult<Value> {
    if !path.exists() {
        return Err(ProvisionError::ConfigNotFound(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path)?;
    serde_yaml::from_str(&content)
        .map_err(|e| ProvisionError::InvalidConfig(format!("{}: {e}", path.display())))
}

fn collect_hosts(
    servers: Option<&Servers>,
    accessories: &IndexMap<String, Accessory>,
) -> ProvisionResult<Vec<String>> {
    let mut roles: IndexMap<String, Vec<String>> = IndexMap::new();
    match servers {
        Some(Servers::List(entries)) => {
            roles.insert(
                DEFAULT_ROLE.to_string(),
                entries.iter().flat_map(HostEntry::addresses).collect(),
            );
        }
        Some(Servers::Roles(map)) => {
            for (role, servers) in map {
                roles.insert(
                    role.clone(),
                    servers.hosts().iter().flat_map(HostEntry::addresses).collect(),
                );
            }
        }
        None => {}
    }

    let mut hosts: IndexSet<String> = roles.values().flatten().cloned().collect();

    for (name, accessory) in accessories {
        hosts.extend(accessory.host.iter().cloned());
        hosts.extend(accessory.hosts.iter().cloned());
        for role in &accessory.roles {
            let role_hosts = roles.get(role).ok_or_else(|| {
                ProvisionError::InvalidConfig(format!(
                    "accessory '{name}' references unknown role '{role}'"
                ))
            })?;
            hosts.extend(role_hosts.iter().cloned());
        }
    }

    Ok(hosts.into_iter().collect())
}
