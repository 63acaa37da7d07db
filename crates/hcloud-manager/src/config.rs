//! Manager configuration.
//!
//! Loaded from the `HCLOUD_*` environment keys or from a TOML file. Values
//! are only parsed here; [`crate::Manager::new`] validates them.

use std::fmt;
use std::path::Path;

use hcloud_nodegroup::NodeGroupSpec;
use serde::Deserialize;

use crate::error::ConfigError;

pub const TOKEN_KEY: &str = "HCLOUD_TOKEN";
pub const CLOUD_INIT_KEY: &str = "HCLOUD_CLOUD_INIT";
pub const IMAGE_KEY: &str = "HCLOUD_IMAGE";
pub const NAME_TEMPLATE_KEY: &str = "HCLOUD_NAME_TEMPLATE";
pub const SSH_KEY_KEY: &str = "HCLOUD_SSH_KEY";
pub const NODE_GROUPS_KEY: &str = "HCLOUD_NODE_GROUPS";

pub const DEFAULT_IMAGE: &str = "ubuntu-20.04";

/// API credential. Never printed.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManagerConfig {
    #[serde(default)]
    pub token: AccessToken,
    /// Base64-encoded cloud-init user data.
    #[serde(default)]
    pub cloud_init: String,
    #[serde(default = "default_image")]
    pub image: String,
    #[serde(default)]
    pub name_template: Option<String>,
    #[serde(default)]
    pub ssh_keys: Vec<String>,
    #[serde(default)]
    pub node_groups: Vec<NodeGroupSpec>,
}

fn default_image() -> String {
    DEFAULT_IMAGE.to_string()
}

impl ManagerConfig {
    pub fn new(token: impl Into<String>, cloud_init: impl Into<String>) -> Self {
        Self {
            token: AccessToken::new(token),
            cloud_init: cloud_init.into(),
            image: default_image(),
            name_template: None,
            ssh_keys: Vec::new(),
            node_groups: Vec::new(),
        }
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = image.into();
        self
    }

    pub fn with_name_template(mut self, template: impl Into<String>) -> Self {
        self.name_template = Some(template.into());
        self
    }

    pub fn with_ssh_keys(mut self, keys: Vec<String>) -> Self {
        self.ssh_keys = keys;
        self
    }

    pub fn with_node_group(mut self, spec: NodeGroupSpec) -> Self {
        self.node_groups.push(spec);
        self
    }

    /// Read the `HCLOUD_*` keys from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the `HCLOUD_*` keys through `lookup`. Empty values count as
    /// unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let node_groups = match get(NODE_GROUPS_KEY) {
            Some(raw) => split_list(&raw)
                .map(parse_node_group)
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };

        Ok(Self {
            token: AccessToken::new(get(TOKEN_KEY).unwrap_or_default()),
            cloud_init: get(CLOUD_INIT_KEY).unwrap_or_default(),
            image: get(IMAGE_KEY).unwrap_or_else(default_image),
            name_template: get(NAME_TEMPLATE_KEY),
            ssh_keys: get(SSH_KEY_KEY)
                .map(|raw| split_list(&raw).map(str::to_string).collect())
                .unwrap_or_default(),
            node_groups,
        })
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }
}

/// Comma-separated items, trimmed, blanks dropped.
fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|item| !item.is_empty())
}

/// Parse one `min:max:type:region:id` node group entry.
pub fn parse_node_group(entry: &str) -> Result<NodeGroupSpec, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidNodeGroup {
        key: NODE_GROUPS_KEY,
        entry: entry.to_string(),
        reason: reason.to_string(),
    };
    let parts: Vec<&str> = entry.split(':').map(str::trim).collect();
    let [min, max, server_type, region, id] = parts.as_slice() else {
        return Err(invalid("expected min:max:type:region:id"));
    };
    let min_size = min
        .parse::<u32>()
        .map_err(|_| invalid("min size is not a non-negative integer"))?;
    let max_size = max
        .parse::<u32>()
        .map_err(|_| invalid("max size is not a non-negative integer"))?;
    if server_type.is_empty() || region.is_empty() {
        return Err(invalid("server type and region must not be empty"));
    }
    Ok(NodeGroupSpec::new(*id, *server_type, *region, min_size, max_size))
}
