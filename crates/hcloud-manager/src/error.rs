//! Manager error types.

use std::path::PathBuf;

use hcloud_naming::TemplateError;
use hcloud_nodegroup::NodeGroupError;
use thiserror::Error;

pub type ManagerResult<T> = Result<T, ManagerError>;

/// Invalid or missing configuration. Each variant names the offending key.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("`{0}` is not specified")]
    Missing(&'static str),

    #[error("`{key}` is not valid base64: {source}")]
    InvalidBase64 {
        key: &'static str,
        #[source]
        source: base64::DecodeError,
    },

    #[error("`{key}` does not decode to UTF-8 text")]
    NotUtf8 { key: &'static str },

    #[error("`{key}` failed to compile: {source}")]
    Template {
        key: &'static str,
        #[source]
        source: TemplateError,
    },

    #[error("`{key}` entry {entry:?} is invalid: {reason}")]
    InvalidNodeGroup {
        key: &'static str,
        entry: String,
        reason: String,
    },

    #[error("`{key}`: {source}")]
    NodeGroup {
        key: &'static str,
        #[source]
        source: NodeGroupError,
    },

    #[error("failed to read {path}: {source}", path = path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Toml(#[from] toml::de::Error),
}

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    NodeGroup(#[from] NodeGroupError),
}

impl ManagerError {
    pub fn is_node_not_found(&self) -> bool {
        matches!(self, ManagerError::NodeGroup(err) if err.is_node_not_found())
    }
}
