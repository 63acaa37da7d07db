//! Node group error types.

use hcloud_gateway::GatewayError;
use hcloud_naming::TemplateError;
use thiserror::Error;

pub type NodeGroupResult<T> = Result<T, NodeGroupError>;

#[derive(Debug, Error)]
pub enum NodeGroupError {
    #[error("unknown node group: {0}")]
    UnknownGroup(String),

    #[error("node group {0} is already registered")]
    DuplicateGroup(String),

    #[error("node group id {0} is reserved for the draining pool")]
    ReservedGroupId(String),

    #[error("invalid node group id {0:?}: must be non-empty without whitespace, ',' or '='")]
    InvalidGroupId(String),

    #[error("node group {group}: min size {min} exceeds max size {max}")]
    InvalidBounds { group: String, min: u32, max: u32 },

    #[error("node group {group}: size delta must be positive")]
    InvalidDelta { group: String },

    #[error("node group {group}: target size {requested} outside [{min}, {max}]")]
    SizeOutOfBounds {
        group: String,
        requested: i64,
        min: u32,
        max: u32,
    },

    /// Scaling operations on the draining pool.
    #[error("node group {0} is bookkeeping only and cannot be scaled")]
    NotScalable(String),

    #[error("no server backs node {node}")]
    NodeNotFound { node: String },

    #[error("failed to resolve server for node {node}: {source}")]
    ResolutionFailed {
        node: String,
        #[source]
        source: GatewayError,
    },

    #[error("node group {group}: cannot build server name: {source}")]
    Naming {
        group: String,
        #[source]
        source: TemplateError,
    },

    #[error("server randomness unavailable: {0}")]
    Entropy(String),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl NodeGroupError {
    pub fn is_node_not_found(&self) -> bool {
        matches!(self, NodeGroupError::NodeNotFound { .. })
    }
}
