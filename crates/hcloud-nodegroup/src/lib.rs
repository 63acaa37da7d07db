//! hcloud-nodegroup — node group registry and reconciler.
//!
//! The [`Registry`] maps group ids to [`NodeGroup`]s and always contains the
//! draining pool, a bookkeeping-only group that counts nodes staged for
//! deletion. The [`Reconciler`] performs every per-group operation:
//! resolving cluster nodes to servers, draining, scaling and deleting.
//!
//! ```text
//! resolve_node:  provider id "hcloud://42" → get "42"
//!                node name   "worker-1"    → get "worker-1"
//!
//! drain:         draining.target += 1   (no remote call)
//!
//! increase_size: min ≤ target + delta ≤ max, one create per slot
//! delete_nodes:  min ≤ target - len,         one delete per node
//! ```

pub mod error;
pub mod group;
pub mod node;
pub mod reconciler;
pub mod registry;

pub use error::{NodeGroupError, NodeGroupResult};
pub use group::{
    DRAINING_GROUP_ID, DRAINING_REGION, DRAINING_SERVER_TYPE, GroupKind, NodeGroup,
    NodeGroupDescriptor, NodeGroupSpec,
};
pub use node::ClusterNode;
pub use reconciler::{Provisioning, Reconciler};
pub use registry::{Registry, RegistryBuilder};
