//! hcloud-manager — Hetzner Cloud node group manager for the cluster
//! autoscaler.
//!
//! [`Manager`] is what the autoscaler host holds. It is built from a
//! [`ManagerConfig`] (environment keys or TOML) and a factory for the compute
//! API client:
//!
//! ```text
//! HCLOUD_TOKEN          API credential handed to the client factory   required
//! HCLOUD_CLOUD_INIT     base64 cloud-init for new servers             required
//! HCLOUD_IMAGE          image for new servers                         ubuntu-20.04
//! HCLOUD_NAME_TEMPLATE  server name template                          <group>-<random>
//! HCLOUD_SSH_KEY        comma-separated SSH key names                 none
//! HCLOUD_NODE_GROUPS    comma-separated min:max:type:region:id        none
//! ```
//!
//! Construction fails with a [`ConfigError`] naming the offending key.
//! Every runtime call is a live request; nothing is cached.

pub mod config;
pub mod error;
pub mod manager;

pub use config::{AccessToken, DEFAULT_IMAGE, ManagerConfig, parse_node_group};
pub use error::{ConfigError, ManagerError, ManagerResult};
pub use manager::Manager;

pub use hcloud_gateway::{CallContext, ComputeApi, InMemoryComputeApi, RemoteServer};
pub use hcloud_nodegroup::{ClusterNode, DRAINING_GROUP_ID, GroupKind, NodeGroupDescriptor};
