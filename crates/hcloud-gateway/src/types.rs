//! Wire types shared between the gateway and compute API clients.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Label carrying the node group a server belongs to.
pub const NODE_GROUP_LABEL: &str = "hcloud/node-group";

/// Scheme prefix of cluster node provider identifiers (`hcloud://<id>`).
pub const PROVIDER_ID_PREFIX: &str = "hcloud://";

/// Page size used for label-filtered listings.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Whether `value` can sit in a `key=value` label selector term without
/// changing the selector: non-empty, no whitespace, `,` or `=`.
pub fn is_selector_value(value: &str) -> bool {
    !value.is_empty()
        && !value
            .chars()
            .any(|c| c.is_whitespace() || c == ',' || c == '=')
}

/// Lifecycle status reported by the compute API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    Initializing,
    Starting,
    Running,
    Stopping,
    Off,
    Deleting,
    Migrating,
    Rebuilding,
    Unknown,
}

/// A server as reported by the compute API. Never cached by the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteServer {
    pub id: u64,
    pub name: String,
    pub status: ServerStatus,
    /// Server type name (e.g. `cx21`).
    pub server_type: String,
    /// Location name (e.g. `fsn1`).
    pub location: String,
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

impl RemoteServer {
    /// The node group this server is labelled with, if any.
    pub fn node_group(&self) -> Option<&str> {
        self.labels.get(NODE_GROUP_LABEL).map(String::as_str)
    }

    /// Provider identifier a cluster node backed by this server carries.
    pub fn provider_id(&self) -> String {
        format!("{PROVIDER_ID_PREFIX}{}", self.id)
    }
}

/// Listing options for one page of servers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListOpts {
    /// `key=value[,key=value…]` label selector.
    pub label_selector: Option<String>,
    /// 1-based page number.
    pub page: u32,
    pub per_page: u32,
}

/// One page of a server listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerPage {
    pub servers: Vec<RemoteServer>,
    /// Next page to request; `None` on the last page.
    pub next_page: Option<u32>,
}

/// Parameters for provisioning a new server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerCreateOpts {
    pub name: String,
    pub server_type: String,
    pub location: String,
    pub image: String,
    /// Decoded cloud-init user data.
    pub user_data: String,
    pub ssh_keys: Vec<String>,
    pub labels: HashMap<String, String>,
}

/// Gateway operation, carried in errors and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    List,
    Get,
    Delete,
    Create,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::List => "list servers",
            Operation::Get => "get server",
            Operation::Delete => "delete server",
            Operation::Create => "create server",
        })
    }
}
