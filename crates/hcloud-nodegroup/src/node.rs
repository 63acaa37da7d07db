//! Cluster nodes as seen by the autoscaler host.

use hcloud_gateway::PROVIDER_ID_PREFIX;

/// A cluster node: its name and, once the cloud controller has set it, the
/// provider identifier of the backing server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterNode {
    pub name: String,
    pub provider_id: Option<String>,
}

impl ClusterNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            provider_id: None,
        }
    }

    pub fn with_provider_id(mut self, provider_id: impl Into<String>) -> Self {
        self.provider_id = Some(provider_id.into());
        self
    }

    /// Identifier used to look up the backing server: the provider id with
    /// its `hcloud://` prefix stripped, or the node name when the provider
    /// id is absent or empty.
    pub fn server_identifier(&self) -> &str {
        match self.provider_id.as_deref() {
            Some(id) if !id.is_empty() => id.strip_prefix(PROVIDER_ID_PREFIX).unwrap_or(id),
            _ => &self.name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_id_wins_over_name() {
        let node = ClusterNode::new("worker-1").with_provider_id("hcloud://12345");
        assert_eq!(node.server_identifier(), "12345");
    }

    #[test]
    fn name_is_used_without_provider_id() {
        assert_eq!(ClusterNode::new("worker-1").server_identifier(), "worker-1");
    }

    #[test]
    fn empty_provider_id_counts_as_absent() {
        let node = ClusterNode::new("worker-1").with_provider_id("");
        assert_eq!(node.server_identifier(), "worker-1");
    }

    #[test]
    fn unprefixed_provider_id_is_used_as_is() {
        let node = ClusterNode::new("worker-1").with_provider_id("777");
        assert_eq!(node.server_identifier(), "777");
    }
}
