//! Host-facing façade over the registry, reconciler and gateway.

use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose;
use hcloud_gateway::{CallContext, ComputeApi, RemoteServer, ServerGateway};
use hcloud_naming::NameTemplate;
use hcloud_nodegroup::{
    ClusterNode, NodeGroupDescriptor, Provisioning, Reconciler, RegistryBuilder,
};
use tracing::info;

use crate::config::{
    AccessToken, CLOUD_INIT_KEY, ManagerConfig, NAME_TEMPLATE_KEY, NODE_GROUPS_KEY, TOKEN_KEY,
};
use crate::error::{ConfigError, ManagerResult};

/// Composition root handed to the autoscaler host.
#[derive(Debug)]
pub struct Manager {
    reconciler: Reconciler,
}

impl Manager {
    /// Validate `config` and wire the components. `connect` receives the
    /// access token and returns the compute API client; it is only called
    /// once the configuration is known to be valid.
    pub fn new<F>(config: ManagerConfig, connect: F) -> Result<Self, ConfigError>
    where
        F: FnOnce(&AccessToken) -> Arc<dyn ComputeApi>,
    {
        if config.token.is_empty() {
            return Err(ConfigError::Missing(TOKEN_KEY));
        }
        if config.cloud_init.is_empty() {
            return Err(ConfigError::Missing(CLOUD_INIT_KEY));
        }
        let decoded = general_purpose::STANDARD
            .decode(&config.cloud_init)
            .map_err(|source| ConfigError::InvalidBase64 {
                key: CLOUD_INIT_KEY,
                source,
            })?;
        let cloud_init =
            String::from_utf8(decoded).map_err(|_| ConfigError::NotUtf8 { key: CLOUD_INIT_KEY })?;

        let name_template = match config.name_template.as_deref() {
            Some(source) if !source.is_empty() => {
                Some(NameTemplate::compile(source).map_err(|source| ConfigError::Template {
                    key: NAME_TEMPLATE_KEY,
                    source,
                })?)
            }
            _ => None,
        };

        let mut builder = RegistryBuilder::new();
        for spec in config.node_groups {
            builder
                .register(spec)
                .map_err(|source| ConfigError::NodeGroup {
                    key: NODE_GROUPS_KEY,
                    source,
                })?;
        }
        let registry = Arc::new(builder.build());

        let ssh_keys: Vec<String> = config
            .ssh_keys
            .into_iter()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .collect();
        let mut provisioning = Provisioning::new(config.image, cloud_init).with_ssh_keys(ssh_keys);
        if let Some(template) = name_template {
            provisioning = provisioning.with_name_template(template);
        }

        let gateway = ServerGateway::new(connect(&config.token));

        info!(
            groups = registry.len(),
            image = %provisioning.image,
            ssh_keys = provisioning.ssh_keys.len(),
            templated = provisioning.name_template.is_some(),
            "hcloud manager ready"
        );
        Ok(Self {
            reconciler: Reconciler::new(registry, gateway, provisioning),
        })
    }

    /// Load configuration from the environment and build a manager.
    pub fn from_env<F>(connect: F) -> ManagerResult<Self>
    where
        F: FnOnce(&AccessToken) -> Arc<dyn ComputeApi>,
    {
        let config = ManagerConfig::from_env()?;
        Ok(Self::new(config, connect)?)
    }

    pub fn refresh(&self) -> ManagerResult<()> {
        Ok(self.reconciler.refresh()?)
    }

    /// The server backing `node`.
    pub async fn server_for_node(
        &self,
        ctx: &CallContext,
        node: &ClusterNode,
    ) -> ManagerResult<RemoteServer> {
        Ok(self.reconciler.resolve_node(ctx, node).await?)
    }

    pub async fn delete_by_node(&self, ctx: &CallContext, node: &ClusterNode) -> ManagerResult<()> {
        Ok(self.reconciler.delete_node(ctx, node).await?)
    }

    pub fn add_node_to_draining_pool(&self, node: &ClusterNode) -> NodeGroupDescriptor {
        self.reconciler.drain(node)
    }

    /// Live listing of the servers in `group_id`.
    pub async fn all_servers(
        &self,
        ctx: &CallContext,
        group_id: &str,
    ) -> ManagerResult<Vec<RemoteServer>> {
        Ok(self.reconciler.list_group_servers(ctx, group_id).await?)
    }

    pub fn node_group(&self, group_id: &str) -> ManagerResult<NodeGroupDescriptor> {
        Ok(self.reconciler.registry().get(group_id)?.descriptor())
    }

    /// Every group, draining pool included, ordered by id.
    pub fn node_groups(&self) -> Vec<NodeGroupDescriptor> {
        self.reconciler.registry().all()
    }

    pub async fn increase_size(
        &self,
        ctx: &CallContext,
        group_id: &str,
        delta: u32,
    ) -> ManagerResult<Vec<RemoteServer>> {
        Ok(self.reconciler.increase_size(ctx, group_id, delta).await?)
    }

    pub fn decrease_target_size(
        &self,
        group_id: &str,
        delta: u32,
    ) -> ManagerResult<NodeGroupDescriptor> {
        Ok(self.reconciler.decrease_target_size(group_id, delta)?)
    }

    pub async fn delete_nodes(
        &self,
        ctx: &CallContext,
        group_id: &str,
        nodes: &[ClusterNode],
    ) -> ManagerResult<()> {
        Ok(self.reconciler.delete_nodes(ctx, group_id, nodes).await?)
    }

    /// Decoded cloud-init user data.
    pub fn cloud_init(&self) -> &str {
        &self.reconciler.provisioning().user_data
    }

    pub fn image(&self) -> &str {
        &self.reconciler.provisioning().image
    }

    pub fn ssh_keys(&self) -> &[String] {
        &self.reconciler.provisioning().ssh_keys
    }

    pub fn name_template(&self) -> Option<&NameTemplate> {
        self.reconciler.provisioning().name_template.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use hcloud_gateway::InMemoryComputeApi;
    use hcloud_nodegroup::{NodeGroupError, NodeGroupSpec};

    use super::*;
    use crate::error::ManagerError;

    fn client() -> Arc<dyn ComputeApi> {
        Arc::new(InMemoryComputeApi::new())
    }

    #[test]
    fn connect_receives_the_token() {
        let mut seen = None;
        Manager::new(ManagerConfig::new("t1", "aGVsbG8="), |token| {
            seen = Some(token.expose().to_string());
            client()
        })
        .unwrap();
        assert_eq!(seen.as_deref(), Some("t1"));
    }

    #[test]
    fn connect_is_skipped_on_invalid_config() {
        let mut called = false;
        let result = Manager::new(ManagerConfig::new("", "aGVsbG8="), |_| {
            called = true;
            client()
        });
        assert!(matches!(result, Err(ConfigError::Missing(TOKEN_KEY))));
        assert!(!called);
    }

    #[test]
    fn non_utf8_cloud_init_is_rejected() {
        // 0xff 0xfe
        let err = Manager::new(ManagerConfig::new("t1", "//4="), |_| client()).unwrap_err();
        assert!(matches!(err, ConfigError::NotUtf8 { key: CLOUD_INIT_KEY }));
    }

    #[test]
    fn padded_cloud_init_is_not_base64() {
        let err = Manager::new(ManagerConfig::new("t1", " aGVsbG8=\n"), |_| client()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidBase64 {
                key: CLOUD_INIT_KEY,
                ..
            }
        ));
    }

    #[test]
    fn blank_ssh_keys_are_dropped() {
        let config = ManagerConfig::new("t1", "aGVsbG8=")
            .with_ssh_keys(vec!["ops".into(), " ".into(), String::new(), " ci ".into()]);
        let manager = Manager::new(config, |_| client()).unwrap();
        assert_eq!(manager.ssh_keys(), ["ops".to_string(), "ci".to_string()]);
    }

    #[test]
    fn reserved_group_id_is_a_config_error() {
        let config = ManagerConfig::new("t1", "aGVsbG8=").with_node_group(NodeGroupSpec::new(
            hcloud_nodegroup::DRAINING_GROUP_ID,
            "cx11",
            "fsn1",
            0,
            1,
        ));
        let err = Manager::new(config, |_| client()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::NodeGroup {
                key: NODE_GROUPS_KEY,
                source: NodeGroupError::ReservedGroupId(_),
            }
        ));
    }

    #[test]
    fn unknown_group_lookup_is_reported() {
        let manager = Manager::new(ManagerConfig::new("t1", "aGVsbG8="), |_| client()).unwrap();
        let err = manager.node_group("pool9").unwrap_err();
        assert!(matches!(
            err,
            ManagerError::NodeGroup(NodeGroupError::UnknownGroup(_))
        ));
    }
}
