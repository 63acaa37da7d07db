//! Node group reconciler.
//!
//! Turns autoscaler intents into server operations through the gateway.
//! Target sizes change only here, through compare-and-swap updates on the
//! group's atomic cell, so concurrent callers never push a group outside
//! its bounds or lose an update.

use std::collections::HashMap;
use std::sync::Arc;

use hcloud_gateway::{CallContext, NODE_GROUP_LABEL, RemoteServer, ServerCreateOpts, ServerGateway};
use hcloud_naming::{NameContext, NameTemplate, validate_server_name};
use tracing::{debug, info, warn};

use crate::error::{NodeGroupError, NodeGroupResult};
use crate::group::{NodeGroup, NodeGroupDescriptor};
use crate::node::ClusterNode;
use crate::registry::Registry;

/// Bytes of randomness behind the `Random` name field (hex encoded).
const RANDOM_SUFFIX_BYTES: usize = 4;

/// Settings applied to every server the reconciler creates.
#[derive(Debug, Clone)]
pub struct Provisioning {
    pub image: String,
    /// Decoded cloud-init user data.
    pub user_data: String,
    pub ssh_keys: Vec<String>,
    /// Without a template, names are `<group-id>-<random>`.
    pub name_template: Option<NameTemplate>,
}

impl Provisioning {
    pub fn new(image: impl Into<String>, user_data: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            user_data: user_data.into(),
            ssh_keys: Vec::new(),
            name_template: None,
        }
    }

    pub fn with_ssh_keys(mut self, ssh_keys: Vec<String>) -> Self {
        self.ssh_keys = ssh_keys;
        self
    }

    pub fn with_name_template(mut self, template: NameTemplate) -> Self {
        self.name_template = Some(template);
        self
    }
}

#[derive(Debug)]
pub struct Reconciler {
    registry: Arc<Registry>,
    gateway: ServerGateway,
    provisioning: Provisioning,
}

impl Reconciler {
    pub fn new(registry: Arc<Registry>, gateway: ServerGateway, provisioning: Provisioning) -> Self {
        Self {
            registry,
            gateway,
            provisioning,
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn provisioning(&self) -> &Provisioning {
        &self.provisioning
    }

    /// Find the server backing `node`. The provider id is preferred over
    /// the node name.
    pub async fn resolve_node(
        &self,
        ctx: &CallContext,
        node: &ClusterNode,
    ) -> NodeGroupResult<RemoteServer> {
        let ident = node.server_identifier();
        match self.gateway.get_by_id_or_name(ctx, ident).await {
            Ok(server) => {
                debug!(node = %node.name, server_id = server.id, "resolved node");
                Ok(server)
            }
            Err(err) if err.is_not_found() => {
                warn!(node = %node.name, ident, "no server backs node");
                Err(NodeGroupError::NodeNotFound {
                    node: node.name.clone(),
                })
            }
            Err(source) => {
                warn!(node = %node.name, ident, error = %source, "server lookup failed");
                Err(NodeGroupError::ResolutionFailed {
                    node: node.name.clone(),
                    source,
                })
            }
        }
    }

    /// Resolve `node` and delete its server. Nothing is deleted when
    /// resolution fails.
    pub async fn delete_node(&self, ctx: &CallContext, node: &ClusterNode) -> NodeGroupResult<()> {
        let server = self.resolve_node(ctx, node).await?;
        if let Err(err) = self.gateway.delete_server(ctx, &server).await {
            warn!(node = %node.name, server_id = server.id, error = %err, "server delete failed");
            return Err(err.into());
        }
        info!(node = %node.name, server_id = server.id, "node deleted");
        Ok(())
    }

    /// Stage `node` for deletion: count it in the draining pool. Makes no
    /// remote call.
    pub fn drain(&self, node: &ClusterNode) -> NodeGroupDescriptor {
        let draining = self.registry.draining();
        let count = draining.record_drained();
        info!(node = %node.name, draining = count, "node added to draining pool");
        let mut snapshot = draining.descriptor();
        snapshot.target_size = count;
        snapshot
    }

    /// Live listing of the servers labelled with `group_id`.
    pub async fn list_group_servers(
        &self,
        ctx: &CallContext,
        group_id: &str,
    ) -> NodeGroupResult<Vec<RemoteServer>> {
        let group = self.registry.get(group_id)?;
        Ok(self.gateway.list_by_group_label(ctx, group.id()).await?)
    }

    /// Nothing is cached, so there is nothing to refresh.
    pub fn refresh(&self) -> NodeGroupResult<()> {
        debug!("refresh requested; all lookups are live");
        Ok(())
    }

    /// Provision `delta` servers for `group_id`, one at a time. Each server
    /// reserves its target slot first; a failed create gives the slot back
    /// and stops the loop. Dropping the future mid-create gives the pending
    /// slot back as well.
    pub async fn increase_size(
        &self,
        ctx: &CallContext,
        group_id: &str,
        delta: u32,
    ) -> NodeGroupResult<Vec<RemoteServer>> {
        let group = self.scalable(group_id)?;
        if delta == 0 {
            return Err(NodeGroupError::InvalidDelta {
                group: group.id().to_string(),
            });
        }
        let from = group.target_size();
        if u64::from(from) + u64::from(delta) > u64::from(group.max_size()) {
            return Err(out_of_bounds(&group, i64::from(from) + i64::from(delta)));
        }

        let mut created = Vec::with_capacity(delta as usize);
        for _ in 0..delta {
            let slot = group
                .reserve_slot()
                .map_err(|current| out_of_bounds(&group, i64::from(current) + 1))?;
            match self.provision(ctx, &group, slot.seq()).await {
                Ok(server) => {
                    slot.commit();
                    created.push(server);
                }
                Err(err) => {
                    drop(slot);
                    warn!(
                        group = %group.id(),
                        created = created.len(),
                        requested = delta,
                        error = %err,
                        "scale up stopped"
                    );
                    return Err(err);
                }
            }
        }
        info!(group = %group.id(), from, to = group.target_size(), "scaled up");
        Ok(created)
    }

    /// Lower the target size without touching any server.
    pub fn decrease_target_size(
        &self,
        group_id: &str,
        delta: u32,
    ) -> NodeGroupResult<NodeGroupDescriptor> {
        let group = self.scalable(group_id)?;
        if delta == 0 {
            return Err(NodeGroupError::InvalidDelta {
                group: group.id().to_string(),
            });
        }
        let from = group
            .try_shrink(delta)
            .map_err(|current| out_of_bounds(&group, i64::from(current) - i64::from(delta)))?;
        info!(group = %group.id(), from, to = from - delta, "target size decreased");
        Ok(group.descriptor())
    }

    /// Delete the servers behind `nodes` in order, lowering the target by
    /// one per acknowledged delete. The first failure stops the loop.
    pub async fn delete_nodes(
        &self,
        ctx: &CallContext,
        group_id: &str,
        nodes: &[ClusterNode],
    ) -> NodeGroupResult<()> {
        let group = self.scalable(group_id)?;
        let current = group.target_size();
        let requested = i64::from(current) - nodes.len() as i64;
        if requested < i64::from(group.min_size()) {
            return Err(out_of_bounds(&group, requested));
        }
        for node in nodes {
            self.delete_node(ctx, node).await?;
            if let Err(current) = group.try_shrink(1) {
                warn!(group = %group.id(), target = current, "target already at min size after delete");
            }
        }
        info!(group = %group.id(), deleted = nodes.len(), to = group.target_size(), "nodes deleted");
        Ok(())
    }

    fn scalable(&self, group_id: &str) -> NodeGroupResult<Arc<NodeGroup>> {
        let group = self.registry.get(group_id)?;
        if group.is_draining() {
            return Err(NodeGroupError::NotScalable(group.id().to_string()));
        }
        Ok(group)
    }

    async fn provision(
        &self,
        ctx: &CallContext,
        group: &NodeGroup,
        seq: u32,
    ) -> NodeGroupResult<RemoteServer> {
        let opts = ServerCreateOpts {
            name: self.server_name(group, seq)?,
            server_type: group.server_type().to_string(),
            location: group.region().to_string(),
            image: self.provisioning.image.clone(),
            user_data: self.provisioning.user_data.clone(),
            ssh_keys: self.provisioning.ssh_keys.clone(),
            labels: HashMap::from([(NODE_GROUP_LABEL.to_string(), group.id().to_string())]),
        };
        Ok(self.gateway.create_server(ctx, &opts).await?)
    }

    fn server_name(&self, group: &NodeGroup, seq: u32) -> NodeGroupResult<String> {
        let naming = |source| NodeGroupError::Naming {
            group: group.id().to_string(),
            source,
        };
        let random = random_suffix()?;
        let name = match &self.provisioning.name_template {
            Some(template) => template
                .render(&NameContext::new(group.id(), seq.to_string()).with_random(random))
                .map_err(naming)?,
            None => format!("{}-{random}", group.id()),
        };
        validate_server_name(&name).map_err(naming)?;
        Ok(name)
    }
}

fn out_of_bounds(group: &NodeGroup, requested: i64) -> NodeGroupError {
    NodeGroupError::SizeOutOfBounds {
        group: group.id().to_string(),
        requested,
        min: group.min_size(),
        max: group.max_size(),
    }
}

fn random_suffix() -> NodeGroupResult<String> {
    let mut buf = [0u8; RANDOM_SUFFIX_BYTES];
    getrandom::getrandom(&mut buf).map_err(|e| NodeGroupError::Entropy(e.to_string()))?;
    Ok(hex::encode(buf))
}
