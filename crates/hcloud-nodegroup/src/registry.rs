//! Node group registry.
//!
//! Built once through [`RegistryBuilder`], which always seeds the draining
//! pool. The finished [`Registry`] never changes shape, so lookups take no
//! lock.

use std::collections::HashMap;
use std::sync::Arc;

use hcloud_gateway::is_selector_value;
use tracing::debug;

use crate::error::{NodeGroupError, NodeGroupResult};
use crate::group::{DRAINING_GROUP_ID, NodeGroup, NodeGroupDescriptor, NodeGroupSpec};

pub struct RegistryBuilder {
    groups: HashMap<String, Arc<NodeGroup>>,
}

impl RegistryBuilder {
    /// A builder already holding the draining pool.
    pub fn new() -> Self {
        let mut groups = HashMap::new();
        groups.insert(DRAINING_GROUP_ID.to_string(), Arc::new(NodeGroup::draining()));
        Self { groups }
    }

    /// Register an ordinary group.
    pub fn register(&mut self, spec: NodeGroupSpec) -> NodeGroupResult<()> {
        if spec.id == DRAINING_GROUP_ID {
            return Err(NodeGroupError::ReservedGroupId(spec.id));
        }
        if !is_selector_value(&spec.id) {
            return Err(NodeGroupError::InvalidGroupId(spec.id));
        }
        if spec.min_size > spec.max_size {
            return Err(NodeGroupError::InvalidBounds {
                group: spec.id,
                min: spec.min_size,
                max: spec.max_size,
            });
        }
        if self.groups.contains_key(&spec.id) {
            return Err(NodeGroupError::DuplicateGroup(spec.id));
        }
        debug!(
            group = %spec.id,
            server_type = %spec.server_type,
            region = %spec.region,
            min = spec.min_size,
            max = spec.max_size,
            "registered node group"
        );
        self.groups
            .insert(spec.id.clone(), Arc::new(NodeGroup::ordinary(spec)));
        Ok(())
    }

    pub fn build(self) -> Registry {
        let draining = self
            .groups
            .get(DRAINING_GROUP_ID)
            .cloned()
            .unwrap_or_else(|| Arc::new(NodeGroup::draining()));
        Registry {
            groups: self.groups,
            draining,
        }
    }
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Group id → node group.
#[derive(Debug)]
pub struct Registry {
    groups: HashMap<String, Arc<NodeGroup>>,
    draining: Arc<NodeGroup>,
}

impl Registry {
    pub fn get(&self, id: &str) -> NodeGroupResult<Arc<NodeGroup>> {
        self.groups
            .get(id)
            .cloned()
            .ok_or_else(|| NodeGroupError::UnknownGroup(id.to_string()))
    }

    /// Snapshots of every group, ordered by id.
    pub fn all(&self) -> Vec<NodeGroupDescriptor> {
        let mut all: Vec<_> = self.groups.values().map(|g| g.descriptor()).collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    pub fn draining(&self) -> &Arc<NodeGroup> {
        &self.draining
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}
