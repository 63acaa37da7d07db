//! Node group shape and target-size accounting.

use std::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Reserved id of the draining pool.
pub const DRAINING_GROUP_ID: &str = "draining-node-pool";
/// Placeholder server type of the draining pool.
pub const DRAINING_SERVER_TYPE: &str = "cx11";
/// Placeholder region of the draining pool.
pub const DRAINING_REGION: &str = "fsn1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupKind {
    /// Provisioned against; target size stays within bounds.
    Ordinary,
    /// Bookkeeping only; target size counts nodes staged for deletion.
    Draining,
}

/// Configured shape of an ordinary node group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeGroupSpec {
    pub id: String,
    pub server_type: String,
    pub region: String,
    #[serde(default)]
    pub min_size: u32,
    pub max_size: u32,
}

impl NodeGroupSpec {
    pub fn new(
        id: impl Into<String>,
        server_type: impl Into<String>,
        region: impl Into<String>,
        min_size: u32,
        max_size: u32,
    ) -> Self {
        Self {
            id: id.into(),
            server_type: server_type.into(),
            region: region.into(),
            min_size,
            max_size,
        }
    }
}

/// Point-in-time copy of a node group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeGroupDescriptor {
    pub id: String,
    pub server_type: String,
    pub region: String,
    pub min_size: u32,
    pub max_size: u32,
    pub target_size: u32,
    pub kind: GroupKind,
}

/// A registered node group. Shape is fixed at construction; the target
/// size is an atomic cell changed only through the reconciler.
#[derive(Debug)]
pub struct NodeGroup {
    id: String,
    server_type: String,
    region: String,
    min_size: u32,
    max_size: u32,
    kind: GroupKind,
    target: AtomicU32,
}

impl NodeGroup {
    pub(crate) fn ordinary(spec: NodeGroupSpec) -> Self {
        Self {
            target: AtomicU32::new(spec.min_size),
            id: spec.id,
            server_type: spec.server_type,
            region: spec.region,
            min_size: spec.min_size,
            max_size: spec.max_size,
            kind: GroupKind::Ordinary,
        }
    }

    pub(crate) fn draining() -> Self {
        Self {
            id: DRAINING_GROUP_ID.to_string(),
            server_type: DRAINING_SERVER_TYPE.to_string(),
            region: DRAINING_REGION.to_string(),
            min_size: 0,
            max_size: 0,
            kind: GroupKind::Draining,
            target: AtomicU32::new(0),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn server_type(&self) -> &str {
        &self.server_type
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn min_size(&self) -> u32 {
        self.min_size
    }

    pub fn max_size(&self) -> u32 {
        self.max_size
    }

    pub fn kind(&self) -> GroupKind {
        self.kind
    }

    pub fn is_draining(&self) -> bool {
        self.kind == GroupKind::Draining
    }

    pub fn target_size(&self) -> u32 {
        self.target.load(Ordering::SeqCst)
    }

    pub fn descriptor(&self) -> NodeGroupDescriptor {
        NodeGroupDescriptor {
            id: self.id.clone(),
            server_type: self.server_type.clone(),
            region: self.region.clone(),
            min_size: self.min_size,
            max_size: self.max_size,
            target_size: self.target_size(),
            kind: self.kind,
        }
    }

    /// Count one more node staged for deletion. Returns the new count.
    pub(crate) fn record_drained(&self) -> u32 {
        self.target.fetch_add(1, Ordering::SeqCst).wrapping_add(1)
    }

    /// Raise the target by `delta` if it stays `<= max_size`.
    /// `Ok(previous)` on success, `Err(current)` when it would not fit.
    pub(crate) fn try_grow(&self, delta: u32) -> Result<u32, u32> {
        let max = self.max_size;
        self.target
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |t| {
                t.checked_add(delta).filter(|next| *next <= max)
            })
    }

    /// Lower the target by `delta` if it stays `>= min_size`.
    /// `Ok(previous)` on success, `Err(current)` when it would not fit.
    pub(crate) fn try_shrink(&self, delta: u32) -> Result<u32, u32> {
        let min = self.min_size;
        self.target
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |t| {
                t.checked_sub(delta).filter(|next| *next >= min)
            })
    }

    /// Reserve the next target slot for a server about to be created.
    /// `Err(current)` when the group is already at `max_size`.
    pub(crate) fn reserve_slot(&self) -> Result<SlotReservation<'_>, u32> {
        let seq = self.try_grow(1)?;
        Ok(SlotReservation {
            group: self,
            seq,
            committed: false,
        })
    }
}

/// A target slot held by an in-flight create.
///
/// Dropping it uncommitted, whether the create failed or the future was
/// dropped mid-call, gives the slot back. The give-back never takes the
/// target below `min_size`: a concurrent shrink may already have used it.
#[must_use]
#[derive(Debug)]
pub(crate) struct SlotReservation<'a> {
    group: &'a NodeGroup,
    seq: u32,
    committed: bool,
}

impl SlotReservation<'_> {
    /// 0-based index of the reserved slot.
    pub(crate) fn seq(&self) -> u32 {
        self.seq
    }

    /// Keep the slot: its server exists.
    pub(crate) fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for SlotReservation<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        match self.group.try_shrink(1) {
            Ok(from) => debug!(group = %self.group.id, from, to = from - 1, "released reserved slot"),
            Err(target) => debug!(group = %self.group.id, target, "reserved slot already taken by a shrink"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinary_group_starts_at_min() {
        let group = NodeGroup::ordinary(NodeGroupSpec::new("pool1", "cx21", "nbg1", 2, 5));
        let d = group.descriptor();
        assert_eq!(d.target_size, 2);
        assert_eq!(d.kind, GroupKind::Ordinary);
        assert!(!group.is_draining());
    }

    #[test]
    fn draining_group_has_fixed_shape() {
        let group = NodeGroup::draining();
        assert_eq!(group.id(), DRAINING_GROUP_ID);
        assert_eq!(group.server_type(), "cx11");
        assert_eq!(group.region(), "fsn1");
        assert_eq!((group.min_size(), group.max_size()), (0, 0));
        assert_eq!(group.target_size(), 0);
        assert!(group.is_draining());
    }

    #[test]
    fn grow_and_shrink_respect_bounds() {
        let group = NodeGroup::ordinary(NodeGroupSpec::new("pool1", "cx21", "nbg1", 1, 3));
        assert_eq!(group.try_grow(2), Ok(1));
        assert_eq!(group.try_grow(1), Err(3));
        assert_eq!(group.try_shrink(2), Ok(3));
        assert_eq!(group.try_shrink(1), Err(1));
        assert_eq!(group.target_size(), 1);
    }

    #[test]
    fn dropped_reservation_gives_the_slot_back() {
        let group = NodeGroup::ordinary(NodeGroupSpec::new("pool1", "cx21", "nbg1", 1, 3));
        let slot = group.reserve_slot().unwrap();
        assert_eq!(slot.seq(), 1);
        assert_eq!(group.target_size(), 2);
        drop(slot);
        assert_eq!(group.target_size(), 1);
    }

    #[test]
    fn committed_reservation_keeps_the_slot() {
        let group = NodeGroup::ordinary(NodeGroupSpec::new("pool1", "cx21", "nbg1", 0, 1));
        group.reserve_slot().unwrap().commit();
        assert_eq!(group.target_size(), 1);
        assert_eq!(group.reserve_slot().map(|slot| slot.seq()), Err(1));
    }

    #[test]
    fn release_after_concurrent_shrink_stays_at_min() {
        let group = NodeGroup::ordinary(NodeGroupSpec::new("pool1", "cx21", "nbg1", 1, 3));
        let slot = group.reserve_slot().unwrap();
        assert_eq!(group.try_shrink(1), Ok(2));
        drop(slot);
        assert_eq!(group.target_size(), 1);
    }

    #[test]
    fn drained_count_is_unbounded() {
        let group = NodeGroup::draining();
        for expected in 1..=5 {
            assert_eq!(group.record_drained(), expected);
        }
        assert_eq!(group.descriptor().target_size, 5);
    }
}
