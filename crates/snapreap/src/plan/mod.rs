//! Deletion plans.
//!
//! A plan is the ordered list of backend operations that removes one eligible
//! dependency group. It is built in two passes over the group's topological
//! order:
//!
//! 1. **Preparation** (topological order): for every snapshot, flatten each of
//!    its clones that lives in another pool, then unprotect the snapshot.
//! 2. **Removal** (reverse topological order): remove snapshots and volumes,
//!    so every clone is gone before the snapshot it was cloned from, and every
//!    snapshot before its volume.
//!
//! No removal therefore ever targets a node that still has a live dependent,
//! which is exactly what the backend's protection invariants demand.

pub mod executor;

use crate::backend::StorageBackend;
use crate::domain::{EdgeKind, NodeKey, VolumeRef};
use crate::error::BackendResult;
use crate::graph::{DependencyGroup, LineageGraph};
use serde::Serialize;
use std::fmt;

pub use executor::{
    AlwaysConfirm, AlwaysDeny, Confirm, ExecutionReport, GroupOutcome, GroupResult,
    PromptConfirm, execute,
};

/// A single backend mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    /// Detach a cross-pool clone from its parent snapshot.
    Flatten {
        /// The clone.
        clone: VolumeRef,
        /// The snapshot it was cloned from.
        parent: NodeKey,
    },

    /// Remove a snapshot's protection flag.
    Unprotect {
        /// Owning volume.
        volume: VolumeRef,
        /// Snapshot name.
        snapshot: String,
    },

    /// Delete a snapshot.
    RemoveSnapshot {
        /// Owning volume.
        volume: VolumeRef,
        /// Snapshot name.
        snapshot: String,
    },

    /// Delete a volume.
    RemoveVolume {
        /// The volume.
        volume: VolumeRef,
    },
}

impl Operation {
    /// Key of the node the operation mutates.
    #[must_use]
    pub fn target(&self) -> NodeKey {
        match self {
            Self::Flatten { clone, .. } => NodeKey::volume(clone.name.clone()),
            Self::Unprotect { volume, snapshot } | Self::RemoveSnapshot { volume, snapshot } => {
                NodeKey::snapshot(volume.name.clone(), snapshot.clone())
            }
            Self::RemoveVolume { volume } => NodeKey::volume(volume.name.clone()),
        }
    }

    /// Returns `true` for operations that destroy data.
    #[must_use]
    pub fn is_removal(&self) -> bool {
        matches!(self, Self::RemoveSnapshot { .. } | Self::RemoveVolume { .. })
    }

    /// Perform the operation.
    pub async fn apply(&self, backend: &dyn StorageBackend) -> BackendResult<()> {
        match self {
            Self::Flatten { clone, .. } => backend.flatten(clone).await,
            Self::Unprotect { volume, snapshot } => {
                backend.unprotect_snapshot(volume, snapshot).await
            }
            Self::RemoveSnapshot { volume, snapshot } => {
                backend.delete_snapshot(volume, snapshot).await
            }
            Self::RemoveVolume { volume } => backend.remove_volume(volume).await,
        }
    }
}

/// Renders the equivalent `rbd` command line.
impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flatten { clone, .. } => write!(f, "rbd -p {} flatten {}", clone.pool, clone.name),
            Self::Unprotect { volume, snapshot } => write!(
                f,
                "rbd -p {} snap unprotect {}@{snapshot}",
                volume.pool, volume.name
            ),
            Self::RemoveSnapshot { volume, snapshot } => write!(
                f,
                "rbd -p {} snap rm {}@{snapshot}",
                volume.pool, volume.name
            ),
            Self::RemoveVolume { volume } => write!(f, "rbd -p {} rm {}", volume.pool, volume.name),
        }
    }
}

/// Ordered operations for one dependency group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupPlan {
    /// Root of the group.
    pub root: NodeKey,
    /// Volumes of the group, in topological order; each needs confirmation
    /// before the plan runs.
    pub volumes: Vec<VolumeRef>,
    /// Operations in execution order.
    pub operations: Vec<Operation>,
}

/// Build the plan for `group`.
///
/// The group is assumed eligible; see [`crate::classify`].
#[must_use]
pub fn plan_group(graph: &LineageGraph, group: &DependencyGroup) -> GroupPlan {
    let mut operations = Vec::new();
    let mut volumes = Vec::new();

    // Preparation pass
    for &index in group.members() {
        let node = graph.node_at(index);
        let NodeKey::Snapshot { volume, name } = &node.key else {
            volumes.push(VolumeRef::new(node.info.pool.clone(), node.key.volume_name()));
            continue;
        };

        for (child, kind) in graph.children(index) {
            if kind == EdgeKind::ClonedInto && graph.is_cross_pool(child) {
                let clone = graph.node_at(child);
                operations.push(Operation::Flatten {
                    clone: VolumeRef::new(clone.info.pool.clone(), clone.key.volume_name()),
                    parent: node.key.clone(),
                });
            }
        }
        operations.push(Operation::Unprotect {
            volume: VolumeRef::new(node.info.pool.clone(), volume.clone()),
            snapshot: name.clone(),
        });
    }

    // Removal pass
    for &index in group.members().iter().rev() {
        let node = graph.node_at(index);
        let volume = VolumeRef::new(node.info.pool.clone(), node.key.volume_name());
        operations.push(match &node.key {
            NodeKey::Snapshot { name, .. } => Operation::RemoveSnapshot {
                volume,
                snapshot: name.clone(),
            },
            NodeKey::Volume { .. } => Operation::RemoveVolume { volume },
        });
    }

    GroupPlan {
        root: graph.node_at(group.root()).key.clone(),
        volumes,
        operations,
    }
}
