//! Domain types for lineage graphs.
//!
//! A pool's lineage is made of two kinds of nodes, volumes and snapshots, and
//! two kinds of edges: a volume *has* snapshots, and a snapshot is *cloned into*
//! new volumes that use it as their copy-on-write base.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a node in the lineage graph.
///
/// Volumes are identified by name, snapshots by their owning volume plus the
/// snapshot name. The derived ordering is only used for deterministic output.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeKey {
    /// A volume (block device image).
    Volume {
        /// Volume name within its pool.
        name: String,
    },

    /// An immutable point-in-time snapshot of a volume.
    Snapshot {
        /// Name of the volume the snapshot belongs to.
        volume: String,
        /// Snapshot name.
        name: String,
    },
}

impl NodeKey {
    /// Create a volume key.
    pub fn volume(name: impl Into<String>) -> Self {
        Self::Volume { name: name.into() }
    }

    /// Create a snapshot key.
    pub fn snapshot(volume: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Snapshot {
            volume: volume.into(),
            name: name.into(),
        }
    }

    /// Returns `true` for snapshot keys.
    #[must_use]
    pub fn is_snapshot(&self) -> bool {
        matches!(self, Self::Snapshot { .. })
    }

    /// Name of the volume this node is, or belongs to.
    #[must_use]
    pub fn volume_name(&self) -> &str {
        match self {
            Self::Volume { name } | Self::Snapshot { volume: name, .. } => name,
        }
    }

    /// Key of the owning volume for snapshots; `None` for volumes.
    #[must_use]
    pub fn owner(&self) -> Option<NodeKey> {
        match self {
            Self::Volume { .. } => None,
            Self::Snapshot { volume, .. } => Some(Self::volume(volume.clone())),
        }
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Volume { name } => write!(f, "{name}"),
            Self::Snapshot { volume, name } => write!(f, "{volume}@{name}"),
        }
    }
}

/// Whether a node's metadata could be fetched from the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStatus {
    /// Metadata was fetched successfully.
    #[default]
    Ok,

    /// A backend query for this node failed; the node is never deletable.
    Unknown,
}

impl fmt::Display for FetchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Per-node attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    /// Pool the node lives in. Snapshots carry their volume's pool.
    pub pool: String,

    /// Whether the upstream system has soft-deleted this node.
    pub deletable: bool,

    /// Result of fetching the node's metadata.
    #[serde(default)]
    pub status: FetchStatus,
}

impl NodeInfo {
    /// Attributes for a node whose metadata was fetched successfully.
    pub fn new(pool: impl Into<String>, deletable: bool) -> Self {
        Self {
            pool: pool.into(),
            deletable,
            status: FetchStatus::Ok,
        }
    }
}

/// A lineage graph node: identity plus attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// Node identity.
    pub key: NodeKey,
    /// Node attributes.
    pub info: NodeInfo,
}

/// Kind of a lineage edge.
///
/// Edges always point from the dependency to the dependent: a snapshot depends
/// on its volume, and a clone depends on the snapshot it was cloned from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Volume -> Snapshot.
    HasSnapshot,

    /// Snapshot -> Volume.
    ClonedInto,
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HasSnapshot => write!(f, "has_snapshot"),
            Self::ClonedInto => write!(f, "cloned_into"),
        }
    }
}

/// Backend addressing of a volume: pool plus name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VolumeRef {
    /// Pool the volume lives in.
    pub pool: String,
    /// Volume name.
    pub name: String,
}

impl VolumeRef {
    /// Create a volume reference.
    pub fn new(pool: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            pool: pool.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for VolumeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.pool, self.name)
    }
}

/// Snapshot metadata returned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotInfo {
    /// Snapshot name.
    pub name: String,
    /// Whether the snapshot is protected against removal.
    #[serde(default)]
    pub protected: bool,
}
