//! Lineage graph of a pool.
//!
//! # Graph Representation and Edge Direction Convention
//!
//! The graph is a petgraph `DiGraph<Node, EdgeKind>` whose edges point from
//! **dependency to dependent**:
//!
//! - **HasSnapshot**: volume `V` with snapshot `s1` gives `V -> V@s1`
//! - **ClonedInto**: volume `W` cloned from `V@s1` gives `V@s1 -> W`
//!
//! A node's descendants are therefore exactly the nodes that would lose data
//! if it were destroyed, and a topological order lists every node before
//! anything that depends on it.
//!
//! The graph is a point-in-time view: it is built fresh for every run (see
//! [`builder`]) or loaded from a [`checkpoint`], and is never mutated while it
//! is being partitioned, classified or planned.

pub mod builder;
pub mod checkpoint;
pub mod partition;

use crate::domain::{EdgeKind, FetchStatus, Node, NodeInfo, NodeKey, VolumeRef};
use crate::error::{Error, Result};
use petgraph::Direction;
use petgraph::algo;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

pub use builder::{BuildOutcome, GraphBuilder};
pub use checkpoint::{LoadWarning, LoadedCheckpoint, load_checkpoint, save_checkpoint};
pub use partition::{DependencyGroup, Partition, partition};

/// Non-fatal finding recorded while building or partitioning a graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// A snapshot of the scanned pool has a clone living in another pool.
    CrossPoolClone {
        /// The parent snapshot.
        snapshot: NodeKey,
        /// The clone.
        child: VolumeRef,
    },

    /// A backend query failed; the node is marked `unknown`.
    QueryFailed {
        /// The node whose metadata could not be fetched.
        node: NodeKey,
        /// Backend error message.
        error: String,
    },

    /// Two volumes of different pools share a name and collapse into one
    /// node, which is marked `unknown`.
    PoolCollision {
        /// The ambiguous volume node.
        node: NodeKey,
        /// Pool of the node first seen, then the other pool.
        pools: [String; 2],
    },
    /// A node is reachable from more than one root; it stays in the first
    /// root's group and the edge below crosses groups.
    SharedDescendant {
        /// The node reached again.
        node: NodeKey,
        /// Root of the group that owns `node`.
        owner_root: NodeKey,
        /// Root of the group that reached it later.
        other_root: NodeKey,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CrossPoolClone { snapshot, child } => {
                write!(f, "{snapshot} has a clone in a different pool: {child}")
            }
            Self::QueryFailed { node, error } => {
                write!(f, "could not fetch metadata for {node}: {error}")
            }
            Self::PoolCollision { node, pools } => write!(
                f,
                "volume name {node} exists in pools {} and {}; treated as unknown",
                pools[0], pools[1]
            ),
            Self::SharedDescendant {
                node,
                owner_root,
                other_root,
            } => write!(
                f,
                "{node} is reachable from both {owner_root} and {other_root}; kept with {owner_root}"
            ),
        }
    }
}

/// Directed acyclic lineage graph of one pool.
#[derive(Debug, Clone)]
pub struct LineageGraph {
    /// Pool under scan; nodes with a different pool are cross-pool clones.
    pool: String,

    /// Nodes carry identity and attributes, edges carry their kind.
    /// Edge direction: dependency -> dependent.
    graph: DiGraph<Node, EdgeKind>,

    /// Key to index mapping. Every node in `graph` has an entry.
    node_map: HashMap<NodeKey, NodeIndex>,
}

impl LineageGraph {
    /// Create an empty graph for `pool`.
    pub fn new(pool: impl Into<String>) -> Self {
        Self {
            pool: pool.into(),
            graph: DiGraph::new(),
            node_map: HashMap::new(),
        }
    }

    /// Pool under scan.
    #[must_use]
    pub fn pool(&self) -> &str {
        &self.pool
    }

    /// Number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Insert a node, or replace the attributes of an existing one.
    pub fn upsert_node(&mut self, key: NodeKey, info: NodeInfo) -> NodeIndex {
        if let Some(&index) = self.node_map.get(&key) {
            self.graph[index].info = info;
            return index;
        }
        let index = self.graph.add_node(Node {
            key: key.clone(),
            info,
        });
        self.node_map.insert(key, index);
        index
    }

    /// Add an edge between two existing nodes. Parallel edges are not duplicated.
    ///
    /// # Errors
    ///
    /// `Error::Checkpoint` if either endpoint is missing.
    pub fn add_edge(&mut self, from: &NodeKey, to: &NodeKey, kind: EdgeKind) -> Result<()> {
        let from_index = self.require(from)?;
        let to_index = self.require(to)?;
        if self.graph.find_edge(from_index, to_index).is_none() {
            self.graph.add_edge(from_index, to_index, kind);
        }
        Ok(())
    }

    /// Returns `true` if adding `from -> to` would close a cycle.
    #[must_use]
    pub fn would_cycle(&self, from: &NodeKey, to: &NodeKey) -> bool {
        match (self.node_map.get(from), self.node_map.get(to)) {
            (Some(&from), Some(&to)) => {
                from == to || algo::has_path_connecting(&self.graph, to, from, None)
            }
            _ => false,
        }
    }

    /// Mark a node's metadata as unavailable.
    pub fn mark_unknown(&mut self, key: &NodeKey) {
        if let Some(&index) = self.node_map.get(key) {
            self.graph[index].info.status = FetchStatus::Unknown;
        }
    }

    /// Look up a node's index.
    #[must_use]
    pub fn index_of(&self, key: &NodeKey) -> Option<NodeIndex> {
        self.node_map.get(key).copied()
    }

    /// Look up a node by key.
    #[must_use]
    pub fn node(&self, key: &NodeKey) -> Option<&Node> {
        self.index_of(key).map(|index| &self.graph[index])
    }

    /// Node at `index`.
    ///
    /// # Panics
    ///
    /// If `index` does not belong to this graph.
    #[must_use]
    pub fn node_at(&self, index: NodeIndex) -> &Node {
        &self.graph[index]
    }

    /// All nodes, in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.graph.node_weights()
    }

    /// All edges as `(from, to, kind)`, in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = (&NodeKey, &NodeKey, EdgeKind)> {
        self.graph.edge_references().map(|edge| {
            (
                &self.graph[edge.source()].key,
                &self.graph[edge.target()].key,
                *edge.weight(),
            )
        })
    }

    /// Direct dependents of `index` with the kind of the connecting edge.
    pub fn children(&self, index: NodeIndex) -> impl Iterator<Item = (NodeIndex, EdgeKind)> + '_ {
        self.graph
            .edges_directed(index, Direction::Outgoing)
            .map(|edge| (edge.target(), *edge.weight()))
    }

    /// Returns `true` if the node lives in a pool other than the scanned one.
    #[must_use]
    pub fn is_cross_pool(&self, index: NodeIndex) -> bool {
        self.graph[index].info.pool != self.pool
    }

    /// Topological order of all node indices.
    ///
    /// # Errors
    ///
    /// `Error::Cycle` naming a node on the cycle.
    pub fn topological_order(&self) -> Result<Vec<NodeIndex>> {
        algo::toposort(&self.graph, None)
            .map_err(|cycle| Error::Cycle(self.graph[cycle.node_id()].key.clone()))
    }

    fn require(&self, key: &NodeKey) -> Result<NodeIndex> {
        self.index_of(key)
            .ok_or_else(|| Error::Checkpoint(format!("edge references unknown node {key}")))
    }
}
