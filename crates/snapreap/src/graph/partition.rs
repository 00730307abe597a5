//! Partitioning of a lineage graph into dependency groups.
//!
//! # Algorithm
//!
//! 1. Compute a topological order of the whole graph
//! 2. Walk it; the first node not yet assigned to a group becomes a root
//! 3. The root's group is every node reachable from it that no earlier group
//!    claimed (traversal stops at claimed nodes)
//!
//! Roots are chosen strictly in topological order, so a node whose ancestors
//! were all processed has already been claimed by one of them; every root is a
//! node without unclaimed ancestors.
//!
//! # Shared Descendants
//!
//! Copy-on-write lineage is a forest in practice: a volume has one parent
//! snapshot and a snapshot one volume. If a graph nevertheless has a node
//! reachable from two roots, the node stays with the first root and the edge
//! from the second group crosses the partition. This is not a true
//! connected-components computation; each occurrence is logged and returned as
//! a [`Diagnostic::SharedDescendant`] so callers can see exactly where the
//! approximation applied.

use super::{Diagnostic, LineageGraph};
use crate::domain::{EdgeKind, NodeKey};
use crate::error::Result;
use petgraph::graph::NodeIndex;
use std::collections::{HashMap, VecDeque};

/// A set of nodes closed under reachability from its root: the unit of
/// atomic deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyGroup {
    /// Members in topological order; the root comes first.
    members: Vec<NodeIndex>,
}

impl DependencyGroup {
    /// The node the group was grown from.
    #[must_use]
    pub fn root(&self) -> NodeIndex {
        self.members[0]
    }

    /// Members in topological order.
    #[must_use]
    pub fn members(&self) -> &[NodeIndex] {
        &self.members
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Groups are never empty; provided for API completeness.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Returns `true` if `index` belongs to the group.
    #[must_use]
    pub fn contains(&self, index: NodeIndex) -> bool {
        self.members.contains(&index)
    }

    /// Member keys in topological order.
    #[must_use]
    pub fn keys(&self, graph: &LineageGraph) -> Vec<NodeKey> {
        self.members
            .iter()
            .map(|&index| graph.node_at(index).key.clone())
            .collect()
    }

    /// Edges with both endpoints inside the group.
    #[must_use]
    pub fn internal_edges(&self, graph: &LineageGraph) -> Vec<(NodeKey, NodeKey, EdgeKind)> {
        self.members
            .iter()
            .flat_map(|&from| {
                graph
                    .children(from)
                    .filter(|(to, _)| self.contains(*to))
                    .map(move |(to, kind)| {
                        (
                            graph.node_at(from).key.clone(),
                            graph.node_at(to).key.clone(),
                            kind,
                        )
                    })
            })
            .collect()
    }
}

/// Result of partitioning a graph.
#[derive(Debug, Clone)]
pub struct Partition {
    /// Groups in the order their roots appear in the topological order.
    pub groups: Vec<DependencyGroup>,
    /// Shared-descendant findings.
    pub diagnostics: Vec<Diagnostic>,
}

/// Split `graph` into disjoint dependency groups.
///
/// # Errors
///
/// `Error::Cycle` if the graph is not acyclic.
pub fn partition(graph: &LineageGraph) -> Result<Partition> {
    let order = graph.topological_order()?;
    let position: HashMap<NodeIndex, usize> =
        order.iter().enumerate().map(|(pos, &index)| (index, pos)).collect();

    let mut owner: HashMap<NodeIndex, usize> = HashMap::with_capacity(order.len());
    let mut groups: Vec<DependencyGroup> = Vec::new();
    let mut diagnostics = Vec::new();

    for &root in &order {
        if owner.contains_key(&root) {
            continue;
        }
        let group_id = groups.len();
        owner.insert(root, group_id);

        let mut members = vec![root];
        let mut queue = VecDeque::from([root]);
        while let Some(current) = queue.pop_front() {
            for (child, _) in graph.children(current) {
                match owner.get(&child) {
                    None => {
                        owner.insert(child, group_id);
                        members.push(child);
                        queue.push_back(child);
                    }
                    Some(&other) if other != group_id => {
                        let diagnostic = Diagnostic::SharedDescendant {
                            node: graph.node_at(child).key.clone(),
                            owner_root: graph.node_at(groups[other].root()).key.clone(),
                            other_root: graph.node_at(root).key.clone(),
                        };
                        tracing::warn!(%diagnostic, "Graph inconsistency");
                        diagnostics.push(diagnostic);
                    }
                    Some(_) => {}
                }
            }
        }

        members.sort_by_key(|index| position[index]);
        groups.push(DependencyGroup { members });
    }

    tracing::debug!(
        groups = groups.len(),
        inconsistencies = diagnostics.len(),
        "Partitioned lineage graph"
    );
    Ok(Partition {
        groups,
        diagnostics,
    })
}
