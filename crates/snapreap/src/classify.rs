//! Group eligibility.
//!
//! A dependency group is deleted all or nothing, so it is eligible only when
//! every single member may go:
//!
//! - the node is flagged deletable
//! - its metadata was fetched (`status == ok`)
//! - for a snapshot, its owning volume is in the graph and flagged deletable
//!
//! An empty group is never eligible.

use crate::domain::{FetchStatus, NodeKey};
use crate::graph::{DependencyGroup, LineageGraph};
use serde::Serialize;
use std::fmt;

/// Why a group cannot be deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Ineligibility {
    /// The group has no members.
    Empty,

    /// A member is not flagged deletable.
    NotDeletable {
        /// The offending node.
        node: NodeKey,
    },

    /// A member's metadata could not be fetched.
    Unknown {
        /// The offending node.
        node: NodeKey,
    },

    /// A snapshot's owning volume is missing from the graph.
    OwnerMissing {
        /// The snapshot.
        node: NodeKey,
    },

    /// A snapshot's owning volume is not flagged deletable.
    OwnerNotDeletable {
        /// The snapshot.
        node: NodeKey,
        /// Its volume.
        owner: NodeKey,
    },
}

impl fmt::Display for Ineligibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "group is empty"),
            Self::NotDeletable { node } => write!(f, "{node} is not marked for deletion"),
            Self::Unknown { node } => write!(f, "{node} has unknown status"),
            Self::OwnerMissing { node } => write!(f, "volume of {node} is not in the graph"),
            Self::OwnerNotDeletable { node, owner } => {
                write!(f, "{node} belongs to {owner}, which is not marked for deletion")
            }
        }
    }
}

/// Classify a group, naming the first member (in topological order) that
/// blocks deletion.
///
/// # Errors
///
/// The [`Ineligibility`] of the first offending member.
pub fn classify(graph: &LineageGraph, group: &DependencyGroup) -> Result<(), Ineligibility> {
    if group.is_empty() {
        return Err(Ineligibility::Empty);
    }

    for &index in group.members() {
        let node = graph.node_at(index);
        if node.info.status == FetchStatus::Unknown {
            return Err(Ineligibility::Unknown {
                node: node.key.clone(),
            });
        }
        if !node.info.deletable {
            return Err(Ineligibility::NotDeletable {
                node: node.key.clone(),
            });
        }
        if let Some(owner) = node.key.owner() {
            match graph.node(&owner) {
                None => {
                    return Err(Ineligibility::OwnerMissing {
                        node: node.key.clone(),
                    });
                }
                Some(volume) if !volume.info.deletable => {
                    return Err(Ineligibility::OwnerNotDeletable {
                        node: node.key.clone(),
                        owner,
                    });
                }
                Some(_) => {}
            }
        }
    }
    Ok(())
}

/// Returns `true` if the whole group may be deleted.
#[must_use]
pub fn is_eligible(graph: &LineageGraph, group: &DependencyGroup) -> bool {
    classify(graph, group).is_ok()
}
