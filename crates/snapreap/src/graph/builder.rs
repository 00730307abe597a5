//! Lineage graph construction from backend enumeration.
//!
//! Starting from the candidate volumes of the scanned pool, the builder lists
//! each volume's snapshots and each snapshot's clones, and keeps expanding the
//! clones it discovers until no new volume turns up. Volumes are processed
//! FIFO, so a parent's snapshots are always enumerated before any of its
//! children are queried.
//!
//! Query failures never abort construction: the node whose metadata could not
//! be fetched is marked `unknown` (and thereby made ineligible) and a
//! [`Diagnostic::QueryFailed`] is recorded.

use super::{Diagnostic, LineageGraph};
use crate::backend::StorageBackend;
use crate::config::CandidateFilter;
use crate::domain::{EdgeKind, NodeInfo, NodeKey, VolumeRef};
use crate::error::Result;
use crate::marker::DeletableMarker;
use std::collections::{HashSet, VecDeque};

/// A freshly built graph and everything noteworthy found while building it.
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    /// The lineage graph.
    pub graph: LineageGraph,
    /// Cross-pool clones and failed queries, in discovery order.
    pub diagnostics: Vec<Diagnostic>,
}

/// Builds a [`LineageGraph`] by querying a [`StorageBackend`].
pub struct GraphBuilder<'a> {
    backend: &'a dyn StorageBackend,
    marker: &'a dyn DeletableMarker,
    pool: String,
}

impl<'a> GraphBuilder<'a> {
    /// Create a builder scanning `pool`.
    pub fn new(
        backend: &'a dyn StorageBackend,
        marker: &'a dyn DeletableMarker,
        pool: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            marker,
            pool: pool.into(),
        }
    }

    /// List the pool, keep the volumes accepted by `filter`, and build from them.
    ///
    /// # Errors
    ///
    /// `Error::Backend` if the pool itself cannot be listed.
    pub async fn build_pool(&self, filter: &CandidateFilter) -> Result<BuildOutcome> {
        let all = self.backend.list_volumes(&self.pool).await?;
        let total = all.len();
        let candidates: Vec<String> = all.into_iter().filter(|name| filter.accepts(name)).collect();
        tracing::info!(
            pool = %self.pool,
            total,
            candidates = candidates.len(),
            "Listed pool"
        );
        self.build(&candidates).await
    }

    /// Build the closed lineage graph reachable from `candidates`.
    ///
    /// Backend failures are recorded as diagnostics; an error is only returned
    /// if the graph itself is inconsistent.
    pub async fn build(&self, candidates: &[String]) -> Result<BuildOutcome> {
        let mut graph = LineageGraph::new(self.pool.clone());
        let mut diagnostics = Vec::new();
        let mut queue: VecDeque<VolumeRef> = VecDeque::new();
        let mut expanded: HashSet<VolumeRef> = HashSet::new();

        for name in candidates {
            let volume = VolumeRef::new(self.pool.clone(), name.clone());
            self.ensure_volume(&mut graph, &volume, &mut diagnostics);
            queue.push_back(volume);
        }

        while let Some(volume) = queue.pop_front() {
            if !expanded.insert(volume.clone()) {
                continue;
            }
            let volume_key = NodeKey::volume(volume.name.clone());
            tracing::debug!(volume = %volume, "Checking volume");

            let snapshots = match self.backend.list_snapshots(&volume).await {
                Ok(snapshots) => snapshots,
                Err(e) => {
                    tracing::warn!(volume = %volume, error = %e, "Could not list snapshots");
                    graph.mark_unknown(&volume_key);
                    diagnostics.push(Diagnostic::QueryFailed {
                        node: volume_key,
                        error: e.to_string(),
                    });
                    continue;
                }
            };

            for snapshot in &snapshots {
                let snap_key = NodeKey::snapshot(volume.name.clone(), snapshot.name.clone());
                let deletable = self.marker.is_deletable(&snap_key);
                graph.upsert_node(snap_key.clone(), NodeInfo::new(volume.pool.clone(), deletable));
                graph.add_edge(&volume_key, &snap_key, EdgeKind::HasSnapshot)?;
            }

            for snapshot in &snapshots {
                let snap_key = NodeKey::snapshot(volume.name.clone(), snapshot.name.clone());
                tracing::debug!(snapshot = %snap_key, "Checking snapshot");

                let children = match self.backend.list_clone_children(&volume, &snapshot.name).await
                {
                    Ok(children) => children,
                    Err(e) => {
                        tracing::warn!(snapshot = %snap_key, error = %e, "Could not list clones");
                        graph.mark_unknown(&snap_key);
                        diagnostics.push(Diagnostic::QueryFailed {
                            node: snap_key,
                            error: e.to_string(),
                        });
                        continue;
                    }
                };

                for child in children {
                    if child.pool != self.pool {
                        tracing::warn!(
                            snapshot = %snap_key,
                            child = %child,
                            "Image has clone on a different pool"
                        );
                        diagnostics.push(Diagnostic::CrossPoolClone {
                            snapshot: snap_key.clone(),
                            child: child.clone(),
                        });
                    }

                    let (child_key, unambiguous) =
                        self.ensure_volume(&mut graph, &child, &mut diagnostics);
                    if graph.would_cycle(&snap_key, &child_key) {
                        tracing::warn!(
                            snapshot = %snap_key,
                            child = %child_key,
                            "Backend reported a clone that would close a cycle; ignoring it"
                        );
                        graph.mark_unknown(&snap_key);
                        diagnostics.push(Diagnostic::QueryFailed {
                            node: snap_key.clone(),
                            error: format!("clone {child_key} would create a cycle"),
                        });
                        continue;
                    }
                    graph.add_edge(&snap_key, &child_key, EdgeKind::ClonedInto)?;
                    if unambiguous {
                        queue.push_back(child);
                    }
                }
            }
        }

        tracing::info!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            diagnostics = diagnostics.len(),
            "Built lineage graph"
        );
        Ok(BuildOutcome { graph, diagnostics })
    }

    /// Insert a volume node unless it is already known.
    ///
    /// Nodes are keyed by name, so a volume whose name is already taken by a
    /// volume of another pool cannot be told apart from it: the node is marked
    /// `unknown` and `false` is returned alongside the key.
    fn ensure_volume(
        &self,
        graph: &mut LineageGraph,
        volume: &VolumeRef,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> (NodeKey, bool) {
        let key = NodeKey::volume(volume.name.clone());
        let existing_pool = graph.node(&key).map(|node| node.info.pool.clone());
        match existing_pool {
            None => {
                let deletable = self.marker.is_deletable(&key);
                graph.upsert_node(key.clone(), NodeInfo::new(volume.pool.clone(), deletable));
                (key, true)
            }
            Some(pool) if pool == volume.pool => (key, true),
            Some(pool) => {
                tracing::warn!(
                    volume = %key,
                    pool = %pool,
                    other_pool = %volume.pool,
                    "Volume name exists in two pools; treating it as unknown"
                );
                graph.mark_unknown(&key);
                diagnostics.push(Diagnostic::PoolCollision {
                    node: key.clone(),
                    pools: [pool, volume.pool.clone()],
                });
                (key, false)
            }
        }
    }
}
