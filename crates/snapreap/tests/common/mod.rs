//! Common test utilities shared across integration tests.

#![allow(dead_code)]

use snapreap::app::{self, Analysis};
use snapreap::backend::{ClusterState, InMemoryBackend, SnapshotState, VolumeState};
use snapreap::config::CandidateFilter;
use snapreap::domain::{NodeKey, VolumeRef};
use snapreap::graph::{BuildOutcome, GraphBuilder};
use std::collections::HashSet;
use std::path::Path;
use std::process::{Command, Output};

/// Fluent builder for cluster-state fixtures.
#[derive(Debug, Default)]
pub struct ClusterBuilder {
    volumes: Vec<VolumeState>,
}

impl ClusterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a volume without snapshots.
    pub fn volume(mut self, pool: &str, name: &str) -> Self {
        self.ensure(pool, name);
        self
    }

    /// Add a protected snapshot, creating its volume if needed.
    pub fn snapshot(mut self, pool: &str, volume: &str, snapshot: &str) -> Self {
        self.ensure(pool, volume).snapshots.push(SnapshotState {
            name: snapshot.to_string(),
            protected: true,
            unreadable: false,
            children: vec![],
        });
        self
    }

    /// Clone `pool/volume@snapshot` into `child_pool/child`.
    pub fn clone_into(
        mut self,
        (pool, volume, snapshot): (&str, &str, &str),
        (child_pool, child): (&str, &str),
    ) -> Self {
        self.ensure(child_pool, child);
        let parent = self.ensure(pool, volume);
        parent
            .snapshots
            .iter_mut()
            .find(|snap| snap.name == snapshot)
            .expect("snapshot must be added before cloning it")
            .children
            .push(VolumeRef::new(child_pool, child));
        self
    }

    /// Make listing the volume's snapshots fail.
    pub fn unreadable(mut self, pool: &str, name: &str) -> Self {
        self.ensure(pool, name).unreadable = true;
        self
    }

    pub fn build(self) -> ClusterState {
        ClusterState {
            volumes: self.volumes,
        }
    }

    pub fn backend(self) -> InMemoryBackend {
        InMemoryBackend::from_state(self.build())
    }

    fn ensure(&mut self, pool: &str, name: &str) -> &mut VolumeState {
        let position = match self
            .volumes
            .iter()
            .position(|v| v.pool == pool && v.name == name)
        {
            Some(position) => position,
            None => {
                self.volumes.push(VolumeState {
                    pool: pool.to_string(),
                    name: name.to_string(),
                    unreadable: false,
                    snapshots: vec![],
                });
                self.volumes.len() - 1
            }
        };
        &mut self.volumes[position]
    }
}

/// The basic lineage: `V` with snapshot `V@s1`, cloned into `W`.
pub fn v_s1_w(clone_pool: &str) -> ClusterBuilder {
    ClusterBuilder::new()
        .snapshot("rbd", "V", "s1")
        .clone_into(("rbd", "V", "s1"), (clone_pool, "W"))
}

/// Marker treating exactly the listed nodes (`name` or `volume@snapshot`) as deletable.
pub fn marked(names: &[&str]) -> impl Fn(&NodeKey) -> bool + Send + Sync {
    let names: HashSet<String> = names.iter().map(|name| (*name).to_string()).collect();
    move |key: &NodeKey| names.contains(&key.to_string())
}

/// Build the graph of pool `rbd` with every volume a candidate.
pub async fn build(backend: &InMemoryBackend, deletable: &[&str]) -> BuildOutcome {
    let marker = marked(deletable);
    GraphBuilder::new(backend, &marker, "rbd")
        .build_pool(&CandidateFilter::accept_all())
        .await
        .expect("pool listing succeeds")
}

/// Build and analyze pool `rbd`.
pub async fn build_and_analyze(
    backend: &InMemoryBackend,
    deletable: &[&str],
) -> (BuildOutcome, Analysis) {
    let outcome = build(backend, deletable).await;
    let analysis = app::analyze(&outcome.graph).expect("lineage is acyclic");
    (outcome, analysis)
}

/// Rendered operations of every eligible group, in order.
pub fn rendered(analysis: &Analysis) -> Vec<Vec<String>> {
    analysis
        .plans()
        .map(|plan| plan.operations.iter().map(ToString::to_string).collect())
        .collect()
}

/// Run the snapreap binary in `dir` with colors disabled.
pub fn run_snapreap_in_dir(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_snapreap"))
        .args(args)
        .current_dir(dir)
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute snapreap binary")
}
