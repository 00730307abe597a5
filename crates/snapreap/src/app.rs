//! Application context for a collector run.
//!
//! The `App` ties configuration, the storage backend and the graph pipeline
//! together: it obtains a lineage graph (built from the backend or loaded from
//! a checkpoint), runs partitioning and classification over it, and hands the
//! resulting plans to the CLI for printing or execution.
//!
//! # Example
//!
//! ```no_run
//! use snapreap::app::App;
//! use snapreap::config::SnapreapConfig;
//! use std::path::Path;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let app = App::open(SnapreapConfig::default(), Some(Path::new("cluster.yaml"))).await?;
//!     let lineage = app.lineage(None, None).await?;
//!     let analysis = snapreap::app::analyze(&lineage.graph)?;
//!     for plan in analysis.plans() {
//!         for operation in &plan.operations {
//!             println!("{operation}");
//!         }
//!     }
//!     Ok(())
//! }
//! ```

use crate::backend::InMemoryBackend;
use crate::classify::{Ineligibility, classify};
use crate::config::SnapreapConfig;
use crate::domain::NodeKey;
use crate::error::{Error, Result};
use crate::graph::{
    Diagnostic, GraphBuilder, LineageGraph, LoadWarning, load_checkpoint, partition,
    save_checkpoint,
};
use crate::plan::{GroupPlan, plan_group};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// A lineage graph plus everything noteworthy about how it was obtained.
#[derive(Debug, Clone)]
pub struct Lineage {
    /// The graph.
    pub graph: LineageGraph,
    /// Build-time findings (cross-pool clones, failed queries).
    pub diagnostics: Vec<Diagnostic>,
    /// Lines skipped while loading a checkpoint.
    pub load_warnings: Vec<LoadWarning>,
}

/// Verdict for one dependency group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupReport {
    /// Root of the group.
    pub root: NodeKey,
    /// Members in topological order.
    pub members: Vec<NodeKey>,
    /// Whether the whole group may be deleted.
    pub eligible: bool,
    /// Why not, for ineligible groups.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<Ineligibility>,
    /// Deletion plan, for eligible groups.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<GroupPlan>,
}

/// Result of partitioning and classifying a graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Analysis {
    /// Pool under scan.
    pub pool: String,
    /// All groups, in partition order.
    pub groups: Vec<GroupReport>,
    /// Partition-time findings.
    pub diagnostics: Vec<Diagnostic>,
}

impl Analysis {
    /// Plans of the eligible groups, in partition order.
    pub fn plans(&self) -> impl Iterator<Item = &GroupPlan> {
        self.groups.iter().filter_map(|group| group.plan.as_ref())
    }

    /// Number of eligible groups.
    #[must_use]
    pub fn eligible_count(&self) -> usize {
        self.groups.iter().filter(|group| group.eligible).count()
    }
}

/// Partition `graph`, classify every group and plan the eligible ones.
///
/// # Errors
///
/// `Error::Cycle` if the graph is cyclic.
pub fn analyze(graph: &LineageGraph) -> Result<Analysis> {
    let partition = partition(graph)?;
    let groups = partition
        .groups
        .iter()
        .map(|group| {
            let root = graph.node_at(group.root()).key.clone();
            let members = group.keys(graph);
            match classify(graph, group) {
                Ok(()) => {
                    tracing::debug!(%root, members = members.len(), "Group is eligible");
                    GroupReport {
                        root,
                        members,
                        eligible: true,
                        reason: None,
                        plan: Some(plan_group(graph, group)),
                    }
                }
                Err(reason) => {
                    tracing::debug!(%root, %reason, "Group is not eligible");
                    GroupReport {
                        root,
                        members,
                        eligible: false,
                        reason: Some(reason),
                        plan: None,
                    }
                }
            }
        })
        .collect::<Vec<_>>();

    let analysis = Analysis {
        pool: graph.pool().to_string(),
        groups,
        diagnostics: partition.diagnostics,
    };
    tracing::info!(
        groups = analysis.groups.len(),
        eligible = analysis.eligible_count(),
        "Classified dependency groups"
    );
    Ok(analysis)
}

/// Application context for CLI operations.
pub struct App {
    config: SnapreapConfig,

    /// Backend simulating the cluster described by `state_path`.
    backend: Option<InMemoryBackend>,

    state_path: Option<PathBuf>,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("config", &self.config)
            .field("state_path", &self.state_path)
            .field("backend", &self.backend.as_ref().map(|_| "<InMemoryBackend>"))
            .finish()
    }
}

impl App {
    /// Create an app, loading the cluster-state file if one is given.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the cluster-state
    /// file cannot be read.
    pub async fn open(config: SnapreapConfig, cluster_state: Option<&Path>) -> Result<Self> {
        config.validate()?;
        let backend = match cluster_state {
            Some(path) => {
                tracing::debug!(path = %path.display(), "Loading cluster state");
                Some(InMemoryBackend::load(path).await?)
            }
            None => None,
        };
        Ok(Self {
            config,
            backend,
            state_path: cluster_state.map(Path::to_path_buf),
        })
    }

    /// Create an app around an existing backend.
    #[must_use]
    pub fn with_backend(config: SnapreapConfig, backend: InMemoryBackend) -> Self {
        Self {
            config,
            backend: Some(backend),
            state_path: None,
        }
    }

    /// Effective configuration.
    pub fn config(&self) -> &SnapreapConfig {
        &self.config
    }

    /// The backend, if a cluster state was loaded.
    pub fn backend(&self) -> Option<&InMemoryBackend> {
        self.backend.as_ref()
    }

    /// Obtain the lineage graph.
    ///
    /// With `load`, the graph is read from that checkpoint; otherwise it is
    /// built from the backend. With `save`, the graph is then written as a
    /// checkpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if neither source is available, if the pool cannot be
    /// listed, or if a checkpoint cannot be read or written.
    pub async fn lineage(&self, load: Option<&Path>, save: Option<&Path>) -> Result<Lineage> {
        let lineage = if let Some(path) = load {
            let loaded = load_checkpoint(path).await?;
            if loaded.graph.pool() != self.config.pool {
                tracing::warn!(
                    checkpoint_pool = %loaded.graph.pool(),
                    configured_pool = %self.config.pool,
                    "Checkpoint was captured for a different pool"
                );
            }
            Lineage {
                graph: loaded.graph,
                diagnostics: Vec::new(),
                load_warnings: loaded.warnings,
            }
        } else {
            let backend = self.backend.as_ref().ok_or_else(|| {
                Error::Config("no graph source: pass a cluster state or a checkpoint".to_string())
            })?;
            let outcome = GraphBuilder::new(backend, &self.config.marker, self.config.pool.clone())
                .build_pool(&self.config.candidates)
                .await?;
            Lineage {
                graph: outcome.graph,
                diagnostics: outcome.diagnostics,
                load_warnings: Vec::new(),
            }
        };

        if let Some(path) = save {
            save_checkpoint(&lineage.graph, path).await?;
        }
        Ok(lineage)
    }

    /// Write the backend's current state back to the cluster-state file.
    ///
    /// Does nothing when the app was not opened from a file.
    pub async fn save_state(&self) -> Result<()> {
        if let (Some(backend), Some(path)) = (&self.backend, &self.state_path) {
            backend.state().await.save(path).await?;
            tracing::info!(path = %path.display(), "Saved cluster state");
        }
        Ok(())
    }
}
