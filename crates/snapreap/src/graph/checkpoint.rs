//! JSONL checkpoints of a lineage graph.
//!
//! A checkpoint captures a built graph so that planning can be repeated (or
//! audited) without querying the cluster again. The file is JSON Lines: a
//! header record first, then one record per node and one per edge.
//!
//! ```text
//! {"record":"header","version":1,"pool":"cinder","captured_at":"2026-01-01T00:00:00Z"}
//! {"record":"node","key":{"kind":"volume","name":"v"},"pool":"cinder","deletable":true,"status":"ok"}
//! {"record":"edge","from":{"kind":"volume","name":"v"},"to":{"kind":"snapshot","volume":"v","name":"s1"},"kind":"has_snapshot"}
//! ```
//!
//! Records are written sorted by key so that two checkpoints of the same graph
//! are byte-identical apart from the header timestamp.
//!
//! Loading is resilient but never optimistic: a damaged checkpoint still loads
//! for inspection, yet nothing whose record may have been lost is ever treated
//! as deletable.

use super::LineageGraph;
use crate::domain::{EdgeKind, FetchStatus, NodeInfo, NodeKey};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};

/// Checkpoint format version written by this build.
pub const CHECKPOINT_VERSION: u32 = 1;

/// One line of a checkpoint file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "record", rename_all = "snake_case")]
enum Record {
    Header {
        version: u32,
        pool: String,
        captured_at: DateTime<Utc>,
    },
    Node {
        key: NodeKey,
        pool: String,
        deletable: bool,
        #[serde(default)]
        status: FetchStatus,
    },
    Edge {
        from: NodeKey,
        to: NodeKey,
        kind: EdgeKind,
    },
}

/// Non-fatal problems found while loading a checkpoint.
///
/// The offending line or edge is skipped; everything else is loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadWarning {
    /// A line that is not a valid record.
    MalformedJson {
        /// 1-based line number.
        line_number: usize,
        /// Parser message.
        error: String,
    },

    /// An edge whose endpoint has no node record. The endpoint is added as an
    /// `unknown` placeholder and the edge is kept.
    OrphanedEdge {
        /// Edge source.
        from: NodeKey,
        /// Edge target.
        to: NodeKey,
    },

    /// An edge that would close a cycle.
    CycleEdge {
        /// Edge source.
        from: NodeKey,
        /// Edge target.
        to: NodeKey,
    },
}

impl fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedJson { line_number, error } => {
                write!(f, "skipped malformed line {line_number}: {error}")
            }
            Self::OrphanedEdge { from, to } => {
                write!(f, "edge {from} -> {to} has a missing endpoint; added it as unknown")
            }
            Self::CycleEdge { from, to } => {
                write!(f, "skipped edge {from} -> {to}: would create a cycle")
            }
        }
    }
}

/// A graph read back from a checkpoint.
#[derive(Debug, Clone)]
pub struct LoadedCheckpoint {
    /// The reconstructed graph.
    pub graph: LineageGraph,
    /// When the checkpoint was written.
    pub captured_at: DateTime<Utc>,
    /// Lines and edges that were skipped.
    pub warnings: Vec<LoadWarning>,
}

/// Write `graph` to `path`, replacing it atomically.
///
/// The checkpoint is written to a sibling temporary file which is then renamed
/// over `path`, so an interrupted save leaves any previous checkpoint intact.
pub async fn save_checkpoint(graph: &LineageGraph, path: &Path) -> Result<()> {
    save_checkpoint_at(graph, path, Utc::now()).await
}

/// Like [`save_checkpoint`] with an explicit capture time.
pub async fn save_checkpoint_at(
    graph: &LineageGraph,
    path: &Path,
    captured_at: DateTime<Utc>,
) -> Result<()> {
    let temp_path = path.with_extension("tmp");
    let file = File::create(&temp_path).await?;
    let mut writer = BufWriter::new(file);

    let mut records = vec![Record::Header {
        version: CHECKPOINT_VERSION,
        pool: graph.pool().to_string(),
        captured_at,
    }];

    let mut nodes: Vec<_> = graph.nodes().collect();
    nodes.sort_by(|a, b| a.key.cmp(&b.key));
    records.extend(nodes.into_iter().map(|node| Record::Node {
        key: node.key.clone(),
        pool: node.info.pool.clone(),
        deletable: node.info.deletable,
        status: node.info.status,
    }));

    let mut edges: Vec<_> = graph.edges().collect();
    edges.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
    records.extend(edges.into_iter().map(|(from, to, kind)| Record::Edge {
        from: from.clone(),
        to: to.clone(),
        kind,
    }));

    for record in &records {
        let json = serde_json::to_string(record)?;
        writer.write_all(json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
    }
    writer.flush().await?;
    drop(writer);

    tokio::fs::rename(&temp_path, path).await?;

    tracing::info!(
        path = %path.display(),
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        "Saved checkpoint"
    );
    Ok(())
}

/// Read a checkpoint.
///
/// # Error Handling
///
/// - **Malformed lines**: skipped with a warning. The lost record could have
///   been any node or edge, so every node of the graph is marked `unknown`
/// - **Edges to unknown nodes**: the missing endpoint is added as an `unknown`
///   placeholder and the edge is kept, with a warning
/// - **Cycle-creating edges**: skipped with a warning
///
/// A file without a leading header, or with an unsupported version, is
/// rejected with `Error::Checkpoint`.
pub async fn load_checkpoint(path: &Path) -> Result<LoadedCheckpoint> {
    let content = tokio::fs::read_to_string(path).await?;
    let mut warnings = Vec::new();

    // First pass: parse every line
    let mut records = Vec::new();
    for (index, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Record>(line) {
            Ok(record) => records.push(record),
            Err(e) => warnings.push(LoadWarning::MalformedJson {
                line_number: index + 1,
                error: e.to_string(),
            }),
        }
    }

    let mut records = records.into_iter();
    let (pool, captured_at) = match records.next() {
        Some(Record::Header {
            version,
            pool,
            captured_at,
        }) => {
            if version != CHECKPOINT_VERSION {
                return Err(Error::Checkpoint(format!(
                    "unsupported version {version} (expected {CHECKPOINT_VERSION})"
                )));
            }
            (pool, captured_at)
        }
        Some(_) => return Err(Error::Checkpoint("first record is not a header".to_string())),
        None => return Err(Error::Checkpoint("file contains no records".to_string())),
    };

    let mut graph = LineageGraph::new(pool);
    let mut edges = Vec::new();

    // Second pass: nodes
    for record in records {
        match record {
            Record::Node {
                key,
                pool,
                deletable,
                status,
            } => {
                graph.upsert_node(
                    key,
                    NodeInfo {
                        pool,
                        deletable,
                        status,
                    },
                );
            }
            Record::Edge { from, to, kind } => edges.push((from, to, kind)),
            Record::Header { .. } => {
                return Err(Error::Checkpoint("duplicate header record".to_string()));
            }
        }
    }

    // Third pass: edges, with orphan and cycle checks
    for (from, to, kind) in edges {
        let missing: Vec<NodeKey> = [&from, &to]
            .into_iter()
            .filter(|key| graph.index_of(key).is_none())
            .cloned()
            .collect();
        if !missing.is_empty() {
            let pool = [&from, &to]
                .into_iter()
                .find_map(|key| graph.node(key))
                .map_or_else(|| graph.pool().to_string(), |node| node.info.pool.clone());
            for key in missing {
                graph.upsert_node(
                    key,
                    NodeInfo {
                        pool: pool.clone(),
                        deletable: false,
                        status: FetchStatus::Unknown,
                    },
                );
            }
            warnings.push(LoadWarning::OrphanedEdge {
                from: from.clone(),
                to: to.clone(),
            });
        }
        if graph.would_cycle(&from, &to) {
            warnings.push(LoadWarning::CycleEdge { from, to });
            continue;
        }
        graph.add_edge(&from, &to, kind)?;
    }

    if warnings
        .iter()
        .any(|warning| matches!(warning, LoadWarning::MalformedJson { .. }))
    {
        let keys: Vec<NodeKey> = graph.nodes().map(|node| node.key.clone()).collect();
        for key in &keys {
            graph.mark_unknown(key);
        }
        tracing::warn!(
            path = %path.display(),
            "Checkpoint has unreadable lines; every node is marked unknown"
        );
    }

    for warning in &warnings {
        tracing::warn!(path = %path.display(), %warning, "Checkpoint warning");
    }
    tracing::info!(
        path = %path.display(),
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        %captured_at,
        "Loaded checkpoint"
    );

    Ok(LoadedCheckpoint {
        graph,
        captured_at,
        warnings,
    })
}
