//! CLI argument structs for all commands.

use clap::{Args, Parser};
use std::path::PathBuf;

/// Where the lineage graph comes from.
#[derive(Args, Debug, Clone, Default)]
pub struct SourceArgs {
    /// Cluster-state file (YAML or JSON) describing the pool's volumes
    ///
    /// The graph is built by enumerating this cluster. `execute` applies its
    /// deletions to it and writes the result back.
    #[arg(long, value_name = "FILE")]
    pub cluster_state: Option<PathBuf>,

    /// Read the lineage graph from a checkpoint instead of building it
    #[arg(long, value_name = "FILE")]
    pub load: Option<PathBuf>,

    /// Write the lineage graph to a checkpoint
    #[arg(long, value_name = "FILE", conflicts_with = "load")]
    pub save: Option<PathBuf>,
}

/// Arguments for the `plan` command
#[derive(Parser, Debug, Clone)]
pub struct PlanArgs {
    /// Graph source
    #[command(flatten)]
    pub source: SourceArgs,
}

/// Arguments for the `execute` command
#[derive(Parser, Debug, Clone)]
pub struct ExecuteArgs {
    /// Graph source
    #[command(flatten)]
    pub source: SourceArgs,

    /// Skip confirmation prompts
    #[arg(short, long)]
    pub yes: bool,
}
