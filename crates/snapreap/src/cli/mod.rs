//! CLI argument parsing and command dispatch.
//!
//! # Commands
//!
//! - `plan`: Print the deletion commands for every eligible group
//! - `execute`: Perform them, group by group, with confirmation
//!
//! # Global Flags
//!
//! - `--config FILE`: Configuration file (default: `snapreap.yaml` if present)
//! - `--pool NAME`: Pool to scan, overriding the configuration
//! - `--marker PATTERN`: Soft-delete marker substring, overriding the configuration
//! - `--json`: Output in JSON format
//! - `-v`: More logging (repeatable)
//!
//! # Example
//!
//! ```bash
//! snapreap plan --cluster-state cluster.yaml --save graph.jsonl
//! snapreap plan --load graph.jsonl
//! snapreap execute --cluster-state cluster.yaml
//! ```

mod args;
mod execute;

use crate::config::SnapreapConfig;
use crate::marker::{MarkerRule, MarkerRules};
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

pub use args::{ExecuteArgs, PlanArgs, SourceArgs};

/// Snapreap - dependency-aware garbage collector for copy-on-write volumes
///
/// Finds volumes and snapshots that were soft-deleted upstream, groups them
/// with everything that depends on them, and removes only groups that are
/// deletable as a whole, in an order the storage backend accepts.
#[derive(Parser, Debug)]
#[command(name = "snapreap")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Pool to scan
    #[arg(short, long, global = true)]
    pub pool: Option<String>,

    /// Soft-delete marker substring (repeatable; replaces configured rules)
    #[arg(short, long, global = true, value_name = "PATTERN")]
    pub marker: Vec<String>,

    /// Output in JSON format for programmatic use
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Print the deletion plan
    ///
    /// Builds (or loads) the lineage graph, partitions it into dependency
    /// groups and prints the ordered commands for every eligible group.
    /// Nothing is modified.
    Plan(PlanArgs),

    /// Delete eligible groups
    ///
    /// Like `plan`, then performs each group's operations after asking for
    /// confirmation of every volume in the group.
    Execute(ExecuteArgs),
}

impl Cli {
    /// Parse command-line arguments
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Default log filter for the verbosity level.
    #[must_use]
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }

    /// Execute the parsed command
    ///
    /// Returns the process exit code: success, or 1 if any group failed.
    ///
    /// # Errors
    ///
    /// Returns an error for fatal conditions (configuration, unreadable
    /// files, an unlistable pool).
    pub async fn execute(&self) -> Result<ExitCode> {
        let working_dir = std::env::current_dir()?;
        let config = self.resolve_config(&working_dir).await?;

        match &self.command {
            Commands::Plan(args) => execute::execute_plan(config, args, self.output_mode()).await,
            Commands::Execute(args) => {
                execute::execute_execute(config, args, self.output_mode()).await
            }
        }
    }

    /// Load the configuration and apply flag overrides.
    async fn resolve_config(&self, working_dir: &Path) -> Result<SnapreapConfig> {
        let mut config = SnapreapConfig::discover(self.config.as_deref(), working_dir).await?;
        if let Some(pool) = &self.pool {
            config.pool.clone_from(pool);
        }
        if !self.marker.is_empty() {
            config.marker = MarkerRules {
                any_of: self
                    .marker
                    .iter()
                    .map(|pattern| MarkerRule::Contains(pattern.clone()))
                    .collect(),
            };
        }
        config.validate()?;
        tracing::debug!(?config, "Resolved configuration");
        Ok(config)
    }

    fn output_mode(&self) -> crate::output::OutputMode {
        if self.json {
            crate::output::OutputMode::Json
        } else {
            crate::output::OutputMode::Text
        }
    }
}
