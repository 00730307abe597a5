//! Output formatting for CLI commands.
//!
//! Text output of `plan` is a shell script: every operation is an `rbd`
//! command on its own line and everything else is a `#` comment, so a plan
//! can be reviewed and then piped to a shell. JSON output serializes the same
//! information for programmatic use.
//!
//! Submodules:
//! - [`color`]: Color and styling helpers

pub mod color;

use crate::app::{Analysis, GroupReport};
use crate::graph::{Diagnostic, LoadWarning};
use crate::plan::{ExecutionReport, GroupOutcome};
use serde::Serialize;
use std::env;
use std::io::{self, Write};

pub use color::{error, info, success, warning};

use color::{bold, dimmed};

// ============================================================================
// Output Configuration
// ============================================================================

/// Configuration for output formatting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputConfig {
    /// Whether to use colors in output.
    pub use_colors: bool,
}

impl OutputConfig {
    /// Create a new `OutputConfig` with explicit values.
    #[must_use]
    pub fn new(use_colors: bool) -> Self {
        Self { use_colors }
    }

    /// Create an `OutputConfig` by reading from environment variables.
    ///
    /// Reads:
    /// - `NO_COLOR`: Standard env var to disable colors (any value disables colors)
    /// - `SNAPREAP_COLOR`: Set to "0" or "false" to disable colors (default: true)
    #[must_use]
    pub fn from_env() -> Self {
        // Respect NO_COLOR standard (https://no-color.org/)
        let use_colors = env::var("NO_COLOR").is_err()
            && env::var("SNAPREAP_COLOR")
                .map(|v| v != "0" && !v.eq_ignore_ascii_case("false"))
                .unwrap_or(true);
        Self { use_colors }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { use_colors: true }
    }
}

/// Output format mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-readable text format
    Text,
    /// JSON format for programmatic use
    Json,
}

// ============================================================================
// Public Dispatch Functions
// ============================================================================

/// Everything `plan` reports.
#[derive(Debug, Serialize)]
pub struct PlanView<'a> {
    /// Groups, verdicts and plans.
    #[serde(flatten)]
    pub analysis: &'a Analysis,
    /// Findings from graph construction.
    pub build_diagnostics: &'a [Diagnostic],
    /// Checkpoint lines that were skipped.
    #[serde(serialize_with = "serialize_warnings")]
    pub load_warnings: &'a [LoadWarning],
}

/// Print a plan in the specified format
pub fn print_plan(view: &PlanView<'_>, mode: OutputMode) -> io::Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let config = OutputConfig::from_env();

    match mode {
        OutputMode::Text => write_plan_text(&mut handle, view, &config),
        OutputMode::Json => write_json(&mut handle, view),
    }
}

/// Print an execution report in the specified format
pub fn print_report(report: &ExecutionReport, mode: OutputMode) -> io::Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let config = OutputConfig::from_env();

    match mode {
        OutputMode::Text => write_report_text(&mut handle, report, &config),
        OutputMode::Json => write_json(&mut handle, report),
    }
}

fn write_json<W: Write, T: Serialize + ?Sized>(w: &mut W, value: &T) -> io::Result<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(w, "{json}")
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn serialize_warnings<S>(warnings: &&[LoadWarning], serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.collect_seq(warnings.iter().map(ToString::to_string))
}

// ============================================================================
// Text Formatting
// ============================================================================

fn write_plan_text<W: Write>(
    w: &mut W,
    view: &PlanView<'_>,
    config: &OutputConfig,
) -> io::Result<()> {
    let analysis = view.analysis;

    for warning in view.load_warnings {
        writeln!(w, "{}", color::warning(&format!("# warning: {warning}"), config))?;
    }
    for diagnostic in view.build_diagnostics.iter().chain(&analysis.diagnostics) {
        writeln!(w, "{}", color::warning(&format!("# warning: {diagnostic}"), config))?;
    }

    if analysis.groups.is_empty() {
        writeln!(w, "# No candidate volumes in pool {}.", analysis.pool)?;
        return Ok(());
    }

    for group in &analysis.groups {
        writeln!(w)?;
        write_group_text(w, group, config)?;
    }

    writeln!(w)?;
    writeln!(
        w,
        "{}",
        dimmed(
            &format!(
                "# {} of {} group(s) eligible in pool {}",
                analysis.eligible_count(),
                analysis.groups.len(),
                analysis.pool
            ),
            config
        )
    )?;
    Ok(())
}

fn write_group_text<W: Write>(
    w: &mut W,
    group: &GroupReport,
    config: &OutputConfig,
) -> io::Result<()> {
    let members = group
        .members
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");

    match (&group.plan, &group.reason) {
        (Some(plan), _) => {
            writeln!(
                w,
                "{} {}",
                bold("# group", config),
                info(&group.root.to_string(), config)
            )?;
            writeln!(w, "{}", dimmed(&format!("#   members: {members}"), config))?;
            for operation in &plan.operations {
                writeln!(w, "{operation}")?;
            }
        }
        (None, reason) => {
            let reason = reason
                .as_ref()
                .map_or_else(|| "not eligible".to_string(), ToString::to_string);
            writeln!(
                w,
                "{} {} {}",
                bold("# group", config),
                info(&group.root.to_string(), config),
                warning(&format!("skipped: {reason}"), config)
            )?;
            writeln!(w, "{}", dimmed(&format!("#   members: {members}"), config))?;
        }
    }
    Ok(())
}

fn write_report_text<W: Write>(
    w: &mut W,
    report: &ExecutionReport,
    config: &OutputConfig,
) -> io::Result<()> {
    if report.results.is_empty() {
        writeln!(w, "Nothing to delete.")?;
        return Ok(());
    }

    for result in &report.results {
        let root = info(&result.root.to_string(), config);
        match &result.outcome {
            GroupOutcome::Completed { operations } => {
                writeln!(
                    w,
                    "{} {root}: {operations} operation(s)",
                    success("deleted", config)
                )?;
            }
            GroupOutcome::Skipped { declined } => {
                writeln!(
                    w,
                    "{} {root}: confirmation declined for {declined}",
                    warning("skipped", config)
                )?;
            }
            GroupOutcome::Failed {
                operation,
                error: message,
                completed,
            } => {
                writeln!(
                    w,
                    "{} {root}: `{operation}` failed after {completed} operation(s): {message}",
                    error("failed", config)
                )?;
            }
        }
    }

    writeln!(w)?;
    writeln!(
        w,
        "{}",
        dimmed(
            &format!(
                "{} deleted, {} skipped, {} failed",
                report.completed(),
                report.skipped(),
                report.failed()
            ),
            config
        )
    )?;
    Ok(())
}
