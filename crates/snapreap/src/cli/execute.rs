//! Command implementations.

use super::args::{ExecuteArgs, PlanArgs, SourceArgs};
use crate::app::{self, Analysis, App, Lineage};
use crate::config::SnapreapConfig;
use crate::output::{self, OutputMode, PlanView};
use crate::plan::{AlwaysConfirm, Confirm, GroupPlan, PromptConfirm, execute};
use anyhow::{Context, Result};
use std::io;
use std::process::ExitCode;

/// Open the app and obtain the analyzed lineage.
async fn prepare(config: SnapreapConfig, source: &SourceArgs) -> Result<(App, Lineage, Analysis)> {
    let app = App::open(config, source.cluster_state.as_deref())
        .await
        .context("failed to open cluster state")?;
    let lineage = app
        .lineage(source.load.as_deref(), source.save.as_deref())
        .await?;
    let analysis = app::analyze(&lineage.graph)?;
    Ok((app, lineage, analysis))
}

/// Execute the plan command
pub async fn execute_plan(
    config: SnapreapConfig,
    args: &PlanArgs,
    output_mode: OutputMode,
) -> Result<ExitCode> {
    let (_app, lineage, analysis) = prepare(config, &args.source).await?;

    output::print_plan(
        &PlanView {
            analysis: &analysis,
            build_diagnostics: &lineage.diagnostics,
            load_warnings: &lineage.load_warnings,
        },
        output_mode,
    )?;
    Ok(ExitCode::SUCCESS)
}

/// Execute the execute command
pub async fn execute_execute(
    config: SnapreapConfig,
    args: &ExecuteArgs,
    output_mode: OutputMode,
) -> Result<ExitCode> {
    if args.source.cluster_state.is_none() {
        anyhow::bail!("execute needs --cluster-state to apply deletions to");
    }
    let (app, _lineage, analysis) = prepare(config, &args.source).await?;
    let backend = app
        .backend()
        .context("no backend available for execution")?;

    let plans: Vec<GroupPlan> = analysis.plans().cloned().collect();
    tracing::info!(groups = plans.len(), "Executing deletion plans");

    let mut confirm: Box<dyn Confirm> = if args.yes {
        Box::new(AlwaysConfirm)
    } else {
        Box::new(PromptConfirm::new(io::stdin().lock(), io::stderr()))
    };
    let report = execute(backend, &plans, confirm.as_mut()).await;

    app.save_state()
        .await
        .context("failed to write back cluster state")?;
    output::print_report(&report, output_mode)?;

    Ok(if report.any_failed() {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    })
}
