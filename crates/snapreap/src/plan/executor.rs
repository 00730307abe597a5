//! Plan execution.
//!
//! Groups run one after another in partition order. Before a group is
//! touched, each of its volumes is put to the [`Confirm`] port; a single "no"
//! skips the whole group. Operations then run strictly in plan order, and the
//! first failure abandons the rest of that group only. Because every group is
//! closed under dependency, an abandoned group never leaves another group
//! half-deletable, and re-running the collector picks up where it stopped.

use super::{GroupPlan, Operation};
use crate::backend::StorageBackend;
use crate::domain::{NodeKey, VolumeRef};
use serde::Serialize;
use std::io::{BufRead, Write};

/// Asks whether a volume, and the group it anchors, may be deleted.
pub trait Confirm {
    /// Returns `true` to allow deleting `volume`.
    fn confirm(&mut self, volume: &VolumeRef) -> bool;
}

/// Confirms everything (`--yes`).
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysConfirm;

impl Confirm for AlwaysConfirm {
    fn confirm(&mut self, _volume: &VolumeRef) -> bool {
        true
    }
}

/// Declines everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysDeny;

impl Confirm for AlwaysDeny {
    fn confirm(&mut self, _volume: &VolumeRef) -> bool {
        false
    }
}

/// Interactive `[y/N]` prompt. Only `y` and `yes` (any case) confirm; an
/// empty answer, end of input or an I/O error declines.
#[derive(Debug)]
pub struct PromptConfirm<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> PromptConfirm<R, W> {
    /// Prompt on `output`, read answers from `input`.
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl<R: BufRead, W: Write> Confirm for PromptConfirm<R, W> {
    fn confirm(&mut self, volume: &VolumeRef) -> bool {
        if let Err(e) = write!(self.output, "Delete volume '{volume}'? [y/N]: ")
            .and_then(|()| self.output.flush())
        {
            tracing::warn!(error = %e, "Could not write confirmation prompt");
            return false;
        }

        let mut answer = String::new();
        match self.input.read_line(&mut answer) {
            Ok(_) => {
                let answer = answer.trim().to_lowercase();
                answer == "y" || answer == "yes"
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not read confirmation");
                false
            }
        }
    }
}

/// How one group's execution ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum GroupOutcome {
    /// Every operation succeeded.
    Completed {
        /// Number of operations performed.
        operations: usize,
    },

    /// Confirmation was declined; nothing was touched.
    Skipped {
        /// The volume whose confirmation was declined.
        declined: VolumeRef,
    },

    /// An operation failed; the rest of the group was abandoned.
    Failed {
        /// The failing operation.
        operation: Operation,
        /// Backend error message.
        error: String,
        /// Operations that succeeded before the failure.
        completed: usize,
    },
}

/// Outcome of one group, keyed by its root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupResult {
    /// Root of the group.
    pub root: NodeKey,
    /// What happened.
    #[serde(flatten)]
    pub outcome: GroupOutcome,
}

/// Per-group outcomes of an execution run, in execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionReport {
    /// One entry per plan.
    pub results: Vec<GroupResult>,
}

impl ExecutionReport {
    /// Number of groups that completed.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.count(|outcome| matches!(outcome, GroupOutcome::Completed { .. }))
    }

    /// Number of groups skipped by confirmation.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.count(|outcome| matches!(outcome, GroupOutcome::Skipped { .. }))
    }

    /// Number of groups that failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.count(|outcome| matches!(outcome, GroupOutcome::Failed { .. }))
    }

    /// Returns `true` if any group failed.
    #[must_use]
    pub fn any_failed(&self) -> bool {
        self.failed() > 0
    }

    fn count(&self, predicate: impl Fn(&GroupOutcome) -> bool) -> usize {
        self.results
            .iter()
            .filter(|result| predicate(&result.outcome))
            .count()
    }
}

/// Run `plans` against `backend`.
///
/// Backend failures never escape: each is recorded in the report and only
/// ends its own group.
pub async fn execute(
    backend: &dyn StorageBackend,
    plans: &[GroupPlan],
    confirm: &mut dyn Confirm,
) -> ExecutionReport {
    let mut report = ExecutionReport::default();
    for plan in plans {
        let outcome = execute_group(backend, plan, confirm).await;
        report.results.push(GroupResult {
            root: plan.root.clone(),
            outcome,
        });
    }

    tracing::info!(
        completed = report.completed(),
        skipped = report.skipped(),
        failed = report.failed(),
        "Execution finished"
    );
    report
}

async fn execute_group(
    backend: &dyn StorageBackend,
    plan: &GroupPlan,
    confirm: &mut dyn Confirm,
) -> GroupOutcome {
    if let Some(declined) = plan.volumes.iter().find(|volume| !confirm.confirm(volume)) {
        tracing::info!(root = %plan.root, volume = %declined, "Confirmation declined, skipping group");
        return GroupOutcome::Skipped {
            declined: declined.clone(),
        };
    }

    for (done, operation) in plan.operations.iter().enumerate() {
        tracing::debug!(%operation, "Running");
        if let Err(e) = operation.apply(backend).await {
            tracing::warn!(
                root = %plan.root,
                %operation,
                error = %e,
                conflict = e.is_conflict(),
                "Operation failed, abandoning group"
            );
            return GroupOutcome::Failed {
                operation: operation.clone(),
                error: e.to_string(),
                completed: done,
            };
        }
    }

    tracing::info!(root = %plan.root, operations = plan.operations.len(), "Group deleted");
    GroupOutcome::Completed {
        operations: plan.operations.len(),
    }
}
