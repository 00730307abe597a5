//! Executor behavior: failure isolation, confirmation and convergence.

use snapreap::backend::InMemoryBackend;
use snapreap::domain::{NodeKey, VolumeRef};
use snapreap::plan::{AlwaysConfirm, AlwaysDeny, GroupOutcome, GroupPlan, PromptConfirm, execute};
use std::io::Cursor;

mod common;
use common::{ClusterBuilder, build_and_analyze, v_s1_w};

const DELETABLE: &[&str] = &["V", "V@s1", "W", "lone"];

/// `V@s1 -> W` plus an unrelated volume `lone`, all deletable.
fn two_groups() -> InMemoryBackend {
    v_s1_w("rbd").volume("rbd", "lone").backend()
}

async fn plans_for(backend: &InMemoryBackend) -> Vec<GroupPlan> {
    let (_, analysis) = build_and_analyze(backend, DELETABLE).await;
    analysis.plans().cloned().collect()
}

fn outcome_of<'a>(
    report: &'a snapreap::plan::ExecutionReport,
    root: &str,
) -> &'a GroupOutcome {
    &report
        .results
        .iter()
        .find(|result| result.root == NodeKey::volume(root))
        .unwrap()
        .outcome
}

#[tokio::test]
async fn conflict_aborts_only_its_group() {
    let backend = two_groups();
    backend.reject_mutations_on("rbd/W").await;
    let plans = plans_for(&backend).await;
    assert_eq!(plans.len(), 2);

    let report = execute(&backend, &plans, &mut AlwaysConfirm).await;

    assert!(report.any_failed());
    assert_eq!(report.failed(), 1);
    assert_eq!(report.completed(), 1);
    match outcome_of(&report, "V") {
        GroupOutcome::Failed {
            operation,
            error,
            completed,
        } => {
            assert_eq!(operation.to_string(), "rbd -p rbd rm W");
            assert!(error.contains("rejected"));
            assert_eq!(*completed, 1);
        }
        other => panic!("expected failure, got {other:?}"),
    }

    // The failed group stopped right after unprotecting its snapshot.
    let v = VolumeRef::new("rbd", "V");
    assert!(backend.contains_volume(&v).await);
    assert!(backend.contains_snapshot(&v, "s1").await);
    assert!(backend.contains_volume(&VolumeRef::new("rbd", "W")).await);
    assert!(!backend.contains_volume(&VolumeRef::new("rbd", "lone")).await);
}

#[tokio::test]
async fn backend_invariant_violation_is_reported_as_failure() {
    // A plan that tries to remove a snapshot before its clone.
    let backend = v_s1_w("rbd").backend();
    let volume = VolumeRef::new("rbd", "V");
    let plan = GroupPlan {
        root: NodeKey::volume("V"),
        volumes: vec![volume.clone()],
        operations: vec![
            snapreap::plan::Operation::Unprotect {
                volume: volume.clone(),
                snapshot: "s1".to_string(),
            },
            snapreap::plan::Operation::RemoveSnapshot {
                volume: volume.clone(),
                snapshot: "s1".to_string(),
            },
            snapreap::plan::Operation::RemoveVolume { volume },
        ],
    };

    let report = execute(&backend, &[plan], &mut AlwaysConfirm).await;

    match &report.results[0].outcome {
        GroupOutcome::Failed {
            error, completed, ..
        } => {
            assert!(error.contains("live clone"));
            assert_eq!(*completed, 1);
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(backend.contains_snapshot(&VolumeRef::new("rbd", "V"), "s1").await);
}

#[tokio::test]
async fn declining_skips_every_group_untouched() {
    let backend = two_groups();
    let plans = plans_for(&backend).await;

    let report = execute(&backend, &plans, &mut AlwaysDeny).await;

    assert_eq!(report.skipped(), 2);
    assert!(!report.any_failed());
    assert!(backend.journal().await.is_empty());
}

#[tokio::test]
async fn one_declined_volume_skips_its_whole_group() {
    let backend = v_s1_w("rbd").backend();
    let plans = plans_for(&backend).await;
    assert_eq!(
        plans[0].volumes,
        vec![VolumeRef::new("rbd", "V"), VolumeRef::new("rbd", "W")]
    );

    // Yes for V, no for W.
    let mut prompt = PromptConfirm::new(Cursor::new("y\nn\n".as_bytes()), Vec::new());
    let report = execute(&backend, &plans, &mut prompt).await;

    assert_eq!(
        report.results[0].outcome,
        GroupOutcome::Skipped {
            declined: VolumeRef::new("rbd", "W")
        }
    );
    assert!(backend.journal().await.is_empty());
}

#[tokio::test]
async fn rerun_after_partial_failure_converges() {
    let backend = two_groups();
    backend.reject_mutations_on("rbd/V").await;
    let report = execute(&backend, &plans_for(&backend).await, &mut AlwaysConfirm).await;
    assert_eq!(report.failed(), 1);

    // Only V is left. A fresh run (without the injected fault) removes it.
    let rerun = InMemoryBackend::from_state(backend.state().await);
    let plans = plans_for(&rerun).await;
    assert_eq!(plans.len(), 1);
    assert_eq!(plans[0].root, NodeKey::volume("V"));

    let report = execute(&rerun, &plans, &mut AlwaysConfirm).await;
    assert_eq!(report.completed(), 1);
    assert!(rerun.state().await.volumes.is_empty());
}

#[tokio::test]
async fn rerun_after_interrupted_group_replans_remaining_nodes() {
    // The group stops after unprotecting V@s1: removing W is refused.
    let backend = ClusterBuilder::new()
        .snapshot("rbd", "V", "s1")
        .clone_into(("rbd", "V", "s1"), ("rbd", "W"))
        .backend();
    backend.reject_mutations_on("rbd/W").await;
    let first = execute(&backend, &plans_for(&backend).await, &mut AlwaysConfirm).await;
    assert!(first.any_failed());

    let state = backend.state().await;
    let v = state.volumes.iter().find(|volume| volume.name == "V").unwrap();
    assert!(!v.snapshots[0].protected);

    // Unprotecting an unprotected snapshot is harmless, so the same plan runs again.
    let rerun = InMemoryBackend::from_state(state);
    let plans = plans_for(&rerun).await;
    let rendered: Vec<String> = plans[0].operations.iter().map(ToString::to_string).collect();
    assert_eq!(
        rendered,
        vec![
            "rbd -p rbd snap unprotect V@s1",
            "rbd -p rbd rm W",
            "rbd -p rbd snap rm V@s1",
            "rbd -p rbd rm V",
        ]
    );

    let report = execute(&rerun, &plans, &mut AlwaysConfirm).await;
    assert_eq!(report.completed(), 1);
    assert!(rerun.state().await.volumes.is_empty());
}
