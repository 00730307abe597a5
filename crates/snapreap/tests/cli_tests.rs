//! Integration tests for the snapreap CLI.
//!
//! These tests drive the built binary against cluster-state files in a
//! temporary directory.

use rstest::{fixture, rstest};
use snapreap::backend::ClusterState;
use std::path::Path;
use tempfile::TempDir;

mod common;
use common::{ClusterBuilder, run_snapreap_in_dir};

// ============================================================================
// Test Fixtures
// ============================================================================

/// A temporary directory holding `cluster.yaml`:
/// an image with a soft-deleted clone chain, a kept image and a block volume.
#[fixture]
fn cluster_dir() -> TempDir {
    let temp = TempDir::new().expect("Failed to create temp directory");
    let state = ClusterBuilder::new()
        .snapshot("images", "img_to_be_deleted", "snap_to_be_deleted")
        .clone_into(
            ("images", "img_to_be_deleted", "snap_to_be_deleted"),
            ("images", "clone_to_be_deleted"),
        )
        .volume("images", "kept")
        .volume("images", "volume-1234_to_be_deleted")
        .build();
    write_state(temp.path(), &state);
    temp
}

fn write_state(dir: &Path, state: &ClusterState) {
    std::fs::write(
        dir.join("cluster.yaml"),
        serde_yaml::to_string(state).unwrap(),
    )
    .unwrap();
}

fn read_state(dir: &Path) -> ClusterState {
    serde_yaml::from_str(&std::fs::read_to_string(dir.join("cluster.yaml")).unwrap()).unwrap()
}

fn stdout(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn commands(text: &str) -> Vec<&str> {
    text.lines()
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .collect()
}

const EXPECTED: [&str; 4] = [
    "rbd -p images snap unprotect img_to_be_deleted@snap_to_be_deleted",
    "rbd -p images rm clone_to_be_deleted",
    "rbd -p images snap rm img_to_be_deleted@snap_to_be_deleted",
    "rbd -p images rm img_to_be_deleted",
];

// ============================================================================
// Help and Version Tests
// ============================================================================

#[test]
fn test_cli_help() {
    let temp = TempDir::new().unwrap();
    let output = run_snapreap_in_dir(temp.path(), &["--help"]);

    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("Usage:"));
    assert!(text.contains("plan"));
    assert!(text.contains("execute"));
}

#[test]
fn test_cli_version() {
    let temp = TempDir::new().unwrap();
    let output = run_snapreap_in_dir(temp.path(), &["--version"]);

    assert!(output.status.success());
    assert!(stdout(&output).contains(env!("CARGO_PKG_VERSION")));
}

// ============================================================================
// Plan Tests
// ============================================================================

#[rstest]
fn test_plan_prints_ordered_commands(cluster_dir: TempDir) {
    let output = run_snapreap_in_dir(
        cluster_dir.path(),
        &["plan", "--cluster-state", "cluster.yaml", "--pool", "images"],
    );

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let text = stdout(&output);
    assert_eq!(commands(&text), EXPECTED);
    assert!(text.contains("# group kept skipped: kept is not marked for deletion"));
    assert!(!text.contains("volume-1234"));

    // Planning never mutates.
    assert_eq!(read_state(cluster_dir.path()).volumes.len(), 4);
}

#[rstest]
fn test_plan_uses_config_file(cluster_dir: TempDir) {
    std::fs::write(
        cluster_dir.path().join("snapreap.yaml"),
        "pool: images\ncandidates:\n  exclude_prefixes: []\n  exclude_suffixes: []\n",
    )
    .unwrap();

    let output = run_snapreap_in_dir(
        cluster_dir.path(),
        &["plan", "--cluster-state", "cluster.yaml"],
    );

    assert!(output.status.success());
    let text = stdout(&output);
    assert!(commands(&text).contains(&"rbd -p images rm volume-1234_to_be_deleted"));
}

#[rstest]
fn test_plan_marker_override(cluster_dir: TempDir) {
    let output = run_snapreap_in_dir(
        cluster_dir.path(),
        &[
            "plan",
            "--cluster-state",
            "cluster.yaml",
            "--pool",
            "images",
            "--marker",
            "kept",
        ],
    );

    assert!(output.status.success());
    assert_eq!(commands(&stdout(&output)), vec!["rbd -p images rm kept"]);
}

#[rstest]
fn test_plan_json(cluster_dir: TempDir) {
    let output = run_snapreap_in_dir(
        cluster_dir.path(),
        &[
            "plan",
            "--cluster-state",
            "cluster.yaml",
            "--pool",
            "images",
            "--json",
        ],
    );

    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["pool"], "images");
    let groups = json["groups"].as_array().unwrap();
    assert_eq!(groups.len(), 2);
    let eligible: Vec<_> = groups.iter().filter(|g| g["eligible"] == true).collect();
    assert_eq!(eligible.len(), 1);
    assert_eq!(eligible[0]["plan"]["operations"].as_array().unwrap().len(), 4);
}

#[rstest]
fn test_plan_save_then_load(cluster_dir: TempDir) {
    let dir = cluster_dir.path();
    let built = run_snapreap_in_dir(
        dir,
        &[
            "plan",
            "--cluster-state",
            "cluster.yaml",
            "--pool",
            "images",
            "--save",
            "graph.jsonl",
        ],
    );
    assert!(built.status.success());
    assert!(dir.join("graph.jsonl").exists());

    // No cluster state needed when planning from a checkpoint.
    std::fs::remove_file(dir.join("cluster.yaml")).unwrap();
    let loaded = run_snapreap_in_dir(dir, &["plan", "--pool", "images", "--load", "graph.jsonl"]);

    assert!(loaded.status.success());
    assert_eq!(commands(&stdout(&loaded)), commands(&stdout(&built)));
}

// ============================================================================
// Execute Tests
// ============================================================================

#[rstest]
fn test_execute_with_yes_deletes_and_writes_back(cluster_dir: TempDir) {
    let output = run_snapreap_in_dir(
        cluster_dir.path(),
        &[
            "execute",
            "--cluster-state",
            "cluster.yaml",
            "--pool",
            "images",
            "--yes",
        ],
    );

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(stdout(&output).contains("1 deleted, 0 skipped, 0 failed"));

    let names: Vec<String> = read_state(cluster_dir.path())
        .volumes
        .into_iter()
        .map(|volume| volume.name)
        .collect();
    assert_eq!(names, vec!["kept", "volume-1234_to_be_deleted"]);
}

#[rstest]
fn test_execute_exits_one_when_a_group_fails(cluster_dir: TempDir) {
    let dir = cluster_dir.path();
    let planned = run_snapreap_in_dir(
        dir,
        &[
            "plan",
            "--cluster-state",
            "cluster.yaml",
            "--pool",
            "images",
            "--marker",
            "to_be_deleted",
            "--marker",
            "kept",
            "--save",
            "graph.jsonl",
        ],
    );
    assert!(planned.status.success());

    // The clone disappears behind the checkpoint's back.
    let state = ClusterBuilder::new()
        .snapshot("images", "img_to_be_deleted", "snap_to_be_deleted")
        .volume("images", "kept")
        .volume("images", "volume-1234_to_be_deleted")
        .build();
    write_state(dir, &state);

    let output = run_snapreap_in_dir(
        dir,
        &[
            "execute",
            "--cluster-state",
            "cluster.yaml",
            "--load",
            "graph.jsonl",
            "--pool",
            "images",
            "--yes",
        ],
    );

    assert_eq!(
        output.status.code(),
        Some(1),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let text = stdout(&output);
    assert!(text.contains("1 deleted, 0 skipped, 1 failed"));
    assert!(text.contains("`rbd -p images rm clone_to_be_deleted` failed after 1 operation(s)"));

    // The other group still ran, and the failed one stopped where it failed.
    let names: Vec<String> = read_state(dir)
        .volumes
        .into_iter()
        .map(|volume| volume.name)
        .collect();
    assert_eq!(names, vec!["img_to_be_deleted", "volume-1234_to_be_deleted"]);
}

#[rstest]
fn test_execute_declined_by_empty_stdin(cluster_dir: TempDir) {
    // The child gets no stdin: every prompt reads end of input, which declines.
    let output = run_snapreap_in_dir(
        cluster_dir.path(),
        &["execute", "--cluster-state", "cluster.yaml", "--pool", "images"],
    );

    assert!(output.status.success());
    assert!(stdout(&output).contains("0 deleted, 1 skipped, 0 failed"));
    assert!(String::from_utf8_lossy(&output.stderr).contains("[y/N]"));
    assert_eq!(read_state(cluster_dir.path()).volumes.len(), 4);
}

#[rstest]
fn test_execute_requires_cluster_state(cluster_dir: TempDir) {
    let output = run_snapreap_in_dir(cluster_dir.path(), &["execute", "--yes"]);

    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("--cluster-state"));
}

#[test]
fn test_missing_cluster_state_file_is_fatal() {
    let temp = TempDir::new().unwrap();
    let output = run_snapreap_in_dir(temp.path(), &["plan", "--cluster-state", "nope.yaml"]);

    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("error"));
}
