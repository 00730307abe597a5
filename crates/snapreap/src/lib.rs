//! Snapreap - a dependency-aware garbage collector for copy-on-write storage.
//!
//! Upstream services soft-delete volumes and snapshots they can no longer
//! remove because clones still depend on them. Snapreap finds those leftovers
//! and removes them safely:
//!
//! 1. [`graph::GraphBuilder`] turns backend enumeration into a lineage graph
//! 2. [`graph::partition`] splits the graph into dependency groups
//! 3. [`classify`] keeps only groups that are deletable as a whole
//! 4. [`plan`] orders each group's deletions and executes them
//!
//! The storage cluster is only ever reached through the
//! [`backend::StorageBackend`] trait.

#![forbid(unsafe_code)]

// Public modules for library usage
pub mod backend;
pub mod classify;
pub mod config;
pub mod domain;
pub mod error;
pub mod graph;
pub mod marker;
pub mod plan;

// Orchestration and CLI (needed by binary)
pub mod app;
pub mod cli;
pub mod output;
