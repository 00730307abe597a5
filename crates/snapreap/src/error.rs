//! Error types for snapreap.
//!
//! Errors are split along the same line the collector draws at runtime:
//!
//! - **`Error`**: fatal conditions that stop a run (unreadable files, bad
//!   configuration, a pool that cannot be listed, a cyclic lineage graph).
//! - **`BackendError`**: failures of a single backend call. During graph
//!   construction these mark the queried node `unknown`; during execution they
//!   abort the remaining operations of one dependency group only.

use crate::domain::NodeKey;
use std::io;
use thiserror::Error;

/// The error type for snapreap operations.
#[derive(Debug, Error)]
pub enum Error {
    /// IO error occurred.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization or parsing failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A checkpoint file is structurally invalid.
    #[error("Invalid checkpoint: {0}")]
    Checkpoint(String),

    /// The lineage graph contains a cycle, which copy-on-write lineage cannot.
    #[error("Lineage graph contains a cycle through {0}")]
    Cycle(NodeKey),

    /// A backend call failed in a context where it cannot be downgraded.
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
}

/// Failure of a single storage backend call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// The addressed volume or snapshot does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// A read-only query (listing) failed.
    #[error("query for {target} failed: {message}")]
    Query {
        /// The volume, snapshot or pool being queried.
        target: String,
        /// Backend-provided failure description.
        message: String,
    },

    /// The backend refused a mutation because one of its protection
    /// invariants would be violated (live snapshots, live clones, protection).
    #[error("{target}: {reason}")]
    Conflict {
        /// The volume or snapshot being mutated.
        target: String,
        /// Why the backend refused.
        reason: String,
    },
}

impl BackendError {
    /// Returns `true` if this is a deletion conflict rather than a lookup failure.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// A specialized Result type for snapreap operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Result type for individual backend calls.
pub type BackendResult<T> = std::result::Result<T, BackendError>;
