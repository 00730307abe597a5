//! Storage backend abstraction.
//!
//! The collector never talks to a cluster directly. Everything it needs from
//! one, enumerating volumes, snapshots and clones, and the handful of
//! mutations a deletion plan is made of, goes through [`StorageBackend`].
//! Graph building, partitioning and classification only ever see the graph the
//! backend's answers were turned into, so they can be tested against fixture
//! graphs without a live cluster.
//!
//! # Architecture
//!
//! The trait is async so that real implementations can issue network calls;
//! the pipeline still awaits them one at a time, in causal order. It is
//! object-safe and used as `Box<dyn StorageBackend>` / `&dyn StorageBackend`.
//!
//! # Backend invariants
//!
//! Implementations are expected to refuse, with [`BackendError::Conflict`],
//! any mutation that would break the lineage:
//!
//! - removing a volume that still has snapshots
//! - removing a snapshot that is protected or still has clones
//!
//! The collector relies on this as a last line of defence: a plan that is
//! ordered wrongly fails at the backend instead of destroying data.
//!
//! [`BackendError::Conflict`]: crate::error::BackendError::Conflict

use crate::domain::{SnapshotInfo, VolumeRef};
use crate::error::BackendResult;
use async_trait::async_trait;

pub mod in_memory;

pub use in_memory::{ClusterState, InMemoryBackend, SnapshotState, VolumeState};

/// Admin interface of a copy-on-write storage cluster.
///
/// # Method Categories
///
/// - **Enumeration**: `list_volumes`, `list_snapshots`, `list_clone_children`
/// - **Mutation**: `unprotect_snapshot`, `delete_snapshot`, `remove_volume`, `flatten`
#[async_trait]
pub trait StorageBackend: Send + Sync {
    // ========== Enumeration ==========

    /// List the names of all volumes in `pool`.
    async fn list_volumes(&self, pool: &str) -> BackendResult<Vec<String>>;

    /// List the snapshots of a volume.
    async fn list_snapshots(&self, volume: &VolumeRef) -> BackendResult<Vec<SnapshotInfo>>;

    /// List the volumes cloned from `volume@snapshot`, in any pool.
    async fn list_clone_children(
        &self,
        volume: &VolumeRef,
        snapshot: &str,
    ) -> BackendResult<Vec<VolumeRef>>;

    // ========== Mutation ==========

    /// Remove the protection flag from a snapshot.
    async fn unprotect_snapshot(&self, volume: &VolumeRef, snapshot: &str) -> BackendResult<()>;

    /// Delete a snapshot.
    ///
    /// # Errors
    ///
    /// `Conflict` if the snapshot is protected or still has clones.
    async fn delete_snapshot(&self, volume: &VolumeRef, snapshot: &str) -> BackendResult<()>;

    /// Remove a volume.
    ///
    /// # Errors
    ///
    /// `Conflict` if the volume still has snapshots.
    async fn remove_volume(&self, volume: &VolumeRef) -> BackendResult<()>;

    /// Copy a clone's parent data into it, detaching it from its parent snapshot.
    ///
    /// # Errors
    ///
    /// `Conflict` if the volume is not a clone.
    async fn flatten(&self, volume: &VolumeRef) -> BackendResult<()>;
}
