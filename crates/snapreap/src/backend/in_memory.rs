//! In-memory storage backend.
//!
//! Simulates a cluster from a [`ClusterState`] description. It is used by the
//! test suite and by the CLI's `--cluster-state` mode, which lets an operator
//! rehearse a plan against an exported description of a pool before running it
//! for real.
//!
//! The simulation enforces the backend invariants documented on
//! [`StorageBackend`], and supports failure injection:
//!
//! - volumes or snapshots flagged `unreadable` fail their enumeration calls
//! - [`InMemoryBackend::reject_mutations_on`] makes every mutation of a target fail
//!
//! # Thread Safety
//!
//! State lives behind `Arc<tokio::sync::Mutex<..>>`; clones of the backend
//! share it, which is how tests keep a handle for inspection while the
//! pipeline owns another.

use super::StorageBackend;
use crate::domain::{SnapshotInfo, VolumeRef};
use crate::error::{BackendError, BackendResult, Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Serializable description of a cluster's volumes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterState {
    /// All volumes, in any pool.
    #[serde(default)]
    pub volumes: Vec<VolumeState>,
}

/// One volume of a [`ClusterState`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeState {
    /// Pool the volume lives in.
    pub pool: String,
    /// Volume name.
    pub name: String,
    /// Listing this volume's snapshots fails.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub unreadable: bool,
    /// Snapshots of the volume.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub snapshots: Vec<SnapshotState>,
}

/// One snapshot of a [`VolumeState`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotState {
    /// Snapshot name.
    pub name: String,
    /// Whether the snapshot is protected.
    #[serde(default)]
    pub protected: bool,
    /// Listing this snapshot's clones fails.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub unreadable: bool,
    /// Volumes cloned from this snapshot.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<VolumeRef>,
}

impl ClusterState {
    /// Load a cluster state from a YAML (or JSON) file.
    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        serde_yaml::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    /// Save the cluster state atomically (temp file, then rename).
    ///
    /// Files with a `.json` extension are written as JSON, everything else as YAML.
    pub async fn save(&self, path: &Path) -> Result<()> {
        let content = if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::to_string_pretty(self)?
        } else {
            serde_yaml::to_string(self).map_err(|e| Error::Config(format!("YAML error: {e}")))?
        };
        let temp_path = path.with_extension("tmp");
        tokio::fs::write(&temp_path, content).await?;
        tokio::fs::rename(&temp_path, path).await?;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct SnapshotEntry {
    protected: bool,
    unreadable: bool,
    children: BTreeSet<VolumeRef>,
}

#[derive(Debug, Default)]
struct VolumeEntry {
    unreadable: bool,
    snapshots: BTreeMap<String, SnapshotEntry>,
}

#[derive(Debug, Default)]
struct Cluster {
    volumes: BTreeMap<VolumeRef, VolumeEntry>,
    rejected: HashSet<String>,
    journal: Vec<String>,
}

impl Cluster {
    fn volume(&self, volume: &VolumeRef) -> BackendResult<&VolumeEntry> {
        self.volumes
            .get(volume)
            .ok_or_else(|| BackendError::NotFound(volume.to_string()))
    }

    fn volume_mut(&mut self, volume: &VolumeRef) -> BackendResult<&mut VolumeEntry> {
        self.volumes
            .get_mut(volume)
            .ok_or_else(|| BackendError::NotFound(volume.to_string()))
    }

    fn snapshot_mut(
        &mut self,
        volume: &VolumeRef,
        snapshot: &str,
    ) -> BackendResult<&mut SnapshotEntry> {
        self.volume_mut(volume)?
            .snapshots
            .get_mut(snapshot)
            .ok_or_else(|| BackendError::NotFound(format!("{volume}@{snapshot}")))
    }

    fn check_rejected(&self, target: &str) -> BackendResult<()> {
        if self.rejected.contains(target) {
            return Err(BackendError::Conflict {
                target: target.to_string(),
                reason: "operation rejected by backend".to_string(),
            });
        }
        Ok(())
    }

    /// Detach `child` from whichever snapshot it was cloned from.
    ///
    /// Returns `false` if the volume had no parent.
    fn detach(&mut self, child: &VolumeRef) -> bool {
        let mut detached = false;
        for entry in self.volumes.values_mut() {
            for snap in entry.snapshots.values_mut() {
                detached |= snap.children.remove(child);
            }
        }
        detached
    }
}

/// Thread-safe simulated cluster implementing [`StorageBackend`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryBackend {
    inner: Arc<Mutex<Cluster>>,
}

impl InMemoryBackend {
    /// Create an empty cluster.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cluster from a state description.
    #[must_use]
    pub fn from_state(state: ClusterState) -> Self {
        let mut cluster = Cluster::default();
        for volume in state.volumes {
            let snapshots = volume
                .snapshots
                .into_iter()
                .map(|snap| {
                    let entry = SnapshotEntry {
                        protected: snap.protected,
                        unreadable: snap.unreadable,
                        children: snap.children.into_iter().collect(),
                    };
                    (snap.name, entry)
                })
                .collect();
            cluster.volumes.insert(
                VolumeRef::new(volume.pool, volume.name),
                VolumeEntry {
                    unreadable: volume.unreadable,
                    snapshots,
                },
            );
        }
        Self {
            inner: Arc::new(Mutex::new(cluster)),
        }
    }

    /// Load a cluster from a state file.
    pub async fn load(path: &Path) -> Result<Self> {
        Ok(Self::from_state(ClusterState::load(path).await?))
    }

    /// Export the current state.
    pub async fn state(&self) -> ClusterState {
        let cluster = self.inner.lock().await;
        let volumes = cluster
            .volumes
            .iter()
            .map(|(volume, entry)| VolumeState {
                pool: volume.pool.clone(),
                name: volume.name.clone(),
                unreadable: entry.unreadable,
                snapshots: entry
                    .snapshots
                    .iter()
                    .map(|(name, snap)| SnapshotState {
                        name: name.clone(),
                        protected: snap.protected,
                        unreadable: snap.unreadable,
                        children: snap.children.iter().cloned().collect(),
                    })
                    .collect(),
            })
            .collect();
        ClusterState { volumes }
    }

    /// Make every mutation of `target` fail with a conflict.
    ///
    /// Targets are written `pool/volume` or `pool/volume@snapshot`.
    pub async fn reject_mutations_on(&self, target: impl Into<String>) {
        self.inner.lock().await.rejected.insert(target.into());
    }

    /// Returns `true` if the volume exists.
    pub async fn contains_volume(&self, volume: &VolumeRef) -> bool {
        self.inner.lock().await.volumes.contains_key(volume)
    }

    /// Returns `true` if the snapshot exists.
    pub async fn contains_snapshot(&self, volume: &VolumeRef, snapshot: &str) -> bool {
        self.inner
            .lock()
            .await
            .volumes
            .get(volume)
            .is_some_and(|entry| entry.snapshots.contains_key(snapshot))
    }

    /// Successful mutations so far, in order, as `rbd`-style command lines.
    pub async fn journal(&self) -> Vec<String> {
        self.inner.lock().await.journal.clone()
    }
}

#[async_trait]
impl StorageBackend for InMemoryBackend {
    async fn list_volumes(&self, pool: &str) -> BackendResult<Vec<String>> {
        let cluster = self.inner.lock().await;
        Ok(cluster
            .volumes
            .keys()
            .filter(|volume| volume.pool == pool)
            .map(|volume| volume.name.clone())
            .collect())
    }

    async fn list_snapshots(&self, volume: &VolumeRef) -> BackendResult<Vec<SnapshotInfo>> {
        let cluster = self.inner.lock().await;
        let entry = cluster.volume(volume)?;
        if entry.unreadable {
            return Err(BackendError::Query {
                target: volume.to_string(),
                message: "failed to open image".to_string(),
            });
        }
        Ok(entry
            .snapshots
            .iter()
            .map(|(name, snap)| SnapshotInfo {
                name: name.clone(),
                protected: snap.protected,
            })
            .collect())
    }

    async fn list_clone_children(
        &self,
        volume: &VolumeRef,
        snapshot: &str,
    ) -> BackendResult<Vec<VolumeRef>> {
        let cluster = self.inner.lock().await;
        let snap = cluster
            .volume(volume)?
            .snapshots
            .get(snapshot)
            .ok_or_else(|| BackendError::NotFound(format!("{volume}@{snapshot}")))?;
        if snap.unreadable {
            return Err(BackendError::Query {
                target: format!("{volume}@{snapshot}"),
                message: "failed to list children".to_string(),
            });
        }
        Ok(snap.children.iter().cloned().collect())
    }

    async fn unprotect_snapshot(&self, volume: &VolumeRef, snapshot: &str) -> BackendResult<()> {
        let mut cluster = self.inner.lock().await;
        cluster.check_rejected(&format!("{volume}@{snapshot}"))?;
        cluster.snapshot_mut(volume, snapshot)?.protected = false;
        cluster.journal.push(format!(
            "rbd -p {} snap unprotect {}@{snapshot}",
            volume.pool, volume.name
        ));
        Ok(())
    }

    async fn delete_snapshot(&self, volume: &VolumeRef, snapshot: &str) -> BackendResult<()> {
        let mut cluster = self.inner.lock().await;
        let target = format!("{volume}@{snapshot}");
        cluster.check_rejected(&target)?;

        let snap = cluster.snapshot_mut(volume, snapshot)?;
        if snap.protected {
            return Err(BackendError::Conflict {
                target,
                reason: "snapshot is protected".to_string(),
            });
        }
        if !snap.children.is_empty() {
            return Err(BackendError::Conflict {
                target,
                reason: format!("snapshot has {} live clone(s)", snap.children.len()),
            });
        }

        cluster.volume_mut(volume)?.snapshots.remove(snapshot);
        cluster.journal.push(format!(
            "rbd -p {} snap rm {}@{snapshot}",
            volume.pool, volume.name
        ));
        Ok(())
    }

    async fn remove_volume(&self, volume: &VolumeRef) -> BackendResult<()> {
        let mut cluster = self.inner.lock().await;
        cluster.check_rejected(&volume.to_string())?;

        let entry = cluster.volume(volume)?;
        if !entry.snapshots.is_empty() {
            return Err(BackendError::Conflict {
                target: volume.to_string(),
                reason: format!("volume has {} snapshot(s)", entry.snapshots.len()),
            });
        }

        cluster.volumes.remove(volume);
        cluster.detach(volume);
        cluster
            .journal
            .push(format!("rbd -p {} rm {}", volume.pool, volume.name));
        Ok(())
    }

    async fn flatten(&self, volume: &VolumeRef) -> BackendResult<()> {
        let mut cluster = self.inner.lock().await;
        cluster.check_rejected(&volume.to_string())?;
        cluster.volume(volume)?;

        if !cluster.detach(volume) {
            return Err(BackendError::Conflict {
                target: volume.to_string(),
                reason: "volume is not a clone".to_string(),
            });
        }
        cluster
            .journal
            .push(format!("rbd -p {} flatten {}", volume.pool, volume.name));
        Ok(())
    }
}
