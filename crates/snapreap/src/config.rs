//! Configuration management for snapreap.
//!
//! Configuration lives in a YAML file (`snapreap.yaml` by default). Every field
//! has a default reproducing the conventions of an OpenStack-on-Ceph
//! deployment, so running without a file is valid; CLI flags override the file.
//!
//! ```yaml
//! pool: cinder
//! marker:
//!   any_of:
//!     - contains: to_be_deleted
//! candidates:
//!   exclude_prefixes: ["volume-"]
//!   exclude_suffixes: ["_disk"]
//! ```

use crate::error::{Error, Result};
use crate::marker::MarkerRules;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "snapreap.yaml";

/// Pool scanned when none is configured.
pub const DEFAULT_POOL: &str = "cinder";

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapreapConfig {
    /// Pool under scan.
    pub pool: String,

    /// Soft-delete marker rules.
    pub marker: MarkerRules,

    /// Which volumes of the pool are candidates for graph construction.
    pub candidates: CandidateFilter,
}

impl Default for SnapreapConfig {
    fn default() -> Self {
        Self {
            pool: DEFAULT_POOL.to_string(),
            marker: MarkerRules::default(),
            candidates: CandidateFilter::default(),
        }
    }
}

impl SnapreapConfig {
    /// Load configuration from a file.
    pub async fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).await?;
        let config: Self =
            serde_yaml::from_str(&content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if given, else `snapreap.yaml` in `dir` if it exists, else defaults.
    pub async fn discover(path: Option<&Path>, dir: &Path) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path).await;
        }
        let default_path = dir.join(CONFIG_FILE_NAME);
        if fs::try_exists(&default_path).await? {
            tracing::debug!(path = %default_path.display(), "Loading configuration");
            Self::load(&default_path).await
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a file.
    pub async fn save(&self, path: &Path) -> Result<()> {
        let content =
            serde_yaml::to_string(self).map_err(|e| Error::Config(format!("YAML error: {e}")))?;
        fs::write(path, content).await?;
        Ok(())
    }

    /// Check invariants that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.pool.trim().is_empty() {
            return Err(Error::Config("pool name cannot be empty".to_string()));
        }
        if self.marker.any_of.is_empty() {
            tracing::warn!("No deletable marker rules configured; nothing will be planned");
        }
        Ok(())
    }
}

/// Exclusion rules applied to a pool listing before graph construction.
///
/// Volumes managed by other services (block storage volumes, instance disks)
/// share the pool but are never roots of an image lineage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CandidateFilter {
    /// Names starting with any of these are skipped.
    pub exclude_prefixes: Vec<String>,
    /// Names ending with any of these are skipped.
    pub exclude_suffixes: Vec<String>,
}

impl Default for CandidateFilter {
    fn default() -> Self {
        Self {
            exclude_prefixes: vec!["volume-".to_string()],
            exclude_suffixes: vec!["_disk".to_string()],
        }
    }
}

impl CandidateFilter {
    /// A filter that accepts every volume.
    #[must_use]
    pub fn accept_all() -> Self {
        Self {
            exclude_prefixes: Vec::new(),
            exclude_suffixes: Vec::new(),
        }
    }

    /// Returns `true` if `name` should be scanned.
    #[must_use]
    pub fn accepts(&self, name: &str) -> bool {
        !self
            .exclude_prefixes
            .iter()
            .any(|p| name.starts_with(p.as_str()))
            && !self
                .exclude_suffixes
                .iter()
                .any(|s| name.ends_with(s.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marker::MarkerRule;
    use tempfile::TempDir;

    #[test]
    fn default_filter_skips_volumes_and_disks() {
        let filter = CandidateFilter::default();
        assert!(!filter.accepts("volume-1234"));
        assert!(!filter.accepts("abcd_disk"));
        assert!(filter.accepts("0f7e-image"));
        assert!(CandidateFilter::accept_all().accepts("volume-1234"));
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config: SnapreapConfig = serde_yaml::from_str("pool: images\n").unwrap();
        assert_eq!(config.pool, "images");
        assert_eq!(config.marker, MarkerRules::default());
        assert_eq!(config.candidates, CandidateFilter::default());
    }

    #[tokio::test]
    async fn save_then_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILE_NAME);

        let config = SnapreapConfig {
            pool: "images".to_string(),
            marker: MarkerRules {
                any_of: vec![MarkerRule::Suffix("_trash".to_string())],
            },
            candidates: CandidateFilter::accept_all(),
        };
        config.save(&path).await.unwrap();

        let loaded = SnapreapConfig::load(&path).await.unwrap();
        assert_eq!(loaded, config);
    }

    #[tokio::test]
    async fn discover_falls_back_to_defaults() {
        let temp = TempDir::new().unwrap();
        let config = SnapreapConfig::discover(None, temp.path()).await.unwrap();
        assert_eq!(config, SnapreapConfig::default());
    }

    #[tokio::test]
    async fn empty_pool_is_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bad.yaml");
        tokio::fs::write(&path, "pool: ''\n").await.unwrap();

        let err = SnapreapConfig::load(&path).await.unwrap_err();
        assert!(err.to_string().contains("pool name cannot be empty"));
    }
}
