//! Soft-delete markers.
//!
//! Upstream systems do not delete a volume that still has clones; they rename
//! it (or its snapshot) following some convention and leave it behind. The
//! collector learns which nodes are soft-deleted through a [`DeletableMarker`]
//! supplied by the caller, so the convention is configuration rather than
//! something baked into the graph logic.

use crate::domain::NodeKey;
use serde::{Deserialize, Serialize};

/// Marker substring used by the OpenStack image service for soft-deleted RBD images.
pub const DEFAULT_MARKER: &str = "to_be_deleted";

/// Predicate deciding whether a node has been soft-deleted upstream.
///
/// For a snapshot the predicate is asked about the snapshot itself; whether the
/// owning volume is deletable is a separate question answered for the volume's
/// own node.
pub trait DeletableMarker: Send + Sync {
    /// Returns `true` if `key` carries the soft-delete marker.
    fn is_deletable(&self, key: &NodeKey) -> bool;
}

impl<F> DeletableMarker for F
where
    F: Fn(&NodeKey) -> bool + Send + Sync,
{
    fn is_deletable(&self, key: &NodeKey) -> bool {
        self(key)
    }
}

/// A single naming rule, matched against the node's own name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerRule {
    /// Name contains the given substring.
    Contains(String),
    /// Name starts with the given prefix.
    Prefix(String),
    /// Name ends with the given suffix.
    Suffix(String),
    /// Name equals the given string.
    Exact(String),
}

impl MarkerRule {
    fn matches(&self, name: &str) -> bool {
        match self {
            Self::Contains(s) => name.contains(s.as_str()),
            Self::Prefix(s) => name.starts_with(s.as_str()),
            Self::Suffix(s) => name.ends_with(s.as_str()),
            Self::Exact(s) => name == s,
        }
    }
}

/// Configured marker: a node is deletable if any rule matches its name.
///
/// An empty rule set marks nothing, so a misconfigured run plans no deletions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerRules {
    /// Rules combined with logical OR.
    pub any_of: Vec<MarkerRule>,
}

impl MarkerRules {
    /// A marker matching names that contain `pattern`.
    pub fn contains(pattern: impl Into<String>) -> Self {
        Self {
            any_of: vec![MarkerRule::Contains(pattern.into())],
        }
    }
}

impl Default for MarkerRules {
    fn default() -> Self {
        Self::contains(DEFAULT_MARKER)
    }
}

impl DeletableMarker for MarkerRules {
    fn is_deletable(&self, key: &NodeKey) -> bool {
        let name = match key {
            NodeKey::Volume { name } | NodeKey::Snapshot { name, .. } => name,
        };
        self.any_of.iter().any(|rule| rule.matches(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(MarkerRule::Contains("gone".into()), "img_gone_1", true)]
    #[case(MarkerRule::Contains("gone".into()), "img", false)]
    #[case(MarkerRule::Prefix("del-".into()), "del-img", true)]
    #[case(MarkerRule::Prefix("del-".into()), "img-del-", false)]
    #[case(MarkerRule::Suffix("_old".into()), "img_old", true)]
    #[case(MarkerRule::Exact("img".into()), "img2", false)]
    fn rule_matching(#[case] rule: MarkerRule, #[case] name: &str, #[case] expected: bool) {
        assert_eq!(rule.matches(name), expected);
    }

    #[test]
    fn snapshot_is_judged_by_its_own_name() {
        let marker = MarkerRules::default();
        // Volume name carries the marker, snapshot name does not.
        let key = NodeKey::snapshot("img_to_be_deleted", "snap");
        assert!(!marker.is_deletable(&key));
        assert!(marker.is_deletable(&NodeKey::snapshot("img", "snap_to_be_deleted")));
    }

    #[test]
    fn empty_rules_mark_nothing() {
        let marker = MarkerRules { any_of: vec![] };
        assert!(!marker.is_deletable(&NodeKey::volume("to_be_deleted")));
    }

    #[test]
    fn closures_are_markers() {
        let marker = |key: &NodeKey| key.volume_name().starts_with('x');
        assert!(marker.is_deletable(&NodeKey::volume("xa")));
        assert!(!marker.is_deletable(&NodeKey::volume("a")));
    }

    #[test]
    fn rules_deserialize_from_yaml() {
        let yaml = "any_of:\n  - contains: to_be_deleted\n  - suffix: _trash\n";
        let rules: MarkerRules = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            rules.any_of,
            vec![
                MarkerRule::Contains("to_be_deleted".into()),
                MarkerRule::Suffix("_trash".into())
            ]
        );
    }
}
