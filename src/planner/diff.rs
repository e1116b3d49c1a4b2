//! Diff engine for comparing declared vs recorded resources.
//!
//! Declarations are compared to the state records by hash: a missing record
//! means create, a changed replace hash or a tainted record means replace, a
//! changed spec hash means update. Records with no declaration are deleted.

use tracing::debug;

use crate::config::{ConfigHasher, DeclarationHash, OsacConfig};
use crate::resources::ResourceType;
use crate::state::{ProvisioningState, ResourceRecord};

/// Engine for computing diffs between declared and recorded resources.
#[derive(Debug, Default)]
pub struct DiffEngine {
    /// Declaration hasher.
    hasher: ConfigHasher,
}

/// Difference for a single resource.
#[derive(Debug, Clone)]
pub struct ResourceDiff {
    /// Resource kind.
    pub resource_type: ResourceType,
    /// Declaration key.
    pub key: String,
    /// Type of difference.
    pub diff_type: DiffType,
    /// Recorded remote ID, if any.
    pub id: Option<String>,
    /// Why the resource changes.
    pub reason: String,
    /// Hashes of the declaration (absent for deletes).
    pub hash: Option<DeclarationHash>,
}

/// Type of difference detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffType {
    /// Resource needs to be created.
    Create,
    /// Resource can be updated in place.
    Update,
    /// Resource must be deleted and created again.
    Replace,
    /// Resource needs to be deleted.
    Delete,
    /// Resource is unchanged.
    NoChange,
}

/// Complete diff result.
#[derive(Debug)]
pub struct DiffResult {
    /// All resource diffs.
    pub diffs: Vec<ResourceDiff>,
    /// Number of resources to create.
    pub creates: usize,
    /// Number of resources to update.
    pub updates: usize,
    /// Number of resources to replace.
    pub replaces: usize,
    /// Number of resources to delete.
    pub deletes: usize,
    /// Number of unchanged resources.
    pub unchanged: usize,
}

impl DiffEngine {
    /// Creates a new diff engine.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            hasher: ConfigHasher::new(),
        }
    }

    /// Computes the diff between the configuration and the recorded state.
    #[must_use]
    pub fn compute_diff(
        &self,
        config: &OsacConfig,
        state: Option<&ProvisioningState>,
    ) -> DiffResult {
        let mut diffs = Vec::new();

        for (kind, key) in config.declared() {
            let Some(hash) = self.hasher.hash_resource(config, kind, key) else {
                continue;
            };
            let record = state.and_then(|s| s.get(&kind.address(key)));
            diffs.push(Self::compare(kind, key, hash, record));
        }

        if let Some(state) = state {
            for record in state.resources.values() {
                if !config.is_declared(record.resource_type, &record.key) {
                    debug!("Found orphaned resource: {}", record.address());
                    diffs.push(ResourceDiff {
                        resource_type: record.resource_type,
                        key: record.key.clone(),
                        diff_type: DiffType::Delete,
                        id: Some(record.id.clone()),
                        reason: String::from("Removed from configuration"),
                        hash: None,
                    });
                }
            }
        }

        let count = |t: DiffType| diffs.iter().filter(|d| d.diff_type == t).count();

        DiffResult {
            creates: count(DiffType::Create),
            updates: count(DiffType::Update),
            replaces: count(DiffType::Replace),
            deletes: count(DiffType::Delete),
            unchanged: count(DiffType::NoChange),
            diffs,
        }
    }

    fn compare(
        kind: ResourceType,
        key: &str,
        hash: DeclarationHash,
        record: Option<&ResourceRecord>,
    ) -> ResourceDiff {
        let (diff_type, reason) = match record {
            None => (DiffType::Create, "Declared in configuration"),
            Some(r) if r.tainted => (DiffType::Replace, "Previous apply did not complete"),
            Some(r) if r.replace_hash != hash.replace => {
                (DiffType::Replace, "Template or template parameters changed")
            }
            Some(r) if r.spec_hash != hash.spec => (DiffType::Update, "Declaration changed"),
            Some(_) => (DiffType::NoChange, ""),
        };

        debug!("{} {}: {diff_type}", kind, key);

        ResourceDiff {
            resource_type: kind,
            key: key.to_string(),
            diff_type,
            id: record.map(|r| r.id.clone()),
            reason: reason.to_string(),
            hash: Some(hash),
        }
    }
}

impl ResourceDiff {
    /// Returns the state address of the resource.
    #[must_use]
    pub fn address(&self) -> String {
        self.resource_type.address(&self.key)
    }
}

impl DiffResult {
    /// Returns true if there are any changes.
    #[must_use]
    pub const fn has_changes(&self) -> bool {
        self.total_changes() > 0
    }

    /// Returns the total number of changes.
    #[must_use]
    pub const fn total_changes(&self) -> usize {
        self.creates + self.updates + self.replaces + self.deletes
    }

    /// Filters to only diffs that require action.
    #[must_use]
    pub fn actionable_diffs(&self) -> Vec<&ResourceDiff> {
        self.diffs
            .iter()
            .filter(|d| d.diff_type != DiffType::NoChange)
            .collect()
    }
}

impl std::fmt::Display for DiffType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Replace => "replace",
            Self::Delete => "delete",
            Self::NoChange => "no change",
        };
        write!(f, "{s}")
    }
}

impl std::fmt::Display for ResourceDiff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.address(), self.diff_type)?;
        if !self.reason.is_empty() {
            write!(f, " ({})", self.reason)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClusterDeclaration, HostDeclaration, ProviderConfig};

    fn config() -> OsacConfig {
        let mut config = OsacConfig {
            provider: ProviderConfig {
                endpoint: "https://api.example.com".to_string(),
                insecure: false,
                request_timeout_secs: 30,
                timeouts: Default::default(),
            },
            state: Default::default(),
            clusters: Default::default(),
            compute_instances: Default::default(),
            hosts: Default::default(),
            host_pools: Default::default(),
        };
        config.clusters.insert(
            "edge".to_string(),
            ClusterDeclaration {
                template: "ocp".to_string(),
                ..Default::default()
            },
        );
        config.hosts.insert(
            "rack-1".to_string(),
            HostDeclaration {
                power_state: Some("ON".to_string()),
                ..Default::default()
            },
        );
        config
    }

    /// Builds a state matching `config` exactly.
    fn applied(config: &OsacConfig) -> ProvisioningState {
        let hasher = ConfigHasher::new();
        let mut state = ProvisioningState::new();
        for (i, (kind, key)) in config.declared().into_iter().enumerate() {
            let hash = hasher.hash_resource(config, kind, key).unwrap();
            state.set(
                ResourceRecord::new(kind, key, &format!("id-{i}"))
                    .with_hashes(&hash.spec, &hash.replace),
            );
        }
        state
    }

    fn diff_for<'a>(result: &'a DiffResult, address: &str) -> &'a ResourceDiff {
        result
            .diffs
            .iter()
            .find(|d| d.address() == address)
            .unwrap()
    }

    #[test]
    fn test_empty_state_creates_everything() {
        let result = DiffEngine::new().compute_diff(&config(), None);

        assert_eq!(result.creates, 2);
        assert_eq!(result.total_changes(), 2);
        assert!(result.diffs.iter().all(|d| d.id.is_none()));
    }

    #[test]
    fn test_applied_state_has_no_changes() {
        let config = config();
        let state = applied(&config);

        let result = DiffEngine::new().compute_diff(&config, Some(&state));
        assert!(!result.has_changes());
        assert_eq!(result.unchanged, 2);
    }

    #[test]
    fn test_power_change_is_update() {
        let mut config = config();
        let state = applied(&config);
        config.hosts.get_mut("rack-1").unwrap().power_state = Some("OFF".to_string());

        let result = DiffEngine::new().compute_diff(&config, Some(&state));
        let diff = diff_for(&result, "host.rack-1");
        assert_eq!(diff.diff_type, DiffType::Update);
        assert_eq!(diff.id.as_deref(), state.get("host.rack-1").map(|r| r.id.as_str()));
    }

    #[test]
    fn test_template_change_is_replace() {
        let mut config = config();
        let state = applied(&config);
        config.clusters.get_mut("edge").unwrap().template = "ocp-large".to_string();

        let result = DiffEngine::new().compute_diff(&config, Some(&state));
        assert_eq!(diff_for(&result, "cluster.edge").diff_type, DiffType::Replace);
        assert_eq!(result.replaces, 1);
    }

    #[test]
    fn test_tainted_record_is_replaced() {
        let config = config();
        let mut state = applied(&config);
        let mut record = state.get("cluster.edge").unwrap().clone();
        record.taint(None);
        state.set(record);

        let result = DiffEngine::new().compute_diff(&config, Some(&state));
        let diff = diff_for(&result, "cluster.edge");
        assert_eq!(diff.diff_type, DiffType::Replace);
        assert_eq!(diff.reason, "Previous apply did not complete");
    }

    #[test]
    fn test_orphan_is_deleted() {
        let mut config = config();
        let state = applied(&config);
        config.clusters.clear();

        let result = DiffEngine::new().compute_diff(&config, Some(&state));
        let diff = diff_for(&result, "cluster.edge");
        assert_eq!(diff.diff_type, DiffType::Delete);
        assert!(diff.hash.is_none());
        assert_eq!(result.actionable_diffs().len(), 1);
    }
}
