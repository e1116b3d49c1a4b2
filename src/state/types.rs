//! State types for tracking provisioned resources.
//!
//! These types record what was provisioned, under which ID, and from which
//! declaration, so later runs can plan updates, replacements and deletions.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::resources::ResourceType;

/// Current version of the state format.
pub const STATE_VERSION: &str = "1.0";

/// Maximum number of history entries kept.
const MAX_HISTORY: usize = 100;

/// The complete provisioning state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisioningState {
    /// State format version.
    pub version: String,
    /// Hash of the last applied configuration.
    #[serde(default)]
    pub config_hash: String,
    /// Recorded resources keyed by address (`<kind>.<key>`).
    #[serde(default)]
    pub resources: BTreeMap<String, ResourceRecord>,
    /// When the state was last updated.
    pub last_updated: DateTime<Utc>,
    /// Operation history (recent entries).
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

/// A provisioned resource.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceRecord {
    /// Resource kind.
    pub resource_type: ResourceType,
    /// Declaration key.
    pub key: String,
    /// Server-assigned ID.
    pub id: String,
    /// Spec hash of the declaration when applied.
    pub spec_hash: String,
    /// Replace hash of the declaration when applied.
    pub replace_hash: String,
    /// Last observed state label.
    #[serde(default)]
    pub state: Option<String>,
    /// The last apply did not finish; the next plan replaces the resource.
    #[serde(default)]
    pub tainted: bool,
    /// Declared and computed fields returned by the fulfillment API.
    #[serde(default)]
    pub outputs: serde_json::Value,
    /// When the resource was created.
    pub created_at: DateTime<Utc>,
    /// When the record was last updated.
    pub updated_at: DateTime<Utc>,
}

/// A single entry in the operation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// When the operation occurred.
    pub timestamp: DateTime<Utc>,
    /// Type of operation.
    pub operation: StateOperation,
    /// Configuration hash at the time of the operation.
    pub config_hash: String,
    /// Addresses affected.
    pub resources: Vec<String>,
    /// Whether the operation succeeded.
    pub success: bool,
    /// Optional error message.
    #[serde(default)]
    pub error: Option<String>,
}

/// Types of recorded operations.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StateOperation {
    /// A plan was applied.
    Apply,
    /// Every recorded resource was deleted.
    Destroy,
    /// A single resource was deleted by ID.
    Delete,
}

impl ProvisioningState {
    /// Creates a new empty state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            version: STATE_VERSION.to_string(),
            config_hash: String::new(),
            resources: BTreeMap::new(),
            last_updated: Utc::now(),
            history: Vec::new(),
        }
    }

    /// Gets a resource by address.
    #[must_use]
    pub fn get(&self, address: &str) -> Option<&ResourceRecord> {
        self.resources.get(address)
    }

    /// Adds or replaces a resource.
    pub fn set(&mut self, record: ResourceRecord) {
        self.resources.insert(record.address(), record);
        self.last_updated = Utc::now();
    }

    /// Removes a resource by address.
    pub fn remove(&mut self, address: &str) -> Option<ResourceRecord> {
        let result = self.resources.remove(address);
        if result.is_some() {
            self.last_updated = Utc::now();
        }
        result
    }

    /// Finds the address of the resource with this kind and ID.
    #[must_use]
    pub fn find_by_id(&self, resource_type: ResourceType, id: &str) -> Option<&str> {
        self.resources
            .iter()
            .find(|(_, r)| r.resource_type == resource_type && r.id == id)
            .map(|(address, _)| address.as_str())
    }

    /// Adds a history entry, dropping the oldest beyond the limit.
    pub fn add_history(&mut self, entry: HistoryEntry) {
        if self.history.len() >= MAX_HISTORY {
            self.history.remove(0);
        }
        self.history.push(entry);
    }

    /// Returns the addresses of tainted resources.
    #[must_use]
    pub fn tainted(&self) -> Vec<&str> {
        self.resources
            .iter()
            .filter(|(_, r)| r.tainted)
            .map(|(address, _)| address.as_str())
            .collect()
    }
}

impl Default for ProvisioningState {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceRecord {
    /// Creates a new record for a freshly provisioned resource.
    #[must_use]
    pub fn new(resource_type: ResourceType, key: &str, id: &str) -> Self {
        let now = Utc::now();
        Self {
            resource_type,
            key: key.to_string(),
            id: id.to_string(),
            spec_hash: String::new(),
            replace_hash: String::new(),
            state: None,
            tainted: false,
            outputs: serde_json::Value::Null,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns the state address.
    #[must_use]
    pub fn address(&self) -> String {
        self.resource_type.address(&self.key)
    }

    /// Records the hashes of the applied declaration.
    #[must_use]
    pub fn with_hashes(mut self, spec_hash: &str, replace_hash: &str) -> Self {
        self.spec_hash = spec_hash.to_string();
        self.replace_hash = replace_hash.to_string();
        self
    }

    /// Records the latest observation.
    pub fn observe(&mut self, state: Option<String>, outputs: serde_json::Value) {
        self.state = state;
        self.outputs = outputs;
        self.tainted = false;
        self.updated_at = Utc::now();
    }

    /// Marks the record as needing replacement.
    pub fn taint(&mut self, state: Option<String>) {
        if state.is_some() {
            self.state = state;
        }
        self.tainted = true;
        self.updated_at = Utc::now();
    }
}

impl HistoryEntry {
    /// Creates a new history entry.
    #[must_use]
    pub fn new(operation: StateOperation, config_hash: &str, resources: Vec<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            operation,
            config_hash: config_hash.to_string(),
            resources,
            success: true,
            error: None,
        }
    }

    /// Creates a failed history entry.
    #[must_use]
    pub fn failed(
        operation: StateOperation,
        config_hash: &str,
        resources: Vec<String>,
        error: &str,
    ) -> Self {
        Self {
            success: false,
            error: Some(error.to_string()),
            ..Self::new(operation, config_hash, resources)
        }
    }
}

impl std::fmt::Display for StateOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let op = match self {
            Self::Apply => "apply",
            Self::Destroy => "destroy",
            Self::Delete => "delete",
        };
        write!(f, "{op}")
    }
}
